use crate::classes::{ClassLevel, Term};
use crate::importer::{run_import, BatchParams, ImportError};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::workbook::Workbook;
use serde_json::json;

fn param_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn handle_marks_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let Some(class_raw) = param_str(req, "class") else {
        return err(&req.id, "bad_params", "missing params.class", None);
    };
    let Some(class) = ClassLevel::from_code(&class_raw) else {
        return err(
            &req.id,
            "bad_params",
            "params.class must be one of P1..P7",
            Some(json!({ "class": class_raw })),
        );
    };
    let Some(term_raw) = param_str(req, "term") else {
        return err(&req.id, "bad_params", "missing params.term", None);
    };
    let Some(term) = Term::from_code(&term_raw) else {
        return err(
            &req.id,
            "bad_params",
            "params.term must be I, II or III",
            Some(json!({ "term": term_raw })),
        );
    };
    let Some(academic_year) = param_str(req, "academicYear") else {
        return err(&req.id, "bad_params", "missing params.academicYear", None);
    };
    let Some(term_end_date) = param_str(req, "termEndDate") else {
        return err(&req.id, "bad_params", "missing params.termEndDate", None);
    };
    let Some(next_term_begin_date) = param_str(req, "nextTermBeginDate") else {
        return err(&req.id, "bad_params", "missing params.nextTermBeginDate", None);
    };

    let Some(workbook_raw) = req.params.get("workbook") else {
        return err(&req.id, "bad_params", "missing params.workbook", None);
    };
    let workbook: Workbook = match serde_json::from_value(workbook_raw.clone()) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "bad_params",
                format!("params.workbook is not a valid workbook: {}", e),
                None,
            )
        }
    };

    let params = BatchParams {
        class,
        academic_year,
        term,
        term_end_date,
        next_term_begin_date,
    };

    match run_import(conn, &params, &workbook) {
        Ok(outcome) => ok(
            &req.id,
            json!({
                "batchId": outcome.batch_id,
                "students": outcome.students,
                "scores": outcome.scores,
                "missingSubjects": outcome.missing_subjects,
                "fuzzyDuplicates": outcome.fuzzy_duplicates,
                "similarStudents": outcome.similar_students,
            }),
        ),
        Err(e) => {
            let details = match &e {
                ImportError::Identity { sheet, .. } => Some(json!({ "sheet": sheet })),
                _ => None,
            };
            err(&req.id, e.code(), e.to_string(), details)
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "marks.import" => Some(handle_marks_import(state, req)),
        _ => None,
    }
}
