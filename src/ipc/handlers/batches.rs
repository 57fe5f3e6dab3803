use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use rusqlite::OptionalExtension;
use serde_json::json;

fn handle_batches_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "batches": [] }));
    };

    // Include counts so the UI can show which batches have been computed.
    let mut stmt = match conn.prepare(
        "SELECT
           b.id, b.class, b.academic_year, b.term, b.term_end_date,
           b.next_term_begin_date, b.imported_at,
           (SELECT COUNT(DISTINCT s.student_id) FROM scores s WHERE s.batch_id = b.id) AS student_count,
           (SELECT COUNT(*) FROM report_summaries rs WHERE rs.batch_id = b.id) AS summary_count
         FROM report_batches b
         ORDER BY b.academic_year, b.term, b.class",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "class": r.get::<_, String>(1)?,
                "academicYear": r.get::<_, String>(2)?,
                "term": r.get::<_, String>(3)?,
                "termEndDate": r.get::<_, String>(4)?,
                "nextTermBeginDate": r.get::<_, String>(5)?,
                "importedAt": r.get::<_, String>(6)?,
                "studentCount": r.get::<_, i64>(7)?,
                "summaryCount": r.get::<_, i64>(8)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(batches) => ok(&req.id, json!({ "batches": batches })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_batches_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(batch_id) = req.params.get("batchId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.batchId", None);
    };

    let row = conn
        .query_row(
            "SELECT id, class, academic_year, term, term_end_date, next_term_begin_date, imported_at
             FROM report_batches WHERE id = ?",
            [batch_id],
            |r| {
                Ok(json!({
                    "id": r.get::<_, String>(0)?,
                    "class": r.get::<_, String>(1)?,
                    "academicYear": r.get::<_, String>(2)?,
                    "term": r.get::<_, String>(3)?,
                    "termEndDate": r.get::<_, String>(4)?,
                    "nextTermBeginDate": r.get::<_, String>(5)?,
                    "importedAt": r.get::<_, String>(6)?,
                }))
            },
        )
        .optional();

    match row {
        Ok(Some(batch)) => ok(&req.id, json!({ "batch": batch })),
        Ok(None) => err(
            &req.id,
            "not_found",
            "batch not found",
            Some(json!({ "batchId": batch_id })),
        ),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_batches_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(batch_id) = req.params.get("batchId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.batchId", None);
    };

    // Scores and summaries cascade; students and subjects are shared
    // reference data and stay.
    match conn.execute("DELETE FROM report_batches WHERE id = ?", [batch_id]) {
        Ok(0) => err(
            &req.id,
            "not_found",
            "batch not found",
            Some(json!({ "batchId": batch_id })),
        ),
        Ok(_) => ok(&req.id, json!({ "deleted": true })),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "batches.list" => Some(handle_batches_list(state, req)),
        "batches.get" => Some(handle_batches_get(state, req)),
        "batches.delete" => Some(handle_batches_delete(state, req)),
        _ => None,
    }
}
