use crate::compute::run_compute;
use crate::grading::{eot_remark_for, grade_for};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_reports_compute(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(batch_id) = req.params.get("batchId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.batchId", None);
    };

    match run_compute(conn, batch_id) {
        Ok(outcome) => ok(
            &req.id,
            json!({
                "batchId": outcome.batch_id,
                "summaries": outcome.summaries,
            }),
        ),
        Err(e) => err(&req.id, e.code(), e.to_string(), None),
    }
}

fn handle_reports_summaries(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(batch_id) = req.params.get("batchId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.batchId", None);
    };

    // Lower-level batches order by position; upper-level rows have no
    // position and fall back to name order.
    let mut stmt = match conn.prepare(
        "SELECT st.id, st.name, st.lin, rs.aggregate, rs.division, rs.total,
                rs.average, rs.position, rs.total_students,
                rs.class_teacher_remark, rs.head_teacher_remark
         FROM report_summaries rs
         JOIN students st ON st.id = rs.student_id
         WHERE rs.batch_id = ?
         ORDER BY CASE WHEN rs.position IS NULL THEN 1 ELSE 0 END, rs.position, st.name",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([batch_id], |r| {
            Ok(json!({
                "studentId": r.get::<_, String>(0)?,
                "name": r.get::<_, String>(1)?,
                "lin": r.get::<_, Option<String>>(2)?,
                "aggregate": r.get::<_, Option<i64>>(3)?,
                "division": r.get::<_, Option<String>>(4)?,
                "total": r.get::<_, Option<f64>>(5)?,
                "average": r.get::<_, Option<f64>>(6)?,
                "position": r.get::<_, Option<i64>>(7)?,
                "totalStudents": r.get::<_, Option<i64>>(8)?,
                "classTeacherRemark": r.get::<_, String>(9)?,
                "headTeacherRemark": r.get::<_, String>(10)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(summaries) => ok(&req.id, json!({ "summaries": summaries })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

/// Per-student subject rows with derived grades and the EOT narrative label,
/// straight from stored scores. Works whether or not summaries exist yet.
fn handle_reports_marksheet(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(batch_id) = req.params.get("batchId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.batchId", None);
    };

    let mut stmt = match conn.prepare(
        "SELECT st.id, st.name, st.lin, sub.code, sc.bot, sc.mot, sc.eot
         FROM scores sc
         JOIN students st ON st.id = sc.student_id
         JOIN subjects sub ON sub.id = sc.subject_id
         WHERE sc.batch_id = ?
         ORDER BY st.name, st.id, sub.code",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    type MarksheetRow = (String, String, Option<String>, String, Option<f64>, Option<f64>, Option<f64>);
    let rows: Result<Vec<MarksheetRow>, _> = stmt
        .query_map([batch_id], |r| {
            Ok((
                r.get(0)?,
                r.get(1)?,
                r.get(2)?,
                r.get(3)?,
                r.get(4)?,
                r.get(5)?,
                r.get(6)?,
            ))
        })
        .and_then(|it| it.collect());
    let rows = match rows {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    // Rows arrive grouped by student; fold consecutive runs together.
    let mut grouped: Vec<((String, String, Option<String>), Vec<serde_json::Value>)> = Vec::new();
    for (student_id, name, lin, code, bot, mot, eot) in rows {
        let subject = json!({
            "subjectCode": code,
            "bot": bot,
            "botGrade": grade_for(bot),
            "mot": mot,
            "motGrade": grade_for(mot),
            "eot": eot,
            "eotGrade": grade_for(eot),
            "eotRemark": eot_remark_for(eot),
        });
        match grouped.last_mut() {
            Some((key, subjects)) if key.0 == student_id => subjects.push(subject),
            _ => grouped.push(((student_id, name, lin), vec![subject])),
        }
    }
    let students: Vec<serde_json::Value> = grouped
        .into_iter()
        .map(|((student_id, name, lin), subjects)| {
            json!({
                "studentId": student_id,
                "name": name,
                "lin": lin,
                "subjects": subjects,
            })
        })
        .collect();

    ok(&req.id, json!({ "students": students }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.compute" => Some(handle_reports_compute(state, req)),
        "reports.summaries" => Some(handle_reports_summaries(state, req)),
        "reports.marksheet" => Some(handle_reports_marksheet(state, req)),
        _ => None,
    }
}
