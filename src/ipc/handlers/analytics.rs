use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::summary;
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

fn require_batch(conn: &Connection, batch_id: &str) -> Result<(), (String, String)> {
    let exists: Option<String> = conn
        .query_row(
            "SELECT id FROM report_batches WHERE id = ?",
            [batch_id],
            |r| r.get(0),
        )
        .optional()
        .map_err(|e| ("db_query_failed".to_string(), e.to_string()))?;
    if exists.is_none() {
        return Err(("not_found".to_string(), "batch not found".to_string()));
    }
    Ok(())
}

fn with_batch<F>(state: &mut AppState, req: &Request, f: F) -> serde_json::Value
where
    F: FnOnce(&Connection, &str) -> Result<serde_json::Value, rusqlite::Error>,
{
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(batch_id) = req.params.get("batchId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.batchId", None);
    };
    if let Err((code, message)) = require_batch(conn, batch_id) {
        return err(&req.id, &code, message, Some(json!({ "batchId": batch_id })));
    }
    match f(conn, batch_id) {
        Ok(result) => ok(&req.id, result),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "summary.divisions" => Some(with_batch(state, req, |conn, batch_id| {
            let divisions = summary::division_distribution(conn, batch_id)?;
            Ok(json!({ "divisions": divisions }))
        })),
        "summary.gradeDistribution" => Some(with_batch(state, req, |conn, batch_id| {
            let subjects = summary::grade_distribution(conn, batch_id)?;
            Ok(json!({ "subjects": subjects }))
        })),
        "summary.scoreBands" => Some(with_batch(state, req, |conn, batch_id| {
            let subjects = summary::score_bands(conn, batch_id)?;
            Ok(json!({ "subjects": subjects }))
        })),
        "summary.classAverage" => Some(with_batch(state, req, |conn, batch_id| {
            let average = summary::class_average(conn, batch_id)?;
            Ok(json!({ "classAverage": average }))
        })),
        _ => None,
    }
}
