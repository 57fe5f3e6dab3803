use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_termreportd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn termreportd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn sheet(name: &str, rows: &[(&str, Option<f64>)]) -> serde_json::Value {
    let mut cells = serde_json::Map::new();
    cells.insert("A1".into(), json!("LIN"));
    cells.insert("B1".into(), json!("Names"));
    cells.insert("C1".into(), json!("BOT"));
    cells.insert("D1".into(), json!("MOT"));
    cells.insert("E1".into(), json!("EOT"));
    for (i, (name, eot)) in rows.iter().enumerate() {
        let row = i + 2;
        cells.insert(format!("B{}", row), json!(name));
        if let Some(v) = eot {
            cells.insert(format!("E{}", row), json!(v));
        }
    }
    json!({ "name": name, "cells": cells })
}

// All seven lower-level sheets; `scored` maps subject sheet name to the EOT
// for the first student, the second student never sits anything.
fn p1_workbook(scored: &[(&str, f64)]) -> serde_json::Value {
    let names = [
        "English",
        "MTC",
        "Literacy I",
        "Literacy II",
        "Religious Education",
        "Reading",
        "Luganda",
    ];
    let sheets: Vec<serde_json::Value> = names
        .iter()
        .map(|&n| {
            let eot = scored.iter().find(|(s, _)| *s == n).map(|(_, v)| *v);
            sheet(n, &[("ACHAN MARY", eot), ("ABSENT CHILD", None)])
        })
        .collect();
    json!({ "sheets": sheets })
}

fn import_and_compute(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workbook: serde_json::Value,
) -> String {
    let result = request_ok(
        stdin,
        reader,
        "import",
        "marks.import",
        json!({
            "class": "P1",
            "academicYear": "2025",
            "term": "I",
            "termEndDate": "2025-05-02",
            "nextTermBeginDate": "2025-05-26",
            "workbook": workbook,
        }),
    );
    let batch_id = result["batchId"].as_str().expect("batchId").to_string();
    request_ok(
        stdin,
        reader,
        "compute",
        "reports.compute",
        json!({ "batchId": batch_id }),
    );
    batch_id
}

#[test]
fn averages_over_sat_subjects_and_competition_ranking() {
    let workspace = temp_dir("termreportd-lower-rank");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    // Only three subjects sat; the average divides by those three, not by
    // the full seven-subject profile.
    let batch_id = import_and_compute(
        &mut stdin,
        &mut reader,
        p1_workbook(&[("English", 80.0), ("MTC", 65.0), ("Reading", 65.0)]),
    );

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "reports.summaries",
        json!({ "batchId": batch_id }),
    );
    let rows = result["summaries"].as_array().expect("summaries");
    assert_eq!(rows.len(), 2);

    // Position order puts the ranked leader first.
    assert_eq!(rows[0]["name"], json!("ACHAN MARY"));
    assert_eq!(rows[0]["total"], json!(210.0));
    assert_eq!(rows[0]["average"], json!(70.0));
    assert_eq!(rows[0]["position"], json!(1));
    assert_eq!(rows[0]["totalStudents"], json!(2));
    assert_eq!(rows[0]["aggregate"], json!(null));
    assert_eq!(rows[0]["division"], json!(null));

    assert_eq!(rows[1]["name"], json!("ABSENT CHILD"));
    assert_eq!(rows[1]["average"], json!(0.0));
    assert_eq!(rows[1]["position"], json!(2));
    assert!(!rows[1]["classTeacherRemark"]
        .as_str()
        .expect("remark")
        .is_empty());

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn class_average_and_score_bands_rollups() {
    let workspace = temp_dir("termreportd-lower-rollups");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let batch_id = import_and_compute(
        &mut stdin,
        &mut reader,
        p1_workbook(&[("English", 80.0), ("MTC", 70.0), ("Reading", 42.0)]),
    );

    // ACHAN averages 64.0 over three sat subjects; the absentee holds 0.0.
    let average = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "summary.classAverage",
        json!({ "batchId": batch_id }),
    );
    assert_eq!(average["classAverage"], json!(32.0));

    let bands = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "summary.scoreBands",
        json!({ "batchId": batch_id }),
    );
    let subjects = bands["subjects"].as_array().expect("subjects");
    assert_eq!(subjects.len(), 7);
    let band_count = |code: &str, band: &str| {
        subjects
            .iter()
            .find(|s| s["subjectCode"] == json!(code))
            .and_then(|s| {
                s["bands"]
                    .as_array()
                    .expect("bands")
                    .iter()
                    .find(|b| b["band"] == json!(band))
            })
            .and_then(|b| b["count"].as_i64())
            .expect("band count")
    };
    assert_eq!(band_count("english", "80-100"), 1);
    assert_eq!(band_count("mtc", "60-79"), 1);
    assert_eq!(band_count("read", "40-59"), 1);
    assert_eq!(band_count("lug", "0-39"), 0);

    drop(stdin);
    let _ = child.wait();
}
