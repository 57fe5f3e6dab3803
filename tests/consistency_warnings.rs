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

fn import_params(workbook: serde_json::Value) -> serde_json::Value {
    json!({
        "class": "P7",
        "academicYear": "2025",
        "term": "III",
        "termEndDate": "2025-12-05",
        "nextTermBeginDate": "2026-02-02",
        "workbook": workbook,
    })
}

#[test]
fn fuzzy_name_pair_is_flagged_once_and_both_students_kept() {
    let workspace = temp_dir("termreportd-fuzzy");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    // Likely the same child typed two ways; both rows appear on every sheet
    // so the pair must still be reported exactly once.
    let rows = [("JOHN OKELLO", Some(55.0)), ("JON OKELLO", Some(56.0))];
    let workbook = json!({
        "sheets": [
            sheet("English", &rows),
            sheet("MTC", &rows),
            sheet("Science", &rows),
            sheet("SST", &rows),
        ]
    });
    let result = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "marks.import",
        import_params(workbook),
    );

    let pairs = result["fuzzyDuplicates"].as_array().expect("pairs");
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0]["distance"], json!(1));
    let names = [
        pairs[0]["nameA"].as_str().expect("nameA"),
        pairs[0]["nameB"].as_str().expect("nameB"),
    ];
    assert!(names.contains(&"JOHN OKELLO"));
    assert!(names.contains(&"JON OKELLO"));

    // Advisory only: both identities imported as distinct students.
    let students = request_ok(&mut stdin, &mut reader, "3", "students.list", json!({}));
    assert_eq!(students["students"].as_array().expect("students").len(), 2);

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn missing_subject_coverage_is_reported_but_does_not_block() {
    let workspace = temp_dir("termreportd-coverage");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let everyone = [("ACHAN MARY", Some(70.0)), ("OKELLO JOHN", Some(60.0))];
    let only_mary = [("ACHAN MARY", Some(66.0))];
    let workbook = json!({
        "sheets": [
            sheet("English", &everyone),
            sheet("MTC", &everyone),
            sheet("Science", &only_mary),
            sheet("SST", &only_mary),
        ]
    });
    let result = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "marks.import",
        import_params(workbook),
    );

    let missing = result["missingSubjects"].as_array().expect("missing");
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0]["name"], json!("OKELLO JOHN"));
    assert_eq!(missing[0]["missing"], json!(["science", "sst"]));

    // The import itself committed.
    let batches = request_ok(&mut stdin, &mut reader, "3", "batches.list", json!({}));
    assert_eq!(batches["batches"].as_array().expect("batches").len(), 1);

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn same_name_as_an_existing_student_is_flagged_across_terms() {
    let workspace = temp_dir("termreportd-similar");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let lin_sheet = |name: &str, lin: &str, student: &str| {
        let mut cells = serde_json::Map::new();
        cells.insert("A1".into(), json!("LIN"));
        cells.insert("B1".into(), json!("Names"));
        cells.insert("C1".into(), json!("BOT"));
        cells.insert("D1".into(), json!("MOT"));
        cells.insert("E1".into(), json!("EOT"));
        cells.insert("A2".into(), json!(lin));
        cells.insert("B2".into(), json!(student));
        cells.insert("E2".into(), json!(50.0));
        json!({ "name": name, "cells": cells })
    };
    let one_student_workbook = |lin: &str, student: &str| {
        json!({
            "sheets": [
                lin_sheet("English", lin, student),
                lin_sheet("MTC", lin, student),
                lin_sheet("Science", lin, student),
                lin_sheet("SST", lin, student),
            ]
        })
    };
    let batch = |class: &str, year: &str, workbook: serde_json::Value| {
        json!({
            "class": class,
            "academicYear": year,
            "term": "III",
            "termEndDate": "2025-12-05",
            "nextTermBeginDate": "2026-02-02",
            "workbook": workbook,
        })
    };

    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "marks.import",
        batch("P7", "2025", one_student_workbook("L1", "ACHAN MARY")),
    );
    // A second child enrolled with a misspelled name.
    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "marks.import",
        batch("P6", "2025", one_student_workbook("L2", "ACHAN MARI")),
    );

    // The spelling is corrected the following year; the LIN carries the
    // identity, and the rename now collides with the other ACHAN MARY.
    let result = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "marks.import",
        batch("P7", "2026", one_student_workbook("L2", "ACHAN MARY")),
    );

    let similar = result["similarStudents"].as_array().expect("similar");
    assert_eq!(similar.len(), 1);
    assert_eq!(similar[0]["name"], json!("ACHAN MARY"));
    assert_eq!(similar[0]["lin"], json!("L2"));
    assert_eq!(similar[0]["matches"].as_array().expect("matches").len(), 1);
    assert_eq!(similar[0]["matches"][0]["lin"], json!("L1"));

    let students = request_ok(&mut stdin, &mut reader, "5", "students.list", json!({}));
    let list = students["students"].as_array().expect("students");
    assert_eq!(list.len(), 2);
    assert!(list.iter().all(|s| s["name"] == json!("ACHAN MARY")));

    drop(stdin);
    let _ = child.wait();
}
