//! The per-batch grade/remark computation engine. Invoked explicitly, never
//! as part of import, and idempotent: identical stored scores produce
//! identical summaries. Summaries for the batch are replaced wholesale in
//! one transaction.

use crate::classes::{ClassLevel, CORE_SUBJECTS};
use crate::grading::{
    class_teacher_remark_lower, class_teacher_remark_upper, division_for, grade_for,
    head_teacher_remark_lower, head_teacher_remark_upper, points_for,
};
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

#[derive(Debug)]
pub enum ComputeError {
    BatchNotFound(String),
    BadClass(String),
    Db(rusqlite::Error),
}

impl ComputeError {
    pub fn code(&self) -> &'static str {
        match self {
            ComputeError::BatchNotFound(_) => "not_found",
            ComputeError::BadClass(_) => "bad_batch",
            ComputeError::Db(_) => "db_tx_failed",
        }
    }
}

impl fmt::Display for ComputeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeError::BatchNotFound(id) => write!(f, "batch '{}' not found", id),
            ComputeError::BadClass(class) => {
                write!(f, "batch has unrecognized class '{}'", class)
            }
            ComputeError::Db(e) => write!(f, "database error: {}", e),
        }
    }
}

impl std::error::Error for ComputeError {}

impl From<rusqlite::Error> for ComputeError {
    fn from(e: rusqlite::Error) -> Self {
        ComputeError::Db(e)
    }
}

#[derive(Debug)]
pub struct ComputeOutcome {
    pub batch_id: String,
    pub summaries: usize,
}

/// 1-decimal rounding used for stored averages: `Int(10*x + 0.5) / 10`.
pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

fn is_valid_score(score: Option<f64>) -> bool {
    matches!(score, Some(s) if (0.0..=100.0).contains(&s))
}

struct StudentEots {
    eot_by_subject: HashMap<String, Option<f64>>,
}

struct SummaryRow {
    student_id: String,
    aggregate: Option<i64>,
    division: Option<&'static str>,
    total: Option<f64>,
    average: Option<f64>,
    position: Option<i64>,
    total_students: Option<i64>,
    class_teacher_remark: &'static str,
    head_teacher_remark: &'static str,
}

pub fn run_compute(conn: &Connection, batch_id: &str) -> Result<ComputeOutcome, ComputeError> {
    let class_code: Option<String> = conn
        .query_row(
            "SELECT class FROM report_batches WHERE id = ?",
            [batch_id],
            |r| r.get(0),
        )
        .optional()?;
    let Some(class_code) = class_code else {
        return Err(ComputeError::BatchNotFound(batch_id.to_string()));
    };
    let Some(level) = ClassLevel::from_code(&class_code) else {
        return Err(ComputeError::BadClass(class_code));
    };

    let mut stmt = conn.prepare(
        "SELECT sc.student_id, sub.code, sc.eot
         FROM scores sc
         JOIN subjects sub ON sub.id = sc.subject_id
         WHERE sc.batch_id = ?",
    )?;
    let mut by_student: HashMap<String, StudentEots> = HashMap::new();
    let rows = stmt.query_map([batch_id], |r| {
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, Option<f64>>(2)?,
        ))
    })?;
    for row in rows {
        let (student_id, subject_code, eot) = row?;
        by_student
            .entry(student_id)
            .or_insert_with(|| StudentEots {
                eot_by_subject: HashMap::new(),
            })
            .eot_by_subject
            .insert(subject_code, eot);
    }

    let mut summaries: Vec<SummaryRow> = if level.is_upper() {
        by_student
            .into_iter()
            .map(|(student_id, scores)| upper_summary(student_id, &scores))
            .collect()
    } else {
        lower_summaries(by_student)
    };
    // Deterministic insert order regardless of HashMap iteration.
    summaries.sort_by(|a, b| a.student_id.cmp(&b.student_id));

    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM report_summaries WHERE batch_id = ?", [batch_id])?;
    {
        let mut ins = tx.prepare(
            "INSERT INTO report_summaries(
                id, batch_id, student_id, aggregate, division, total, average,
                position, total_students, class_teacher_remark, head_teacher_remark)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )?;
        for s in &summaries {
            ins.execute((
                Uuid::new_v4().to_string(),
                batch_id,
                &s.student_id,
                s.aggregate,
                s.division,
                s.total,
                s.average,
                s.position,
                s.total_students,
                s.class_teacher_remark,
                s.head_teacher_remark,
            ))?;
        }
    }
    tx.commit()?;

    Ok(ComputeOutcome {
        batch_id: batch_id.to_string(),
        summaries: summaries.len(),
    })
}

fn upper_summary(student_id: String, scores: &StudentEots) -> SummaryRow {
    let mut aggregate = 0i64;
    let mut any_core_sat = false;
    for core in CORE_SUBJECTS {
        let eot = scores.eot_by_subject.get(core).copied().flatten();
        if is_valid_score(eot) {
            any_core_sat = true;
            aggregate += points_for(grade_for(eot));
        }
    }
    let division = division_for(aggregate, any_core_sat);

    SummaryRow {
        student_id,
        aggregate: Some(aggregate),
        division: Some(division),
        total: None,
        average: None,
        position: None,
        total_students: None,
        class_teacher_remark: class_teacher_remark_upper(division, aggregate),
        head_teacher_remark: head_teacher_remark_upper(division, aggregate),
    }
}

fn lower_summaries(by_student: HashMap<String, StudentEots>) -> Vec<SummaryRow> {
    let total_students = by_student.len() as i64;
    let mut rows: Vec<SummaryRow> = by_student
        .into_iter()
        .map(|(student_id, scores)| {
            let mut total = 0.0f64;
            let mut taken = 0usize;
            for eot in scores.eot_by_subject.values() {
                if is_valid_score(*eot) {
                    total += eot.unwrap_or(0.0);
                    taken += 1;
                }
            }
            let average = if taken > 0 {
                round_off_1_decimal(total / taken as f64)
            } else {
                0.0
            };
            SummaryRow {
                student_id,
                aggregate: None,
                division: None,
                total: Some(total),
                average: Some(average),
                position: None,
                total_students: Some(total_students),
                class_teacher_remark: class_teacher_remark_lower(average),
                head_teacher_remark: head_teacher_remark_lower(average),
            }
        })
        .collect();

    // Competition ranking: ties share a rank; the next distinct average
    // resumes at processed-count + 1.
    rows.sort_by(|a, b| {
        b.average
            .partial_cmp(&a.average)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.student_id.cmp(&b.student_id))
    });
    let mut prev_average: Option<f64> = None;
    let mut current_rank = 0i64;
    for (i, row) in rows.iter_mut().enumerate() {
        if prev_average != row.average {
            current_rank = i as i64 + 1;
            prev_average = row.average;
        }
        row.position = Some(current_rank);
    }
    rows
}
