//! The import pipeline: workbook validation, whole-file consistency passes,
//! batch resolution with full replace, identity resolution and score upserts,
//! all inside one transaction. Any failure rolls the whole run back.

use crate::classes::{subject_full_name, ClassLevel, SubjectProfile, Term};
use crate::consistency::{
    collect_identities, fuzzy_duplicates, missing_subject_coverage, FuzzyPair, FuzzyPolicy,
    MissingSubjects,
};
use crate::identity::{IdentityError, IdentityResolver, SimilarStudents};
use crate::workbook::{read_marks, Workbook, WorkbookError};
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct BatchParams {
    pub class: ClassLevel,
    pub academic_year: String,
    pub term: Term,
    pub term_end_date: String,
    pub next_term_begin_date: String,
}

#[derive(Debug)]
pub struct ImportOutcome {
    pub batch_id: String,
    pub students: usize,
    pub scores: usize,
    pub missing_subjects: Vec<MissingSubjects>,
    pub fuzzy_duplicates: Vec<FuzzyPair>,
    pub similar_students: Vec<SimilarStudents>,
}

#[derive(Debug)]
pub enum ImportError {
    Workbook(WorkbookError),
    Identity { sheet: String, source: IdentityError },
    Db(rusqlite::Error),
}

impl ImportError {
    pub fn code(&self) -> &'static str {
        match self {
            ImportError::Workbook(e) => e.code(),
            ImportError::Identity { source, .. } => source.code(),
            ImportError::Db(_) => "db_tx_failed",
        }
    }
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::Workbook(e) => e.fmt(f),
            ImportError::Identity { sheet, source } => {
                write!(f, "sheet '{}': {}", sheet, source)
            }
            ImportError::Db(e) => write!(f, "database error: {}", e),
        }
    }
}

impl std::error::Error for ImportError {}

impl From<WorkbookError> for ImportError {
    fn from(e: WorkbookError) -> Self {
        ImportError::Workbook(e)
    }
}

impl From<rusqlite::Error> for ImportError {
    fn from(e: rusqlite::Error) -> Self {
        ImportError::Db(e)
    }
}

/// Runs a full import. On success the batch holds exactly the workbook's
/// scores (prior rows for the same class/year/term are replaced wholesale)
/// and the returned diagnostics are advisory. On any error nothing is
/// written.
pub fn run_import(
    conn: &Connection,
    params: &BatchParams,
    workbook: &Workbook,
) -> Result<ImportOutcome, ImportError> {
    let profile = SubjectProfile::for_level(params.class);
    let sheets = read_marks(workbook, &profile)?;

    let identities = collect_identities(&sheets);
    let missing_subjects = missing_subject_coverage(&identities, profile.required);
    let fuzzy = fuzzy_duplicates(&identities, FuzzyPolicy::default());

    let tx = conn.unchecked_transaction()?;
    let batch_id = resolve_batch(&tx, params)?;

    let mut resolver = IdentityResolver::new();
    let mut student_ids: HashSet<String> = HashSet::new();
    let mut score_count = 0usize;

    for sheet in &sheets {
        let subject_id = find_or_create_subject(&tx, sheet.subject_code)?;
        for row in &sheet.rows {
            let student_id = resolver
                .resolve(&tx, params.class.code(), row.lin.as_deref(), &row.name)
                .map_err(|source| ImportError::Identity {
                    sheet: sheet.sheet_name.clone(),
                    source,
                })?;
            upsert_score(
                &tx,
                &batch_id,
                &student_id,
                &subject_id,
                row.bot,
                row.mot,
                row.eot,
            )?;
            student_ids.insert(student_id);
            score_count += 1;
        }
    }

    tx.commit()?;

    Ok(ImportOutcome {
        batch_id,
        students: student_ids.len(),
        scores: score_count,
        missing_subjects,
        fuzzy_duplicates: fuzzy,
        similar_students: resolver.similar,
    })
}

/// Find-or-create on (class, year, term). A re-import reuses the batch id,
/// refreshes the term dates and import timestamp, and clears every score and
/// summary row the batch held. Runs inside the caller's transaction.
fn resolve_batch(conn: &Connection, params: &BatchParams) -> Result<String, rusqlite::Error> {
    let now = chrono::Utc::now().to_rfc3339();
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM report_batches WHERE class = ? AND academic_year = ? AND term = ?",
            (
                params.class.code(),
                &params.academic_year,
                params.term.code(),
            ),
            |r| r.get(0),
        )
        .optional()?;

    if let Some(id) = existing {
        conn.execute(
            "UPDATE report_batches
             SET term_end_date = ?, next_term_begin_date = ?, imported_at = ?
             WHERE id = ?",
            (
                &params.term_end_date,
                &params.next_term_begin_date,
                &now,
                &id,
            ),
        )?;
        conn.execute("DELETE FROM scores WHERE batch_id = ?", [&id])?;
        conn.execute("DELETE FROM report_summaries WHERE batch_id = ?", [&id])?;
        return Ok(id);
    }

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO report_batches(id, class, academic_year, term, term_end_date, next_term_begin_date, imported_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            params.class.code(),
            &params.academic_year,
            params.term.code(),
            &params.term_end_date,
            &params.next_term_begin_date,
            &now,
        ),
    )?;
    Ok(id)
}

fn find_or_create_subject(conn: &Connection, code: &str) -> Result<String, rusqlite::Error> {
    let full_name = subject_full_name(code);
    let existing: Option<(String, String)> = conn
        .query_row(
            "SELECT id, full_name FROM subjects WHERE code = ?",
            [code],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;
    if let Some((id, stored_name)) = existing {
        if stored_name != full_name {
            conn.execute(
                "UPDATE subjects SET full_name = ? WHERE id = ?",
                (full_name, &id),
            )?;
        }
        return Ok(id);
    }
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO subjects(id, code, full_name) VALUES(?, ?, ?)",
        (&id, code, full_name),
    )?;
    Ok(id)
}

/// At most one score row per (batch, student, subject); a re-upsert
/// overwrites. Null scores stay null, distinct from 0.
fn upsert_score(
    conn: &Connection,
    batch_id: &str,
    student_id: &str,
    subject_id: &str,
    bot: Option<f64>,
    mot: Option<f64>,
    eot: Option<f64>,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO scores(id, batch_id, student_id, subject_id, bot, mot, eot)
         VALUES(?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(batch_id, student_id, subject_id) DO UPDATE SET
           bot = excluded.bot,
           mot = excluded.mot,
           eot = excluded.eot",
        (
            Uuid::new_v4().to_string(),
            batch_id,
            student_id,
            subject_id,
            bot,
            mot,
            eot,
        ),
    )?;
    Ok(())
}
