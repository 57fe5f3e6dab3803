//! Student identity resolution for imported mark rows.
//!
//! A LIN (Learner Identification Number) is the stronger identity key: a row
//! whose LIN matches an existing student is that student even when the name
//! differs. Name matching is the fallback for rows without a usable LIN.

use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

/// Uppercased, whitespace-collapsed form used for all name comparisons
/// and for storage.
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistingStudent {
    pub student_id: String,
    pub name: String,
    pub lin: Option<String>,
    pub class: String,
}

/// Diagnostic: a resolved row shares its exact name with other student
/// records. Advisory only; the operator decides whether they are one person.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarStudents {
    pub name: String,
    pub lin: Option<String>,
    pub matches: Vec<ExistingStudent>,
}

#[derive(Debug)]
pub enum IdentityError {
    LinConflict {
        lin: String,
        name: String,
        detail: String,
    },
    Db(rusqlite::Error),
}

impl IdentityError {
    pub fn code(&self) -> &'static str {
        match self {
            IdentityError::LinConflict { .. } => "lin_conflict",
            IdentityError::Db(_) => "db_query_failed",
        }
    }
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityError::LinConflict { lin, name, detail } => {
                write!(f, "LIN '{}' on row for '{}': {}", lin, name, detail)
            }
            IdentityError::Db(e) => write!(f, "database error: {}", e),
        }
    }
}

impl std::error::Error for IdentityError {}

impl From<rusqlite::Error> for IdentityError {
    fn from(e: rusqlite::Error) -> Self {
        IdentityError::Db(e)
    }
}

/// Resolves rows to canonical student ids within one import run, collecting
/// same-name diagnostics along the way. One instance per run so repeated
/// appearances of a student across subject sheets flag at most once.
pub struct IdentityResolver {
    flagged: HashSet<(String, Option<String>)>,
    pub similar: Vec<SimilarStudents>,
}

impl IdentityResolver {
    pub fn new() -> Self {
        IdentityResolver {
            flagged: HashSet::new(),
            similar: Vec::new(),
        }
    }

    pub fn resolve(
        &mut self,
        conn: &Connection,
        class: &str,
        lin: Option<&str>,
        raw_name: &str,
    ) -> Result<String, IdentityError> {
        let name = normalize_name(raw_name);
        let now = chrono::Utc::now().to_rfc3339();

        // LIN match wins outright; the stored name yields to the row's.
        if let Some(row_lin) = lin {
            let found: Option<(String, String)> = conn
                .query_row(
                    "SELECT id, name FROM students WHERE lin = ?",
                    [row_lin],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )
                .optional()?;
            if let Some((id, stored_name)) = found {
                if stored_name != name {
                    conn.execute(
                        "UPDATE students SET name = ?, current_class = ?, updated_at = ? WHERE id = ?",
                        (&name, class, &now, &id),
                    )?;
                } else {
                    conn.execute(
                        "UPDATE students SET current_class = ?, updated_at = ? WHERE id = ?",
                        (class, &now, &id),
                    )?;
                }
                self.flag_same_name(conn, &id, &name, lin)?;
                return Ok(id);
            }
        }

        // Name fallback.
        let found: Option<(String, Option<String>)> = conn
            .query_row(
                "SELECT id, lin FROM students WHERE name = ?",
                [&name],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
        if let Some((id, stored_lin)) = found {
            if let Some(row_lin) = lin {
                match stored_lin.as_deref() {
                    Some(stored) if stored != row_lin => {
                        return Err(IdentityError::LinConflict {
                            lin: row_lin.to_string(),
                            name,
                            detail: format!(
                                "student already holds LIN '{}'; refusing to reassign",
                                stored
                            ),
                        });
                    }
                    None => {
                        let owner: Option<String> = conn
                            .query_row(
                                "SELECT name FROM students WHERE lin = ? AND id != ?",
                                (row_lin, &id),
                                |r| r.get(0),
                            )
                            .optional()?;
                        if let Some(owner_name) = owner {
                            return Err(IdentityError::LinConflict {
                                lin: row_lin.to_string(),
                                name,
                                detail: format!("LIN already belongs to '{}'", owner_name),
                            });
                        }
                        conn.execute(
                            "UPDATE students SET lin = ? WHERE id = ?",
                            (row_lin, &id),
                        )?;
                    }
                    _ => {}
                }
            }
            conn.execute(
                "UPDATE students SET current_class = ?, updated_at = ? WHERE id = ?",
                (class, &now, &id),
            )?;
            self.flag_same_name(conn, &id, &name, lin)?;
            return Ok(id);
        }

        // First sight: create.
        if let Some(row_lin) = lin {
            let owner: Option<String> = conn
                .query_row("SELECT name FROM students WHERE lin = ?", [row_lin], |r| {
                    r.get(0)
                })
                .optional()?;
            if let Some(owner_name) = owner {
                return Err(IdentityError::LinConflict {
                    lin: row_lin.to_string(),
                    name,
                    detail: format!("LIN already belongs to '{}'", owner_name),
                });
            }
        }
        let id = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO students(id, name, lin, current_class, updated_at)
             VALUES(?, ?, ?, ?, ?)",
            (&id, &name, lin, class, &now),
        )?;
        self.flag_same_name(conn, &id, &name, lin)?;
        Ok(id)
    }

    fn flag_same_name(
        &mut self,
        conn: &Connection,
        student_id: &str,
        name: &str,
        lin: Option<&str>,
    ) -> Result<(), IdentityError> {
        let key = (student_id.to_string(), lin.map(|s| s.to_string()));
        if self.flagged.contains(&key) {
            return Ok(());
        }

        let mut stmt = conn.prepare(
            "SELECT id, name, lin, current_class FROM students WHERE name = ? AND id != ?",
        )?;
        let matches: Vec<ExistingStudent> = stmt
            .query_map((name, student_id), |r| {
                Ok(ExistingStudent {
                    student_id: r.get(0)?,
                    name: r.get(1)?,
                    lin: r.get(2)?,
                    class: r.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        self.flagged.insert(key);
        if !matches.is_empty() {
            self.similar.push(SimilarStudents {
                name: name.to_string(),
                lin: lin.map(|s| s.to_string()),
                matches,
            });
        }
        Ok(())
    }
}
