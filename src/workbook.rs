//! Workbook abstraction and the marks reader.
//!
//! The front end owns spreadsheet decoding and hands the daemon a parsed
//! workbook: a list of sheets, each a map of A1-style cell references to
//! string or numeric values. The reader validates the fixed column layout
//! (A=LIN, B=Names, C=BOT, D=MOT, E=EOT, header on row 1, data from row 2)
//! and produces normalized per-subject row lists.

use crate::classes::{subject_code_for_sheet, subject_full_name, SubjectProfile};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Deserialize)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sheet {
    pub name: String,
    #[serde(default)]
    pub cells: HashMap<String, serde_json::Value>,
}

impl Sheet {
    fn raw_cell(&self, col: char, row: u32) -> Option<&serde_json::Value> {
        self.cells.get(&format!("{}{}", col, row))
    }

    /// Trimmed cell text, None when blank. Numeric cells render without a
    /// trailing ".0" so a numeric LIN column reads back as entered.
    pub fn cell_text(&self, col: char, row: u32) -> Option<String> {
        let v = self.raw_cell(col, row)?;
        let text = match v {
            serde_json::Value::String(s) => s.trim().to_string(),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    i.to_string()
                } else {
                    n.to_string()
                }
            }
            _ => return None,
        };
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Numeric cell value. Non-numeric content (including unparsable text)
    /// reads as None rather than an error.
    pub fn cell_number(&self, col: char, row: u32) -> Option<f64> {
        match self.raw_cell(col, row)? {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Highest row number that has any cell content.
    pub fn highest_row(&self) -> u32 {
        self.cells
            .keys()
            .filter_map(|key| {
                let digits: String = key.chars().filter(|c| c.is_ascii_digit()).collect();
                digits.parse::<u32>().ok()
            })
            .max()
            .unwrap_or(0)
    }
}

/// One data row from a subject sheet, normalized for the import pipeline.
#[derive(Debug, Clone)]
pub struct MarkRow {
    pub lin: Option<String>,
    pub name: String,
    pub bot: Option<f64>,
    pub mot: Option<f64>,
    pub eot: Option<f64>,
}

/// All data rows for one recognized subject sheet.
#[derive(Debug, Clone)]
pub struct SheetRows {
    pub subject_code: &'static str,
    pub sheet_name: String,
    pub rows: Vec<MarkRow>,
}

#[derive(Debug, Clone)]
pub enum WorkbookError {
    BadHeader { sheet: String, detail: String },
    MissingSheet { subject_code: &'static str },
    EmptySheet { sheet: String },
}

impl WorkbookError {
    pub fn code(&self) -> &'static str {
        match self {
            WorkbookError::BadHeader { .. } => "bad_workbook",
            WorkbookError::MissingSheet { .. } => "missing_sheet",
            WorkbookError::EmptySheet { .. } => "empty_sheet",
        }
    }
}

impl fmt::Display for WorkbookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkbookError::BadHeader { sheet, detail } => {
                write!(f, "sheet '{}' has an invalid header row: {}", sheet, detail)
            }
            WorkbookError::MissingSheet { subject_code } => {
                write!(
                    f,
                    "required subject sheet '{}' is missing from the workbook",
                    subject_full_name(subject_code)
                )
            }
            WorkbookError::EmptySheet { sheet } => {
                write!(f, "required sheet '{}' has no data rows", sheet)
            }
        }
    }
}

impl std::error::Error for WorkbookError {}

fn header_name_ok(text: &str) -> bool {
    let t = text.trim().to_ascii_lowercase();
    t == "names" || t == "name" || t == "names/name"
}

fn validate_header(sheet: &Sheet) -> Result<(), WorkbookError> {
    let expect = |col: char, want: &str| -> Result<(), WorkbookError> {
        let found = sheet.cell_text(col, 1).unwrap_or_default();
        if found.eq_ignore_ascii_case(want) {
            Ok(())
        } else {
            Err(WorkbookError::BadHeader {
                sheet: sheet.name.clone(),
                detail: format!("expected '{}' in column {}, found '{}'", want, col, found),
            })
        }
    };

    expect('A', "LIN")?;
    let name_header = sheet.cell_text('B', 1).unwrap_or_default();
    if !header_name_ok(&name_header) {
        return Err(WorkbookError::BadHeader {
            sheet: sheet.name.clone(),
            detail: format!(
                "expected 'Names/Name' in column B, found '{}'",
                name_header
            ),
        });
    }
    expect('C', "BOT")?;
    expect('D', "MOT")?;
    expect('E', "EOT")?;
    Ok(())
}

fn read_rows(sheet: &Sheet) -> Vec<MarkRow> {
    let mut rows = Vec::new();
    for row in 2..=sheet.highest_row() {
        // Rows without a name carry nothing attributable; skip them.
        let Some(name) = sheet.cell_text('B', row) else {
            continue;
        };
        rows.push(MarkRow {
            lin: sheet.cell_text('A', row),
            name,
            bot: sheet.cell_number('C', row),
            mot: sheet.cell_number('D', row),
            eot: sheet.cell_number('E', row),
        });
    }
    rows
}

/// Validates the workbook against the class's subject profile and extracts
/// normalized rows for every recognized subject sheet. Fails before any
/// database write on the first structural problem.
pub fn read_marks(
    workbook: &Workbook,
    profile: &SubjectProfile,
) -> Result<Vec<SheetRows>, WorkbookError> {
    let mut by_code: HashMap<&'static str, &Sheet> = HashMap::new();
    for sheet in &workbook.sheets {
        let Some(code) = subject_code_for_sheet(&sheet.name) else {
            continue;
        };
        // First sheet wins if a workbook somehow repeats a subject.
        by_code.entry(code).or_insert(sheet);
    }

    for code in profile.required {
        if !by_code.contains_key(code) {
            return Err(WorkbookError::MissingSheet { subject_code: code });
        }
    }

    let mut out = Vec::new();
    for code in profile.required.iter().chain(profile.optional.iter()) {
        let Some(sheet) = by_code.get(code) else {
            // Optional subject absent entirely; nothing to read.
            continue;
        };
        validate_header(sheet)?;
        let rows = read_rows(sheet);
        if rows.is_empty() && !profile.is_optional(code) {
            return Err(WorkbookError::EmptySheet {
                sheet: sheet.name.clone(),
            });
        }
        out.push(SheetRows {
            subject_code: code,
            sheet_name: sheet.name.clone(),
            rows,
        });
    }
    Ok(out)
}
