//! Read-only class-level rollups over persisted summaries and scores.
//! Consumed by report rendering; nothing here mutates.

use crate::classes::CORE_SUBJECTS;
use crate::compute::round_off_1_decimal;
use crate::grading::{
    grade_for, DIVISION_BANDS, DIVISION_X, GRADE_BANDS, GRADE_NA, UNGRADED,
};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DivisionCount {
    pub division: String,
    pub count: i64,
}

/// Division distribution for an upper-level batch, in band order with the
/// sentinels last. Divisions with no students still appear with count 0.
pub fn division_distribution(
    conn: &Connection,
    batch_id: &str,
) -> Result<Vec<DivisionCount>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT division, COUNT(*)
         FROM report_summaries
         WHERE batch_id = ? AND division IS NOT NULL
         GROUP BY division",
    )?;
    let counts: HashMap<String, i64> = stmt
        .query_map([batch_id], |r| Ok((r.get::<_, String>(0)?, r.get(1)?)))?
        .collect::<Result<HashMap<_, _>, _>>()?;

    let mut out = Vec::new();
    for (_, _, division) in DIVISION_BANDS {
        out.push(DivisionCount {
            division: division.to_string(),
            count: counts.get(division).copied().unwrap_or(0),
        });
    }
    for division in [DIVISION_X, UNGRADED] {
        out.push(DivisionCount {
            division: division.to_string(),
            count: counts.get(division).copied().unwrap_or(0),
        });
    }
    Ok(out)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectGradeCounts {
    pub subject_code: String,
    pub counts: Vec<GradeCount>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeCount {
    pub grade: String,
    pub count: i64,
}

/// Per-core-subject EOT grade distribution for an upper-level batch.
pub fn grade_distribution(
    conn: &Connection,
    batch_id: &str,
) -> Result<Vec<SubjectGradeCounts>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT sub.code, sc.eot
         FROM scores sc
         JOIN subjects sub ON sub.id = sc.subject_id
         WHERE sc.batch_id = ?",
    )?;
    let mut by_subject: HashMap<String, HashMap<&'static str, i64>> = HashMap::new();
    let rows = stmt.query_map([batch_id], |r| {
        Ok((r.get::<_, String>(0)?, r.get::<_, Option<f64>>(1)?))
    })?;
    for row in rows {
        let (code, eot) = row?;
        if !CORE_SUBJECTS.contains(&code.as_str()) {
            continue;
        }
        *by_subject
            .entry(code)
            .or_default()
            .entry(grade_for(eot))
            .or_insert(0) += 1;
    }

    let mut out = Vec::new();
    for subject in CORE_SUBJECTS {
        let counts_for_subject = by_subject.remove(subject).unwrap_or_default();
        let mut counts: Vec<GradeCount> = GRADE_BANDS
            .iter()
            .map(|(_, grade)| GradeCount {
                grade: grade.to_string(),
                count: counts_for_subject.get(grade).copied().unwrap_or(0),
            })
            .collect();
        counts.push(GradeCount {
            grade: GRADE_NA.to_string(),
            count: counts_for_subject.get(GRADE_NA).copied().unwrap_or(0),
        });
        out.push(SubjectGradeCounts {
            subject_code: subject.to_string(),
            counts,
        });
    }
    Ok(out)
}

const SCORE_BANDS: [(f64, &str); 4] = [
    (80.0, "80-100"),
    (60.0, "60-79"),
    (40.0, "40-59"),
    (0.0, "0-39"),
];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectScoreBands {
    pub subject_code: String,
    pub bands: Vec<BandCount>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BandCount {
    pub band: String,
    pub count: i64,
}

/// Per-subject EOT score-band histogram for a lower-level batch.
pub fn score_bands(
    conn: &Connection,
    batch_id: &str,
) -> Result<Vec<SubjectScoreBands>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT sub.code, sc.eot
         FROM scores sc
         JOIN subjects sub ON sub.id = sc.subject_id
         WHERE sc.batch_id = ?
         ORDER BY sub.code",
    )?;
    let mut by_subject: HashMap<String, HashMap<&'static str, i64>> = HashMap::new();
    let mut subject_order: Vec<String> = Vec::new();
    let rows = stmt.query_map([batch_id], |r| {
        Ok((r.get::<_, String>(0)?, r.get::<_, Option<f64>>(1)?))
    })?;
    for row in rows {
        let (code, eot) = row?;
        if !by_subject.contains_key(&code) {
            subject_order.push(code.clone());
        }
        let entry = by_subject.entry(code).or_default();
        let Some(score) = eot.filter(|s| (0.0..=100.0).contains(s)) else {
            continue;
        };
        let band = SCORE_BANDS
            .iter()
            .find(|(lo, _)| score >= *lo)
            .map(|(_, label)| *label)
            .unwrap_or("0-39");
        *entry.entry(band).or_insert(0) += 1;
    }

    let mut out = Vec::new();
    for subject in subject_order {
        let counts = by_subject.remove(&subject).unwrap_or_default();
        out.push(SubjectScoreBands {
            subject_code: subject,
            bands: SCORE_BANDS
                .iter()
                .map(|(_, band)| BandCount {
                    band: band.to_string(),
                    count: counts.get(band).copied().unwrap_or(0),
                })
                .collect(),
        });
    }
    Ok(out)
}

/// Mean of per-student averages for a lower-level batch, 1-decimal rounded.
/// None when the batch has no computed averages.
pub fn class_average(conn: &Connection, batch_id: &str) -> Result<Option<f64>, rusqlite::Error> {
    let avg: Option<f64> = conn.query_row(
        "SELECT AVG(average) FROM report_summaries WHERE batch_id = ? AND average IS NOT NULL",
        [batch_id],
        |r| r.get(0),
    )?;
    Ok(avg.map(round_off_1_decimal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use rusqlite::Connection;
    use uuid::Uuid;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().expect("open");
        db::init_schema(&conn).expect("schema");
        conn
    }

    fn seed_batch(conn: &Connection, class: &str) -> String {
        let id = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO report_batches(id, class, academic_year, term, term_end_date, next_term_begin_date, imported_at)
             VALUES(?, ?, '2025', 'I', '2025-05-02', '2025-05-26', '2025-05-03T00:00:00Z')",
            (&id, class),
        )
        .expect("batch");
        id
    }

    fn seed_student(conn: &Connection, name: &str) -> String {
        let id = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO students(id, name, lin, current_class) VALUES(?, ?, NULL, 'P5')",
            (&id, name),
        )
        .expect("student");
        id
    }

    fn seed_subject(conn: &Connection, code: &str) -> String {
        let id = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO subjects(id, code, full_name) VALUES(?, ?, ?)",
            (&id, code, code),
        )
        .expect("subject");
        id
    }

    fn seed_score(conn: &Connection, batch: &str, student: &str, subject: &str, eot: Option<f64>) {
        conn.execute(
            "INSERT INTO scores(id, batch_id, student_id, subject_id, bot, mot, eot)
             VALUES(?, ?, ?, ?, NULL, NULL, ?)",
            (Uuid::new_v4().to_string(), batch, student, subject, eot),
        )
        .expect("score");
    }

    #[test]
    fn division_distribution_includes_empty_bands() {
        let conn = test_conn();
        let batch = seed_batch(&conn, "P5");
        let student = seed_student(&conn, "ACHAN MARY");
        conn.execute(
            "INSERT INTO report_summaries(id, batch_id, student_id, aggregate, division, class_teacher_remark, head_teacher_remark)
             VALUES(?, ?, ?, 10, 'Division One', '', '')",
            (Uuid::new_v4().to_string(), &batch, &student),
        )
        .expect("summary");

        let dist = division_distribution(&conn, &batch).expect("distribution");
        assert_eq!(dist.len(), 7);
        assert_eq!(dist[0].division, "Division One");
        assert_eq!(dist[0].count, 1);
        assert!(dist.iter().skip(1).all(|d| d.count == 0));
    }

    #[test]
    fn grade_distribution_counts_na_for_missing_eot() {
        let conn = test_conn();
        let batch = seed_batch(&conn, "P5");
        let student = seed_student(&conn, "ACHAN MARY");
        let english = seed_subject(&conn, "english");
        let mtc = seed_subject(&conn, "mtc");
        seed_score(&conn, &batch, &student, &english, Some(92.0));
        seed_score(&conn, &batch, &student, &mtc, None);

        let dist = grade_distribution(&conn, &batch).expect("distribution");
        let english_counts = dist
            .iter()
            .find(|s| s.subject_code == "english")
            .expect("english");
        let d1 = english_counts
            .counts
            .iter()
            .find(|c| c.grade == "D1")
            .expect("d1");
        assert_eq!(d1.count, 1);

        let mtc_counts = dist.iter().find(|s| s.subject_code == "mtc").expect("mtc");
        let na = mtc_counts
            .counts
            .iter()
            .find(|c| c.grade == "N/A")
            .expect("na");
        assert_eq!(na.count, 1);
    }

    #[test]
    fn score_bands_histogram_and_class_average() {
        let conn = test_conn();
        let batch = seed_batch(&conn, "P2");
        let a = seed_student(&conn, "A KID");
        let b = seed_student(&conn, "B KID");
        let reading = seed_subject(&conn, "read");
        seed_score(&conn, &batch, &a, &reading, Some(85.0));
        seed_score(&conn, &batch, &b, &reading, Some(45.0));

        let bands = score_bands(&conn, &batch).expect("bands");
        assert_eq!(bands.len(), 1);
        let read = &bands[0];
        assert_eq!(read.bands[0].band, "80-100");
        assert_eq!(read.bands[0].count, 1);
        assert_eq!(read.bands[2].band, "40-59");
        assert_eq!(read.bands[2].count, 1);

        for (student, avg) in [(&a, 85.0), (&b, 45.0)] {
            conn.execute(
                "INSERT INTO report_summaries(id, batch_id, student_id, total, average, position, total_students, class_teacher_remark, head_teacher_remark)
                 VALUES(?, ?, ?, ?, ?, 1, 2, '', '')",
                (Uuid::new_v4().to_string(), &batch, student, avg, avg),
            )
            .expect("summary");
        }
        assert_eq!(class_average(&conn, &batch).expect("avg"), Some(65.0));
    }
}
