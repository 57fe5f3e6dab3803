use rusqlite::Connection;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("termreports.sqlite3");
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            lin TEXT UNIQUE,
            current_class TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_name ON students(name)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class ON students(current_class)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            full_name TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS report_batches(
            id TEXT PRIMARY KEY,
            class TEXT NOT NULL,
            academic_year TEXT NOT NULL,
            term TEXT NOT NULL,
            term_end_date TEXT NOT NULL,
            next_term_begin_date TEXT NOT NULL,
            imported_at TEXT NOT NULL,
            UNIQUE(class, academic_year, term)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS scores(
            id TEXT PRIMARY KEY,
            batch_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            bot REAL,
            mot REAL,
            eot REAL,
            FOREIGN KEY(batch_id) REFERENCES report_batches(id) ON DELETE CASCADE,
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(subject_id) REFERENCES subjects(id),
            UNIQUE(batch_id, student_id, subject_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_scores_batch ON scores(batch_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_scores_student ON scores(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_scores_subject ON scores(subject_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS report_summaries(
            id TEXT PRIMARY KEY,
            batch_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            aggregate INTEGER,
            division TEXT,
            total REAL,
            average REAL,
            position INTEGER,
            total_students INTEGER,
            class_teacher_remark TEXT NOT NULL,
            head_teacher_remark TEXT NOT NULL,
            FOREIGN KEY(batch_id) REFERENCES report_batches(id) ON DELETE CASCADE,
            FOREIGN KEY(student_id) REFERENCES students(id),
            UNIQUE(batch_id, student_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_report_summaries_batch ON report_summaries(batch_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_report_summaries_student ON report_summaries(student_id)",
        [],
    )?;

    Ok(())
}
