use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;

/// Open (creating if needed) the database at `db_path` and bring the schema up to date.
pub fn open_db(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;

    migrate(&conn)?;

    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sessions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_uid TEXT NOT NULL,
            name TEXT NOT NULL DEFAULT '',
            education TEXT NOT NULL DEFAULT '',
            subject TEXT NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            duration_seconds INTEGER NOT NULL DEFAULT 0,
            teaching_effectiveness REAL NOT NULL DEFAULT 0,
            face_presence REAL NOT NULL DEFAULT 0,
            positive_emotions REAL NOT NULL DEFAULT 0,
            neutral_emotions REAL NOT NULL DEFAULT 0,
            negative_emotions REAL NOT NULL DEFAULT 0,
            transcription_text TEXT NOT NULL DEFAULT '',
            llm_score TEXT NOT NULL DEFAULT 'N/A',
            llm_strengths TEXT NOT NULL DEFAULT '',
            llm_improvements TEXT NOT NULL DEFAULT '',
            llm_feedback TEXT NOT NULL DEFAULT '',
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )
    .context("Failed to create sessions table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sessions_start_time ON sessions(start_time DESC)",
        [],
    )
    .context("Failed to create sessions start_time index")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sessions_subject ON sessions(subject)",
        [],
    )
    .context("Failed to create sessions subject index")?;

    Ok(())
}
