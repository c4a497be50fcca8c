//! Session record persistence.
//!
//! Raw SQL over the `sessions` table. [`SqliteSessionStore`] wraps a shared
//! connection and runs every query on the blocking pool.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, Row};
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

use super::{migrate, open_db, SessionStore, StoreError};
use crate::session::{EvaluationResult, SessionMetrics, SessionRecord};

/// A session row as read back from the database.
///
/// Serializes flat, one key per column, which is the shape history clients
/// read.
#[derive(Debug, Clone, Serialize)]
pub struct StoredSession {
    pub id: i64,
    pub session_uid: String,
    pub name: String,
    pub education: String,
    pub subject: String,
    pub start_time: String,
    pub end_time: String,
    pub duration_seconds: i64,
    #[serde(flatten)]
    pub metrics: SessionMetrics,
    pub transcription_text: String,
    pub llm_score: String,
    pub llm_strengths: String,
    pub llm_improvements: String,
    pub llm_feedback: String,
    pub created_at: String,
}

impl StoredSession {
    pub fn evaluation(&self) -> EvaluationResult {
        EvaluationResult {
            score: self.llm_score.clone(),
            strengths: self.llm_strengths.clone(),
            improvements: self.llm_improvements.clone(),
            detailed_feedback: self.llm_feedback.clone(),
        }
    }
}

const SELECT_COLUMNS: &str = "SELECT id, session_uid, name, education, subject, start_time, end_time, \
     duration_seconds, teaching_effectiveness, face_presence, positive_emotions, \
     neutral_emotions, negative_emotions, transcription_text, llm_score, llm_strengths, \
     llm_improvements, llm_feedback, created_at FROM sessions";

fn from_row(row: &Row<'_>) -> rusqlite::Result<StoredSession> {
    Ok(StoredSession {
        id: row.get(0)?,
        session_uid: row.get(1)?,
        name: row.get(2)?,
        education: row.get(3)?,
        subject: row.get(4)?,
        start_time: row.get(5)?,
        end_time: row.get(6)?,
        duration_seconds: row.get(7)?,
        metrics: SessionMetrics {
            teaching_effectiveness: row.get(8)?,
            face_presence: row.get(9)?,
            positive_emotions: row.get(10)?,
            neutral_emotions: row.get(11)?,
            negative_emotions: row.get(12)?,
        },
        transcription_text: row.get(13)?,
        llm_score: row.get(14)?,
        llm_strengths: row.get(15)?,
        llm_improvements: row.get(16)?,
        llm_feedback: row.get(17)?,
        created_at: row.get(18)?,
    })
}

/// Repository for session records.
pub struct SessionRepository;

impl SessionRepository {
    /// Insert a finished session. Returns the new row id.
    pub fn insert(conn: &Connection, record: &SessionRecord) -> Result<i64> {
        let metrics = &record.metrics;
        let evaluation = &record.evaluation;

        conn.execute(
            "INSERT INTO sessions (session_uid, name, education, subject, start_time, end_time, \
             duration_seconds, teaching_effectiveness, face_presence, positive_emotions, \
             neutral_emotions, negative_emotions, transcription_text, llm_score, llm_strengths, \
             llm_improvements, llm_feedback) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                record.session_id.to_string(),
                record.context.name,
                record.context.education,
                record.context.subject,
                record.started_at.to_rfc3339(),
                record.ended_at.to_rfc3339(),
                record.duration_seconds as i64,
                metrics.teaching_effectiveness,
                metrics.face_presence,
                metrics.positive_emotions,
                metrics.neutral_emotions,
                metrics.negative_emotions,
                record.transcription,
                evaluation.score,
                evaluation.strengths,
                evaluation.improvements,
                evaluation.detailed_feedback,
            ],
        )
        .context("Failed to insert session")?;

        Ok(conn.last_insert_rowid())
    }

    pub fn get(conn: &Connection, id: i64) -> Result<Option<StoredSession>> {
        let mut stmt = conn
            .prepare(&format!("{} WHERE id = ?1", SELECT_COLUMNS))
            .context("Failed to prepare session query")?;

        let mut rows = stmt
            .query_map(params![id], from_row)
            .context("Failed to query session")?;

        match rows.next() {
            Some(Ok(session)) => Ok(Some(session)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// List sessions newest first, optionally for one subject. No limit returns all.
    pub fn list(
        conn: &Connection,
        limit: Option<usize>,
        subject: Option<&str>,
    ) -> Result<Vec<StoredSession>> {
        let mut sql = SELECT_COLUMNS.to_string();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(subject) = subject {
            sql.push_str(" WHERE subject = ?");
            params.push(Box::new(subject.to_string()));
        }

        sql.push_str(" ORDER BY start_time DESC, id DESC");

        if let Some(limit) = limit {
            sql.push_str(" LIMIT ?");
            params.push(Box::new(limit as i64));
        }

        let mut stmt = conn
            .prepare(&sql)
            .context("Failed to prepare sessions list query")?;

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let sessions = stmt
            .query_map(param_refs.as_slice(), from_row)
            .context("Failed to list sessions")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to map sessions")?;

        Ok(sessions)
    }
}

/// [`SessionStore`] over a single shared SQLite connection.
#[derive(Clone)]
pub struct SqliteSessionStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSessionStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = open_db(db_path)?;
        info!("Session database ready at {}", db_path.display());
        Ok(Self::new(conn))
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        migrate(&conn)?;
        Ok(Self::new(conn))
    }

    pub async fn get(&self, id: i64) -> Result<Option<StoredSession>> {
        self.with_conn(move |conn| SessionRepository::get(conn, id))
            .await
    }

    pub async fn list(&self, limit: Option<usize>, subject: Option<String>) -> Result<Vec<StoredSession>> {
        self.with_conn(move |conn| SessionRepository::list(conn, limit, subject.as_deref()))
            .await
    }

    async fn with_conn<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| anyhow!("database connection lock poisoned"))?;
            work(&conn)
        })
        .await
        .context("Database task failed")?
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn save(&self, record: &SessionRecord) -> Result<i64, StoreError> {
        let record = record.clone();
        let id = self
            .with_conn(move |conn| SessionRepository::insert(conn, &record))
            .await?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionContext;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn
    }

    fn record(subject: &str, minutes_ago: i64) -> SessionRecord {
        let started_at = Utc::now() - Duration::minutes(minutes_ago);
        SessionRecord::new(
            Uuid::new_v4(),
            SessionContext::new(subject)
                .with_name("Ada")
                .with_education("high school"),
            started_at,
            started_at + Duration::seconds(95),
            SessionMetrics {
                teaching_effectiveness: 72.5,
                face_presence: 98.0,
                positive_emotions: 30.0,
                neutral_emotions: 60.0,
                negative_emotions: 10.0,
            },
            "cells divide by mitosis".to_string(),
            EvaluationResult {
                score: "82%".to_string(),
                strengths: "clear".to_string(),
                improvements: "pace".to_string(),
                detailed_feedback: "overall solid.".to_string(),
            },
        )
    }

    #[test]
    fn test_insert_and_get() {
        let conn = setup_db();
        let expected = record("Biology", 5);

        let id = SessionRepository::insert(&conn, &expected).unwrap();
        assert!(id > 0);

        let stored = SessionRepository::get(&conn, id).unwrap().unwrap();
        assert_eq!(stored.session_uid, expected.session_id.to_string());
        assert_eq!(stored.subject, "Biology");
        assert_eq!(stored.name, "Ada");
        assert_eq!(stored.education, "high school");
        assert_eq!(stored.duration_seconds, 95);
        assert_eq!(stored.metrics, expected.metrics);
        assert_eq!(stored.transcription_text, "cells divide by mitosis");
        assert_eq!(stored.evaluation(), expected.evaluation);
        assert_eq!(stored.start_time, expected.started_at.to_rfc3339());
    }

    #[test]
    fn test_get_missing() {
        let conn = setup_db();
        assert!(SessionRepository::get(&conn, 42).unwrap().is_none());
    }

    #[test]
    fn test_list_newest_first_with_limit() {
        let conn = setup_db();
        SessionRepository::insert(&conn, &record("Biology", 30)).unwrap();
        SessionRepository::insert(&conn, &record("Chemistry", 20)).unwrap();
        SessionRepository::insert(&conn, &record("Physics", 10)).unwrap();

        let sessions = SessionRepository::list(&conn, Some(2), None).unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].subject, "Physics");
        assert_eq!(sessions[1].subject, "Chemistry");

        let all = SessionRepository::list(&conn, None, None).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[2].subject, "Biology");
    }

    #[test]
    fn test_list_by_subject() {
        let conn = setup_db();
        SessionRepository::insert(&conn, &record("Biology", 30)).unwrap();
        SessionRepository::insert(&conn, &record("Chemistry", 20)).unwrap();
        SessionRepository::insert(&conn, &record("Biology", 10)).unwrap();

        let sessions = SessionRepository::list(&conn, None, Some("Biology")).unwrap();
        assert_eq!(sessions.len(), 2);
        assert!(sessions.iter().all(|s| s.subject == "Biology"));

        assert!(SessionRepository::list(&conn, None, Some("History"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_stored_session_serializes_flat() {
        let conn = setup_db();
        let id = SessionRepository::insert(&conn, &record("Biology", 5)).unwrap();
        let stored = SessionRepository::get(&conn, id).unwrap().unwrap();

        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["llm_score"], "82%");
        assert_eq!(json["llm_feedback"], "overall solid.");
        assert_eq!(json["teaching_effectiveness"], 72.5);
        assert_eq!(json["negative_emotions"], 10.0);
        assert_eq!(json["transcription_text"], "cells divide by mitosis");
        assert!(json.get("metrics").is_none());
        assert!(json.get("evaluation").is_none());
    }

    #[tokio::test]
    async fn test_store_save_and_read_back() {
        let store = SqliteSessionStore::in_memory().unwrap();

        let id = store.save(&record("Biology", 1)).await.unwrap();
        let stored = store.get(id).await.unwrap().unwrap();
        assert_eq!(stored.subject, "Biology");

        let listed = store.list(None, None).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn test_store_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cognspective.db");

        let id = {
            let store = SqliteSessionStore::open(&path).unwrap();
            store.save(&record("Chemistry", 1)).await.unwrap()
        };

        let reopened = SqliteSessionStore::open(&path).unwrap();
        let stored = reopened.get(id).await.unwrap().unwrap();
        assert_eq!(stored.subject, "Chemistry");
    }

    #[tokio::test]
    async fn test_store_error_after_table_dropped() {
        let conn = setup_db();
        conn.execute("DROP TABLE sessions", []).unwrap();
        let store = SqliteSessionStore::new(conn);

        let err = store.save(&record("Biology", 1)).await.unwrap_err();
        assert!(err.to_string().contains("Failed to insert session"));
    }
}
