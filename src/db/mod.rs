//! SQLite persistence for completed sessions.

mod init;
pub mod sessions;

use async_trait::async_trait;
use thiserror::Error;

use crate::session::SessionRecord;

pub use init::{migrate, open_db};
pub use sessions::{SessionRepository, SqliteSessionStore, StoredSession};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session store error: {0}")]
    Store(String),
}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        Self::Store(format!("{:#}", err))
    }
}

/// Durable sink for finished session records.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a record and return its row id.
    async fn save(&self, record: &SessionRecord) -> Result<i64, StoreError>;
}
