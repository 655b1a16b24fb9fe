use anyhow::Result;
use async_trait::async_trait;

use examlens_core::{ExamRecord, SessionRecord, SessionStatus};

/// Per-session status documents, partitioned by the caller that created
/// them. The same session id under two owners names two documents.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create or replace the record for `session_id` in `owner`'s partition.
    async fn put(&self, owner: &str, session_id: &str, record: &SessionRecord) -> Result<()>;

    /// Move a `processing` record to a terminal status.
    ///
    /// Fails if the record does not exist or is already terminal; a terminal
    /// record is never mutated.
    async fn transition(
        &self,
        owner: &str,
        session_id: &str,
        status: SessionStatus,
        result: Option<&str>,
        error: Option<&str>,
    ) -> Result<()>;

    async fn get(&self, owner: &str, session_id: &str) -> Result<Option<SessionRecord>>;
}

/// Append-only log of confirmed extractions, partitioned by owner.
#[async_trait]
pub trait ExamLog: Send + Sync {
    async fn append(&self, record: &ExamRecord) -> Result<()>;

    /// The owner's records, newest first.
    async fn list(&self, owner: &str, limit: usize) -> Result<Vec<ExamRecord>>;
}
