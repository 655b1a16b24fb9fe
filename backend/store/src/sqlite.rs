use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::task::spawn_blocking;
use tracing::{debug, info};

use examlens_core::{ExamRecord, SessionRecord, SessionStatus};

use crate::documents::{ExamLog, SessionStore};

/// SQLite-backed document store for session records and the exam log.
///
/// Each operation is a single statement, so per-document atomicity comes
/// from SQLite itself. Statements run on the blocking pool.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create the store at the given path.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let store = Self::from_connection(conn)?;
        info!(path = %path, "Relay store opened");
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory SQLite")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                owner TEXT NOT NULL,
                id TEXT NOT NULL,
                status TEXT NOT NULL,
                result TEXT,
                error TEXT,
                created_at TEXT NOT NULL,
                PRIMARY KEY (owner, id)
            );
            CREATE TABLE IF NOT EXISTS exams (
                id TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                result TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_exams_owner ON exams(owner, timestamp);",
        )
        .context("Failed to initialize relay store schema")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `func` against the connection on the blocking pool.
    async fn with_conn<F, T>(&self, func: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| anyhow!("SQLite connection mutex poisoned"))?;
            func(&guard)
        })
        .await
        .context("SQLite task failed to complete")?
    }

    /// Count all exam records in the store.
    pub async fn exam_count(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let count: usize =
                conn.query_row("SELECT COUNT(*) FROM exams", [], |row| row.get(0))?;
            Ok(count)
        })
        .await
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Invalid stored timestamp: {raw}"))?
        .with_timezone(&Utc))
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn put(&self, owner: &str, session_id: &str, record: &SessionRecord) -> Result<()> {
        let (owner, id, record) = (owner.to_string(), session_id.to_string(), record.clone());
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO sessions (owner, id, status, result, error, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    owner,
                    id,
                    record.status.as_str(),
                    record.result,
                    record.error,
                    record.created_at.to_rfc3339(),
                ],
            )?;
            debug!(owner = %owner, session_id = %id, status = %record.status, "Session record written");
            Ok(())
        })
        .await
    }

    async fn transition(
        &self,
        owner: &str,
        session_id: &str,
        status: SessionStatus,
        result: Option<&str>,
        error: Option<&str>,
    ) -> Result<()> {
        if !status.is_terminal() {
            bail!("session {session_id}: transition target must be terminal, got {status}");
        }

        let (owner, id) = (owner.to_string(), session_id.to_string());
        let (result, error) = (result.map(str::to_string), error.map(str::to_string));
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE sessions SET status = ?1, result = ?2, error = ?3
                 WHERE owner = ?4 AND id = ?5 AND status = 'processing'",
                params![status.as_str(), result, error, owner, id],
            )?;

            if changed == 0 {
                let current: Option<String> = conn
                    .query_row(
                        "SELECT status FROM sessions WHERE owner = ?1 AND id = ?2",
                        params![owner, id],
                        |row| row.get(0),
                    )
                    .optional()?;
                match current {
                    None => bail!("session {id} not found"),
                    Some(current) => bail!("session {id} already {current}"),
                }
            }

            debug!(owner = %owner, session_id = %id, status = %status, "Session record transitioned");
            Ok(())
        })
        .await
    }

    async fn get(&self, owner: &str, session_id: &str) -> Result<Option<SessionRecord>> {
        let (owner, id) = (owner.to_string(), session_id.to_string());
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT status, result, error, created_at FROM sessions
                     WHERE owner = ?1 AND id = ?2",
                    params![owner, id],
                    |row| {
                        let status: String = row.get(0)?;
                        let result: Option<String> = row.get(1)?;
                        let error: Option<String> = row.get(2)?;
                        let created_at: String = row.get(3)?;
                        Ok((status, result, error, created_at))
                    },
                )
                .optional()?;

            row.map(|(status, result, error, created_at)| -> Result<SessionRecord> {
                Ok(SessionRecord {
                    status: status.parse()?,
                    result,
                    error,
                    created_at: parse_timestamp(&created_at)?,
                })
            })
            .transpose()
        })
        .await
    }
}

#[async_trait]
impl ExamLog for SqliteStore {
    async fn append(&self, record: &ExamRecord) -> Result<()> {
        let record = record.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO exams (id, owner, result, timestamp) VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.id.to_string(),
                    record.owner,
                    record.result,
                    record.timestamp.to_rfc3339(),
                ],
            )?;
            debug!(owner = %record.owner, id = %record.id, "Exam record appended");
            Ok(())
        })
        .await
    }

    async fn list(&self, owner: &str, limit: usize) -> Result<Vec<ExamRecord>> {
        let owner = owner.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, owner, result, timestamp FROM exams
                 WHERE owner = ?1 ORDER BY timestamp DESC LIMIT ?2",
            )?;

            let records: Vec<ExamRecord> = stmt
                .query_map(params![owner, limit], |row| {
                    let id: String = row.get(0)?;
                    let owner: String = row.get(1)?;
                    let result: String = row.get(2)?;
                    let timestamp: String = row.get(3)?;
                    Ok((id, owner, result, timestamp))
                })?
                .filter_map(|r| r.ok())
                .filter_map(|(id, owner, result, timestamp)| {
                    Some(ExamRecord {
                        id: uuid::Uuid::parse_str(&id).ok()?,
                        owner,
                        result,
                        timestamp: parse_timestamp(&timestamp).ok()?,
                    })
                })
                .collect();

            Ok(records)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn session_lifecycle() {
        let store = SqliteStore::in_memory().unwrap();
        store.put("alice", "s1", &SessionRecord::processing()).await.unwrap();

        let record = store.get("alice", "s1").await.unwrap().unwrap();
        assert_eq!(record.status, SessionStatus::Processing);

        store
            .transition("alice", "s1", SessionStatus::Completed, Some("text"), None)
            .await
            .unwrap();
        let record = store.get("alice", "s1").await.unwrap().unwrap();
        assert_eq!(record.status, SessionStatus::Completed);
        assert_eq!(record.result.as_deref(), Some("text"));
        assert_eq!(record.error, None);
    }

    #[tokio::test]
    async fn terminal_record_is_not_mutated_again() {
        let store = SqliteStore::in_memory().unwrap();
        store.put("alice", "s1", &SessionRecord::processing()).await.unwrap();
        store
            .transition("alice", "s1", SessionStatus::Error, None, Some("failed"))
            .await
            .unwrap();

        let err = store
            .transition("alice", "s1", SessionStatus::Completed, Some("late"), None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already error"));

        let record = store.get("alice", "s1").await.unwrap().unwrap();
        assert_eq!(record.status, SessionStatus::Error);
        assert_eq!(record.result, None);
    }

    #[tokio::test]
    async fn transition_of_unknown_session_fails() {
        let store = SqliteStore::in_memory().unwrap();
        let err = store
            .transition("alice", "missing", SessionStatus::Completed, Some("x"), None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
        assert!(store.get("alice", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn exam_log_is_partitioned_and_newest_first() {
        let store = SqliteStore::in_memory().unwrap();
        let mut older = ExamRecord::new("alice", "first");
        older.timestamp = older.timestamp - Duration::minutes(5);
        let newer = ExamRecord::new("alice", "second");
        store.append(&older).await.unwrap();
        store.append(&newer).await.unwrap();
        store.append(&ExamRecord::new("bob", "other")).await.unwrap();

        let alice = store.list("alice", 10).await.unwrap();
        assert_eq!(alice.len(), 2);
        assert_eq!(alice[0].result, "second");
        assert_eq!(alice[1].id, older.id);
        assert_eq!(store.list("bob", 10).await.unwrap().len(), 1);
        assert_eq!(store.exam_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn sessions_are_partitioned_by_owner() {
        let store = SqliteStore::in_memory().unwrap();
        store.put("alice", "s1", &SessionRecord::processing()).await.unwrap();
        store
            .transition("alice", "s1", SessionStatus::Completed, Some("alice's"), None)
            .await
            .unwrap();

        assert!(store.get("bob", "s1").await.unwrap().is_none());

        // Bob reusing the id starts his own document and leaves Alice's alone.
        store.put("bob", "s1", &SessionRecord::processing()).await.unwrap();
        let alice = store.get("alice", "s1").await.unwrap().unwrap();
        assert_eq!(alice.status, SessionStatus::Completed);
        assert_eq!(alice.result.as_deref(), Some("alice's"));
        assert_eq!(
            store.get("bob", "s1").await.unwrap().unwrap().status,
            SessionStatus::Processing
        );
    }
}
