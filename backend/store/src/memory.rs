use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;

use examlens_core::{ExamRecord, SessionRecord, SessionStatus};

use crate::documents::{ExamLog, SessionStore};

/// (owner, session id)
type SessionKey = (String, String);

fn key(owner: &str, session_id: &str) -> SessionKey {
    (owner.to_string(), session_id.to_string())
}

/// In-memory document store for tests and ephemeral deployments.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    sessions: Arc<RwLock<HashMap<SessionKey, SessionRecord>>>,
    exams: Arc<RwLock<Vec<ExamRecord>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total exam records across all owners.
    pub async fn exam_count(&self) -> usize {
        self.exams.read().await.len()
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn put(&self, owner: &str, session_id: &str, record: &SessionRecord) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(key(owner, session_id), record.clone());
        Ok(())
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
        let mut sessions = self.sessions.write().await;
        let Some(record) = sessions.get_mut(&key(owner, session_id)) else {
            bail!("session {session_id} not found");
        };
        if record.status.is_terminal() {
            bail!("session {session_id} already {}", record.status);
        }
        record.status = status;
        record.result = result.map(str::to_string);
        record.error = error.map(str::to_string);
        Ok(())
    }

    async fn get(&self, owner: &str, session_id: &str) -> Result<Option<SessionRecord>> {
        Ok(self.sessions.read().await.get(&key(owner, session_id)).cloned())
    }
}

#[async_trait]
impl ExamLog for InMemoryStore {
    async fn append(&self, record: &ExamRecord) -> Result<()> {
        self.exams.write().await.push(record.clone());
        Ok(())
    }

    async fn list(&self, owner: &str, limit: usize) -> Result<Vec<ExamRecord>> {
        let exams = self.exams.read().await;
        let mut owned: Vec<ExamRecord> = exams
            .iter()
            .filter(|r| r.owner == owner)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        owned.truncate(limit);
        Ok(owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn transition_only_from_processing() {
        let store = InMemoryStore::new();
        store.put("u", "s", &SessionRecord::processing()).await.unwrap();
        store
            .transition("u", "s", SessionStatus::Completed, Some("r"), None)
            .await
            .unwrap();
        assert!(store
            .transition("u", "s", SessionStatus::Error, None, Some("e"))
            .await
            .is_err());
        assert!(store
            .transition("u", "s", SessionStatus::Processing, None, None)
            .await
            .is_err());

        let record = store.get("u", "s").await.unwrap().unwrap();
        assert_eq!(record.status, SessionStatus::Completed);
        assert_eq!(record.error, None);
    }

    #[tokio::test]
    async fn put_replaces_existing_record() {
        let store = InMemoryStore::new();
        store.put("u", "s", &SessionRecord::processing()).await.unwrap();
        store
            .transition("u", "s", SessionStatus::Error, None, Some("e"))
            .await
            .unwrap();
        store.put("u", "s", &SessionRecord::processing()).await.unwrap();
        let record = store.get("u", "s").await.unwrap().unwrap();
        assert_eq!(record.status, SessionStatus::Processing);
        assert_eq!(record.error, None);
    }

    #[tokio::test]
    async fn same_session_id_under_two_owners_is_two_documents() {
        let store = InMemoryStore::new();
        store.put("alice", "s", &SessionRecord::processing()).await.unwrap();
        store.put("bob", "s", &SessionRecord::processing()).await.unwrap();
        store
            .transition("alice", "s", SessionStatus::Completed, Some("a"), None)
            .await
            .unwrap();

        let bob = store.get("bob", "s").await.unwrap().unwrap();
        assert_eq!(bob.status, SessionStatus::Processing);
        assert_eq!(bob.result, None);
        assert!(store.get("carol", "s").await.unwrap().is_none());
    }
}
