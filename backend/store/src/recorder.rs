//! The two state-recording modes.
//!
//! A deployment picks one per route: session mode tracks a status document
//! per session id, identity mode appends confirmed extractions to the
//! caller's exam log.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info};

use examlens_core::{
    AnalysisOutcome, AnalysisRequest, ExamRecord, Extraction, RecorderMode, SessionRecord,
    SessionStatus, StateRecorder,
};

use crate::documents::{ExamLog, SessionStore};

/// Error detail stored on a session that ended in failure.
pub const SESSION_ERROR_DETAIL: &str = "Failed to analyze the submitted images.";

/// Writes `processing` before the upstream call and exactly one terminal
/// transition after it, in the caller's own partition.
pub struct SessionRecorder {
    store: Arc<dyn SessionStore>,
}

impl SessionRecorder {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }
}

fn session_id(request: &AnalysisRequest) -> Result<&str> {
    request
        .session_id
        .as_deref()
        .context("session mode requires a session id")
}

#[async_trait]
impl StateRecorder for SessionRecorder {
    fn mode(&self) -> RecorderMode {
        RecorderMode::Session
    }

    async fn begin(&self, request: &AnalysisRequest) -> Result<()> {
        let id = session_id(request)?;
        self.store
            .put(&request.caller.subject, id, &SessionRecord::processing())
            .await
            .with_context(|| format!("Failed to mark session {id} as processing"))?;
        debug!(session_id = %id, "Session marked processing");
        Ok(())
    }

    async fn finish(&self, request: &AnalysisRequest, outcome: &AnalysisOutcome) -> Result<()> {
        let id = session_id(request)?;
        let (status, result, error) = match outcome {
            Ok(extraction) => (SessionStatus::Completed, Some(extraction.text()), None),
            Err(_) => (SessionStatus::Error, None, Some(SESSION_ERROR_DETAIL)),
        };
        self.store
            .transition(&request.caller.subject, id, status, result, error)
            .await
            .with_context(|| format!("Failed to mark session {id} as {status}"))?;
        info!(session_id = %id, status = %status, "Session finished");
        Ok(())
    }
}

/// Appends one exam record per successful, non-empty extraction to the
/// caller's partition. Writes nothing otherwise.
pub struct IdentityRecorder {
    log: Arc<dyn ExamLog>,
}

impl IdentityRecorder {
    pub fn new(log: Arc<dyn ExamLog>) -> Self {
        Self { log }
    }
}

#[async_trait]
impl StateRecorder for IdentityRecorder {
    fn mode(&self) -> RecorderMode {
        RecorderMode::Identity
    }

    async fn begin(&self, _request: &AnalysisRequest) -> Result<()> {
        Ok(())
    }

    async fn finish(&self, request: &AnalysisRequest, outcome: &AnalysisOutcome) -> Result<()> {
        let Ok(Extraction::Text(text)) = outcome else {
            debug!(subject = %request.caller.subject, "Nothing to append for this outcome");
            return Ok(());
        };
        let record = ExamRecord::new(request.caller.subject.clone(), text.clone());
        self.log
            .append(&record)
            .await
            .with_context(|| format!("Failed to append exam for {}", request.caller.subject))?;
        info!(subject = %request.caller.subject, exam_id = %record.id, "Exam appended");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use examlens_core::{CallerIdentity, ImageFragment, RelayError, NO_TEXT_EXTRACTED};

    use crate::memory::InMemoryStore;

    fn request(session_id: Option<&str>) -> AnalysisRequest {
        AnalysisRequest {
            fragments: vec![ImageFragment {
                mime_type: "image/png".into(),
                data: "aGVsbG8=".into(),
            }],
            intent: "p".into(),
            session_id: session_id.map(str::to_string),
            caller: CallerIdentity::new("alice"),
        }
    }

    #[tokio::test]
    async fn session_mode_processing_then_completed() {
        let store = Arc::new(InMemoryStore::new());
        let recorder = SessionRecorder::new(store.clone());
        let req = request(Some("s-1"));

        recorder.begin(&req).await.unwrap();
        let record = store.get("alice", "s-1").await.unwrap().unwrap();
        assert_eq!(record.status, SessionStatus::Processing);

        recorder
            .finish(&req, &Ok(Extraction::Text("result".into())))
            .await
            .unwrap();
        let record = store.get("alice", "s-1").await.unwrap().unwrap();
        assert_eq!(record.status, SessionStatus::Completed);
        assert_eq!(record.result.as_deref(), Some("result"));
        assert_eq!(record.error, None);
    }

    #[tokio::test]
    async fn session_mode_failure_sets_error_without_result() {
        let store = Arc::new(InMemoryStore::new());
        let recorder = SessionRecorder::new(store.clone());
        let req = request(Some("s-2"));

        recorder.begin(&req).await.unwrap();
        recorder
            .finish(&req, &Err(RelayError::UpstreamOverloaded { attempts: 3 }))
            .await
            .unwrap();

        let record = store.get("alice", "s-2").await.unwrap().unwrap();
        assert_eq!(record.status, SessionStatus::Error);
        assert_eq!(record.error.as_deref(), Some(SESSION_ERROR_DETAIL));
        assert_eq!(record.result, None);
    }

    #[tokio::test]
    async fn session_mode_second_finish_is_rejected() {
        let store = Arc::new(InMemoryStore::new());
        let recorder = SessionRecorder::new(store.clone());
        let req = request(Some("s-3"));

        recorder.begin(&req).await.unwrap();
        recorder.finish(&req, &Ok(Extraction::Empty)).await.unwrap();
        assert!(recorder
            .finish(&req, &Err(RelayError::UpstreamFailure("x".into())))
            .await
            .is_err());

        let record = store.get("alice", "s-3").await.unwrap().unwrap();
        assert_eq!(record.status, SessionStatus::Completed);
        assert_eq!(record.result.as_deref(), Some(NO_TEXT_EXTRACTED));
    }

    #[tokio::test]
    async fn session_mode_without_id_fails() {
        let recorder = SessionRecorder::new(Arc::new(InMemoryStore::new()));
        assert!(recorder.begin(&request(None)).await.is_err());
    }

    #[tokio::test]
    async fn identity_mode_appends_only_non_empty_success() {
        let store = Arc::new(InMemoryStore::new());
        let recorder = IdentityRecorder::new(store.clone());
        let req = request(None);

        recorder.begin(&req).await.unwrap();
        recorder.finish(&req, &Ok(Extraction::Empty)).await.unwrap();
        recorder
            .finish(&req, &Err(RelayError::UpstreamFailure("boom".into())))
            .await
            .unwrap();
        assert_eq!(store.exam_count().await, 0);

        recorder
            .finish(&req, &Ok(Extraction::Text("hemoglobin 13".into())))
            .await
            .unwrap();
        let exams = store.list("alice", 10).await.unwrap();
        assert_eq!(exams.len(), 1);
        assert_eq!(exams[0].result, "hemoglobin 13");
        assert_eq!(exams[0].owner, "alice");
    }
}
