use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use examlens_core::{AttemptError, InferenceTransport, UpstreamPayload};

/// A transport that replays a fixed script of answers, one per call.
///
/// The last entry repeats for every further call; an empty script answers
/// with no text.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<Option<String>, AttemptError>>>,
    payloads: Mutex<Vec<UpstreamPayload>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<Option<String>, AttemptError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            payloads: Mutex::new(Vec::new()),
        }
    }

    /// Always answer with `text`.
    pub fn with_response(text: impl Into<String>) -> Self {
        Self::new(vec![Ok(Some(text.into()))])
    }

    /// Number of calls made so far.
    pub fn calls(&self) -> usize {
        self.payloads.lock().map(|p| p.len()).unwrap_or_default()
    }

    /// Payloads received, in call order.
    pub fn payloads(&self) -> Vec<UpstreamPayload> {
        self.payloads.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl InferenceTransport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, payload: &UpstreamPayload) -> Result<Option<String>, AttemptError> {
        if let Ok(mut seen) = self.payloads.lock() {
            seen.push(payload.clone());
        }
        let mut script = self
            .script
            .lock()
            .map_err(|_| AttemptError::network("scripted transport poisoned"))?;
        match script.len() {
            0 => Ok(None),
            1 => script.front().cloned().unwrap_or(Ok(None)),
            _ => script.pop_front().unwrap_or(Ok(None)),
        }
    }
}
