use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::error::AttemptError;
use crate::types::{AnalysisOutcome, AnalysisRequest, CallerIdentity, RecorderMode, UpstreamPayload};

/// Exchanges a bearer credential for a verified caller identity.
///
/// Any error means the credential is rejected; callers never expose the
/// reason to the client.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<CallerIdentity>;
}

/// A single call to the external inference service.
#[async_trait]
pub trait InferenceTransport: Send + Sync {
    /// Provider name (e.g., "gemini").
    fn name(&self) -> &str;

    /// Send the payload once. `Ok(None)` means the upstream answered but no
    /// text part could be extracted.
    async fn generate(&self, payload: &UpstreamPayload) -> Result<Option<String>, AttemptError>;
}

/// Persists processing-state transitions for a request.
#[async_trait]
pub trait StateRecorder: Send + Sync {
    fn mode(&self) -> RecorderMode;

    /// Called before the upstream call starts.
    async fn begin(&self, request: &AnalysisRequest) -> Result<()>;

    /// Called exactly once after the upstream stage resolved.
    async fn finish(&self, request: &AnalysisRequest, outcome: &AnalysisOutcome) -> Result<()>;
}

/// Timed suspension between retry attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by the tokio timer; does not block other tasks.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
