use std::sync::Arc;
use std::time::Duration;

use examlens_analyzer::Analyzer;
use examlens_core::{IdentityVerifier, RecorderMode};
use examlens_store::{ExamLog, SessionStore};

/// Read side of the durable store, matching the recorder mode.
#[derive(Clone)]
pub enum Lookups {
    Sessions(Arc<dyn SessionStore>),
    Exams(Arc<dyn ExamLog>),
}

impl Lookups {
    pub fn mode(&self) -> RecorderMode {
        match self {
            Self::Sessions(_) => RecorderMode::Session,
            Self::Exams(_) => RecorderMode::Identity,
        }
    }
}

/// Application state shared across routes.
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<Analyzer>,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub lookups: Lookups,
    /// Advertised in `Retry-After` when the upstream stays overloaded.
    pub retry_after: Duration,
}

impl AppState {
    pub fn new(
        analyzer: Arc<Analyzer>,
        verifier: Arc<dyn IdentityVerifier>,
        lookups: Lookups,
        retry_after: Duration,
    ) -> Self {
        Self {
            analyzer,
            verifier,
            lookups,
            retry_after,
        }
    }

    pub fn mode(&self) -> RecorderMode {
        self.analyzer.recorder().mode()
    }
}
