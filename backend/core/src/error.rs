use std::fmt;

use thiserror::Error;

/// Request field groups reported by validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldCategory {
    /// The body could not be parsed as JSON at all.
    Body,
    Images,
    Intent,
    SessionId,
}

impl FieldCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Body => "body",
            Self::Images => "images",
            Self::Intent => "intent",
            Self::SessionId => "sessionId",
        }
    }

    fn join(categories: &[FieldCategory]) -> String {
        categories
            .iter()
            .map(FieldCategory::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for FieldCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error type for the relay pipeline.
///
/// An empty upstream answer is not represented here; it is a successful
/// [`Extraction::Empty`](crate::Extraction::Empty).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RelayError {
    #[error("unauthorized")]
    Unauthenticated,

    #[error("missing or malformed field(s): {}", FieldCategory::join(.0))]
    InvalidRequest(Vec<FieldCategory>),

    #[error("upstream overloaded after {attempts} attempts")]
    UpstreamOverloaded { attempts: u32 },

    #[error("upstream failure: {0}")]
    UpstreamFailure(String),

    #[error("state recorder unavailable: {0}")]
    RecorderUnavailable(String),
}

impl RelayError {
    /// Stable short code, used in logs and stored error details.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::InvalidRequest(_) => "invalid_request",
            Self::UpstreamOverloaded { .. } => "upstream_overloaded",
            Self::UpstreamFailure(_) => "upstream_failure",
            Self::RecorderUnavailable(_) => "recorder_unavailable",
        }
    }
}

/// Failure of a single upstream call, before retry classification.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct AttemptError {
    /// HTTP status of the upstream answer; `None` for network faults.
    pub status: Option<u16>,
    /// Symbolic status from the upstream error body (e.g. `RESOURCE_EXHAUSTED`).
    pub upstream_status: Option<String>,
    pub message: String,
}

impl AttemptError {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            status: None,
            upstream_status: None,
            message: message.into(),
        }
    }

    pub fn http(status: u16, upstream_status: Option<String>, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            upstream_status,
            message: message.into(),
        }
    }
}
