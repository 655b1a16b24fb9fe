use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RelayError;

/// Text returned to the caller when the upstream answered without any text part.
pub const NO_TEXT_EXTRACTED: &str = "No text could be extracted from the submitted images.";

/// One image of a multi-image submission.
///
/// `data` is the base64 text exactly as the caller sent it; it is forwarded
/// upstream without decoding or re-encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFragment {
    pub mime_type: String,
    pub data: String,
}

/// Verified caller, as returned by an identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallerIdentity {
    /// Stable subject id; partitions the exam log.
    pub subject: String,
    #[serde(default)]
    pub claims: HashMap<String, serde_json::Value>,
}

impl CallerIdentity {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            claims: HashMap::new(),
        }
    }

    pub fn with_claim(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.claims.insert(key.into(), value);
        self
    }
}

/// Where the instructional text of a request comes from.
///
/// Chosen once per deployment, never per request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IntentPolicy {
    /// The caller must send a non-empty `prompt`.
    #[default]
    CallerSupplied,
    /// The server always uses this text; any caller prompt is ignored.
    Fixed(String),
}

/// A validated inbound analysis call.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub fragments: Vec<ImageFragment>,
    pub intent: String,
    pub session_id: Option<String>,
    pub caller: CallerIdentity,
}

/// One content part of the upstream request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    InlineImage { mime_type: String, data: String },
}

/// Upstream request body content: instructional text first, then one part
/// per image fragment in input order.
///
/// Built once per request and resent unchanged on every retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamPayload {
    parts: Vec<ContentPart>,
}

impl UpstreamPayload {
    pub fn new(intent: impl Into<String>, fragments: &[ImageFragment]) -> Self {
        let mut parts = Vec::with_capacity(fragments.len() + 1);
        parts.push(ContentPart::Text(intent.into()));
        parts.extend(fragments.iter().map(|f| ContentPart::InlineImage {
            mime_type: f.mime_type.clone(),
            data: f.data.clone(),
        }));
        Self { parts }
    }

    pub fn parts(&self) -> &[ContentPart] {
        &self.parts
    }

    pub fn image_count(&self) -> usize {
        self.parts.len().saturating_sub(1)
    }
}

/// Successful upstream result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Text(String),
    /// The upstream answered but carried no text part.
    Empty,
}

impl Extraction {
    /// Text shown to the caller; the fixed sentinel for [`Extraction::Empty`].
    pub fn text(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Empty => NO_TEXT_EXTRACTED,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Final result of the upstream stage of one request.
pub type AnalysisOutcome = Result<Extraction, RelayError>;

/// Lifecycle status of a [`SessionRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Processing,
    Completed,
    Error,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Processing)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "error" => Ok(Self::Error),
            other => anyhow::bail!("unknown session status: {other}"),
        }
    }
}

/// Durable per-session state document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn processing() -> Self {
        Self {
            status: SessionStatus::Processing,
            result: None,
            error: None,
            created_at: Utc::now(),
        }
    }
}

/// Append-only log entry of one confirmed extraction, owned by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamRecord {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub owner: String,
    pub result: String,
    pub timestamp: DateTime<Utc>,
}

impl ExamRecord {
    pub fn new(owner: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner: owner.into(),
            result: result.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Keying scheme of the durable state for a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecorderMode {
    Session,
    #[default]
    Identity,
}

impl fmt::Display for RecorderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session => f.write_str("session"),
            Self::Identity => f.write_str("identity"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(mime: &str, data: &str) -> ImageFragment {
        ImageFragment {
            mime_type: mime.into(),
            data: data.into(),
        }
    }

    #[test]
    fn payload_puts_text_first_then_images_in_order() {
        let fragments = vec![fragment("image/png", "AAAA"), fragment("image/jpeg", "BBBB")];
        let payload = UpstreamPayload::new("read this", &fragments);

        assert_eq!(payload.image_count(), 2);
        assert_eq!(payload.parts()[0], ContentPart::Text("read this".into()));
        assert_eq!(
            payload.parts()[2],
            ContentPart::InlineImage {
                mime_type: "image/jpeg".into(),
                data: "BBBB".into()
            }
        );
    }

    #[test]
    fn empty_extraction_uses_sentinel() {
        assert_eq!(Extraction::Empty.text(), NO_TEXT_EXTRACTED);
        assert_eq!(Extraction::Text("hi".into()).text(), "hi");
    }

    #[test]
    fn session_status_round_trips_through_str() {
        for status in [
            SessionStatus::Processing,
            SessionStatus::Completed,
            SessionStatus::Error,
        ] {
            assert_eq!(status.as_str().parse::<SessionStatus>().unwrap(), status);
        }
        assert!("done".parse::<SessionStatus>().is_err());
    }

    #[test]
    fn session_record_omits_absent_fields() {
        let json = serde_json::to_value(SessionRecord::processing()).unwrap();
        assert_eq!(json["status"], "processing");
        assert!(json.get("result").is_none());
        assert!(json.get("createdAt").is_some());
    }
}
