//! Request validation: shape checks on the inbound body before any upstream
//! or store work happens.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use serde_json::Value;

use examlens_core::{
    AnalysisRequest, CallerIdentity, FieldCategory, ImageFragment, IntentPolicy, RecorderMode,
    RelayError,
};

/// Inbound JSON body of `POST /analyze-exam`.
///
/// Fields stay untyped JSON here: a missing or wrong-typed field is reported
/// by [`RequestValidator`] under its own category, and only unparseable JSON
/// is a body error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeBody {
    #[serde(default)]
    pub image_parts: Option<Value>,
    #[serde(default)]
    pub prompt: Option<Value>,
    #[serde(default)]
    pub session_id: Option<Value>,
}

/// One element of `imageParts`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawImagePart {
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
}

/// Checks presence and shape of required fields.
#[derive(Debug, Clone)]
pub struct RequestValidator {
    intent_policy: IntentPolicy,
    mode: RecorderMode,
}

impl RequestValidator {
    pub fn new(intent_policy: IntentPolicy, mode: RecorderMode) -> Self {
        Self {
            intent_policy,
            mode,
        }
    }

    pub fn mode(&self) -> RecorderMode {
        self.mode
    }

    /// Validate `body` and bind it to the verified `caller`.
    ///
    /// All failing categories are reported together, in the order images,
    /// intent, session id.
    pub fn validate(
        &self,
        body: AnalyzeBody,
        caller: CallerIdentity,
    ) -> Result<AnalysisRequest, RelayError> {
        let mut missing = Vec::new();

        let fragments = validate_images(body.image_parts);
        if fragments.is_none() {
            missing.push(FieldCategory::Images);
        }

        let intent = match &self.intent_policy {
            IntentPolicy::Fixed(text) => Some(text.clone()),
            IntentPolicy::CallerSupplied => non_blank_string(body.prompt),
        };
        if intent.is_none() {
            missing.push(FieldCategory::Intent);
        }

        let session_id = non_blank_string(body.session_id);
        if self.mode == RecorderMode::Session && session_id.is_none() {
            missing.push(FieldCategory::SessionId);
        }

        match (fragments, intent) {
            (Some(fragments), Some(intent)) if missing.is_empty() => Ok(AnalysisRequest {
                fragments,
                intent,
                session_id,
                caller,
            }),
            _ => Err(RelayError::InvalidRequest(missing)),
        }
    }
}

fn non_blank_string(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        _ => None,
    }
}

fn validate_images(value: Option<Value>) -> Option<Vec<ImageFragment>> {
    let Value::Array(parts) = value? else {
        return None;
    };
    if parts.is_empty() {
        return None;
    }
    parts
        .into_iter()
        .map(|part| {
            let part: RawImagePart = serde_json::from_value(part).ok()?;
            let mime_type = part.mime_type.filter(|m| !m.trim().is_empty())?;
            let data = part.data.filter(|d| is_base64(d))?;
            Some(ImageFragment { mime_type, data })
        })
        .collect()
}

/// Base64 is checked in fixed-size chunks, so no decoded copy of the image
/// is ever held.
const BASE64_CHUNK: usize = 4096;

/// Standard-alphabet, padded base64. Line breaks are allowed; the data is
/// forwarded as submitted.
fn is_base64(data: &str) -> bool {
    let mut staged = [0u8; BASE64_CHUNK];
    let mut decoded = [0u8; BASE64_CHUNK / 4 * 3];
    let mut staged_len = 0;
    let mut seen = 0usize;
    let mut padded = false;

    for byte in data.bytes().filter(|b| !b.is_ascii_whitespace()) {
        // Padding may only end the input.
        if padded {
            return false;
        }
        staged[staged_len] = byte;
        staged_len += 1;
        seen += 1;
        if staged_len == BASE64_CHUNK {
            if STANDARD.decode_slice(&staged[..], &mut decoded).is_err() {
                return false;
            }
            padded = staged[BASE64_CHUNK - 1] == b'=';
            staged_len = 0;
        }
    }

    seen > 0 && STANDARD.decode_slice(&staged[..staged_len], &mut decoded).is_ok()
}
