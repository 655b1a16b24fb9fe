use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use examlens_core::{AttemptError, ContentPart, InferenceTransport, UpstreamPayload};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Decoding parameters sent with every request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            top_p: 0.8,
            top_k: 40,
        }
    }
}

/// Google Gemini `generateContent` transport.
pub struct GeminiTransport {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    generation: GenerationConfig,
}

impl GeminiTransport {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
            generation: GenerationConfig::default(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_generation_config(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    /// Reuse an existing HTTP client (connection pool, proxy settings).
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn build_request<'a>(&self, payload: &'a UpstreamPayload) -> GenerateContentRequest<'a> {
        let parts = payload
            .parts()
            .iter()
            .map(|part| match part {
                ContentPart::Text(text) => Part::Text { text },
                ContentPart::InlineImage { mime_type, data } => Part::InlineData {
                    inline_data: InlineData { mime_type, data },
                },
            })
            .collect();

        GenerateContentRequest {
            contents: vec![Content { parts }],
            generation_config: self.generation,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

/// Text of the first candidate's first content part, if any.
fn extract_text(body: &str) -> Result<Option<String>> {
    let response: GenerateContentResponse =
        serde_json::from_str(body).context("Failed to parse Gemini response")?;
    Ok(response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().next())
        .and_then(|part| part.text))
}

/// Turn a non-2xx answer into an [`AttemptError`] carrying the best available
/// diagnostic.
fn map_http_error(status: u16, body: &str) -> AttemptError {
    match serde_json::from_str::<ErrorWrapper>(body) {
        Ok(wrapper) => {
            let message = wrapper
                .error
                .message
                .unwrap_or_else(|| format!("Gemini returned {status}"));
            let upstream_status = wrapper.error.status.filter(|s| !s.is_empty());
            let message = match &upstream_status {
                Some(s) => format!("{s}: {message}"),
                None => message,
            };
            AttemptError::http(status, upstream_status, message)
        }
        Err(_) if body.trim().is_empty() => {
            AttemptError::http(status, None, format!("Gemini returned {status}"))
        }
        Err(_) => AttemptError::http(status, None, format!("Gemini returned {status}: {body}")),
    }
}

#[async_trait]
impl InferenceTransport for GeminiTransport {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, payload: &UpstreamPayload) -> Result<Option<String>, AttemptError> {
        let body = self.build_request(payload);

        debug!(
            model = %self.model,
            images = payload.image_count(),
            "Sending request to Gemini"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AttemptError::network(format!("Gemini HTTP request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AttemptError::network(format!("Failed to read Gemini response: {e}")))?;

        if !status.is_success() {
            return Err(map_http_error(status.as_u16(), &text));
        }

        extract_text(&text).map_err(|e| AttemptError::http(status.as_u16(), None, format!("{e:#}")))
    }
}
