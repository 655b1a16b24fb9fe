//! Relay configuration schema.
//!
//! Typed for serde YAML/JSON deserialization. Every section has a default so
//! a missing or partial file still yields a complete config.

use examlens_core::{IntentPolicy, RecorderMode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for the relay.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelayConfig {
    /// HTTP listener settings
    pub server: ServerConfig,

    /// External inference service
    pub upstream: UpstreamConfig,

    /// Bearer credential verification
    pub identity: IdentityConfig,

    /// Durable state keying scheme and storage
    pub recorder: RecorderConfig,

    /// Where the instructional prompt comes from
    pub intent: IntentConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Maximum accepted request body, in bytes.
    pub body_limit_bytes: usize,
    /// Allowed CORS origins; empty allows any origin.
    pub cors_origins: Vec<String>,
}

// ---------------------------------------------------------------------------
// Upstream
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpstreamConfig {
    pub base_url: String,
    /// Model identifier; deployment specific.
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    /// Total attempts per request, first call included.
    pub max_attempts: u32,
    /// Fixed wait between attempts.
    pub retry_delay_ms: u64,
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IdentityProviderKind {
    /// Fixed token → subject table; for development and tests.
    Static,
    /// HTTP token-introspection endpoint.
    #[default]
    TokenInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdentityConfig {
    pub provider: IdentityProviderKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_info_url: Option<String>,
    /// Required `aud` claim, when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    /// token → subject, used by the static provider.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub static_tokens: HashMap<String, String>,
}

// ---------------------------------------------------------------------------
// Recorder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecorderConfig {
    pub mode: RecorderMode,
    /// SQLite file path; `:memory:` keeps state in process.
    pub db_path: String,
}

// ---------------------------------------------------------------------------
// Intent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IntentPolicyKind {
    #[default]
    CallerSupplied,
    Fixed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntentConfig {
    pub policy: IntentPolicyKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_prompt: Option<String>,
}

impl IntentConfig {
    /// Resolve to the runtime policy. A `fixed` policy without a prompt
    /// resolves to `None`; validation reports it.
    pub fn to_policy(&self) -> Option<IntentPolicy> {
        match self.policy {
            IntentPolicyKind::CallerSupplied => Some(IntentPolicy::CallerSupplied),
            IntentPolicyKind::Fixed => self
                .fixed_prompt
                .as_ref()
                .filter(|p| !p.trim().is_empty())
                .map(|p| IntentPolicy::Fixed(p.clone())),
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    pub level: String,
    /// Directory for rolling NDJSON logs; resolved by defaults when empty.
    pub dir: String,
}
