//! Config validation: checks with field paths and readable messages.

use crate::schema::{IdentityProviderKind, IntentPolicyKind, RelayConfig};
use thiserror::Error;

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &RelayConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_server(config, &mut report);
    validate_upstream(config, &mut report);
    validate_identity(config, &mut report);
    validate_intent(config, &mut report);
    report
}

fn validate_server(config: &RelayConfig, report: &mut ValidationReport) {
    if config.server.port == 0 {
        report.error("server.port", "Port must be non-zero");
    }
    if config.server.body_limit_bytes < 1024 * 1024 {
        report.warn(
            "server.bodyLimitBytes",
            "Body limit below 1 MiB will reject most image submissions",
        );
    }
}

fn validate_upstream(config: &RelayConfig, report: &mut ValidationReport) {
    let upstream = &config.upstream;
    if upstream.api_key.is_none() {
        report.error("upstream.apiKey", "Upstream API key is not configured");
    }
    if upstream.max_attempts == 0 {
        report.error("upstream.maxAttempts", "At least one attempt is required");
    }
    if !(0.0..=2.0).contains(&upstream.temperature) {
        report.error("upstream.temperature", "Temperature must be within 0.0..=2.0");
    } else if upstream.temperature > 0.5 {
        report.warn(
            "upstream.temperature",
            "High temperature makes extraction less deterministic",
        );
    }
    if !(0.0..=1.0).contains(&upstream.top_p) {
        report.error("upstream.topP", "topP must be within 0.0..=1.0");
    }
    if upstream.top_k == 0 {
        report.error("upstream.topK", "topK must be positive");
    }
    if !upstream.base_url.starts_with("http://") && !upstream.base_url.starts_with("https://") {
        report.error("upstream.baseUrl", "Base URL must be http(s)");
    }
}

fn validate_identity(config: &RelayConfig, report: &mut ValidationReport) {
    let identity = &config.identity;
    match identity.provider {
        IdentityProviderKind::TokenInfo => {
            if identity.token_info_url.as_deref().map_or(true, |u| u.trim().is_empty()) {
                report.error(
                    "identity.tokenInfoUrl",
                    "tokenInfo provider requires a token info URL",
                );
            }
        }
        IdentityProviderKind::Static => {
            if identity.static_tokens.is_empty() {
                report.error(
                    "identity.staticTokens",
                    "static provider requires at least one token",
                );
            } else {
                report.warn(
                    "identity.provider",
                    "static identity provider is meant for development only",
                );
            }
        }
    }
}

fn validate_intent(config: &RelayConfig, report: &mut ValidationReport) {
    if config.intent.policy == IntentPolicyKind::Fixed && config.intent.to_policy().is_none() {
        report.error("intent.fixedPrompt", "fixed intent policy requires a prompt");
    }
}
