//! Config defaults: section defaults and normalization applied after loading.

use examlens_core::RecorderMode;

use crate::io::config_dir;
use crate::schema::{LoggingConfig, RecorderConfig, RelayConfig, ServerConfig, UpstreamConfig};

pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;

/// Large enough for several embedded images.
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 25 * 1024 * 1024;

pub const DEFAULT_UPSTREAM_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";
pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_TOP_P: f32 = 0.8;
pub const DEFAULT_TOP_K: u32 = 40;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 2_000;

pub const DEFAULT_DB_PATH: &str = "examlens.db";
pub const DEFAULT_LOG_LEVEL: &str = "info";

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
            body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
            cors_origins: Vec::new(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_UPSTREAM_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
            top_k: DEFAULT_TOP_K,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            mode: RecorderMode::default(),
            db_path: DEFAULT_DB_PATH.to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            dir: String::new(),
        }
    }
}

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: RelayConfig) -> RelayConfig {
    let config = apply_upstream_defaults(config);
    let config = apply_recorder_defaults(config);
    apply_logging_defaults(config)
}

/// Blank strings in YAML mean "use the default".
fn apply_upstream_defaults(mut config: RelayConfig) -> RelayConfig {
    let upstream = &mut config.upstream;
    if upstream.base_url.trim().is_empty() {
        upstream.base_url = DEFAULT_UPSTREAM_BASE_URL.to_string();
    }
    upstream.base_url = upstream.base_url.trim_end_matches('/').to_string();
    if upstream.model.trim().is_empty() {
        upstream.model = DEFAULT_MODEL.to_string();
    }
    if upstream.api_key.as_deref().is_some_and(|k| k.trim().is_empty()) {
        upstream.api_key = None;
    }
    config
}

fn apply_recorder_defaults(mut config: RelayConfig) -> RelayConfig {
    if config.recorder.db_path.trim().is_empty() {
        config.recorder.db_path = DEFAULT_DB_PATH.to_string();
    }
    config
}

/// Logs go to `<config dir>/logs` unless a directory is set.
fn apply_logging_defaults(mut config: RelayConfig) -> RelayConfig {
    if config.logging.level.trim().is_empty() {
        config.logging.level = DEFAULT_LOG_LEVEL.to_string();
    }
    if config.logging.dir.trim().is_empty() {
        config.logging.dir = config_dir().join("logs").display().to_string();
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_blank_model_and_trims_base_url() {
        let mut cfg = RelayConfig::default();
        cfg.upstream.model = String::new();
        cfg.upstream.base_url = "http://localhost:9000/v1/".into();
        let cfg = apply_all_defaults(cfg);
        assert_eq!(cfg.upstream.model, DEFAULT_MODEL);
        assert_eq!(cfg.upstream.base_url, "http://localhost:9000/v1");
    }

    #[test]
    fn blank_api_key_becomes_none() {
        let mut cfg = RelayConfig::default();
        cfg.upstream.api_key = Some("   ".into());
        assert!(apply_all_defaults(cfg).upstream.api_key.is_none());
    }

    #[test]
    fn resolves_log_dir() {
        let cfg = apply_all_defaults(RelayConfig::default());
        assert!(cfg.logging.dir.ends_with("logs"));
    }

    #[test]
    fn does_not_override_user_set_values() {
        let mut cfg = RelayConfig::default();
        cfg.logging.dir = "/var/log/examlens".into();
        cfg.recorder.db_path = ":memory:".into();
        let cfg = apply_all_defaults(cfg);
        assert_eq!(cfg.logging.dir, "/var/log/examlens");
        assert_eq!(cfg.recorder.db_path, ":memory:");
    }
}
