//! `examlens-config`: relay configuration management.
//!
//! Provides:
//! - Typed config schema (server, upstream, identity, recorder, intent, logging)
//! - YAML loading from the config directory
//! - `${ENV_VAR}` substitution and environment overrides
//! - Default value application
//! - Validation with errors and warnings
//! - Redaction for safe display

pub mod defaults;
pub mod env;
pub mod io;
pub mod redact;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use env::{apply_env_overrides, resolve_env_vars, resolve_env_vars_with, MissingEnvVarError};
pub use io::{config_dir, config_file_path, load_raw_config, resolve_config_path};
pub use redact::redact;
pub use schema::{
    IdentityConfig, IdentityProviderKind, IntentConfig, IntentPolicyKind, LoggingConfig,
    RecorderConfig, RelayConfig, ServerConfig, UpstreamConfig,
};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

/// Load, substitute env vars, apply env overrides and defaults, and validate.
///
/// This is the main entry point for loading a config at runtime. Validation
/// problems are logged and returned in the report; the caller decides
/// whether errors are fatal.
pub async fn load_and_prepare(path: &Path) -> Result<(RelayConfig, ValidationReport)> {
    let env: HashMap<String, String> = std::env::vars().collect();
    load_and_prepare_with(path, &env).await
}

/// [`load_and_prepare`] with an explicit environment (useful for testing).
pub async fn load_and_prepare_with(
    path: &Path,
    env: &HashMap<String, String>,
) -> Result<(RelayConfig, ValidationReport)> {
    let raw = load_raw_config(path).await?;

    let value = resolve_env_vars_with(&raw, env).context("Failed to resolve env vars in config")?;

    let config: RelayConfig =
        serde_json::from_value(value).context("Failed to deserialize config")?;

    let config = apply_env_overrides(config, env)?;
    let config = apply_all_defaults(config);

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }

    Ok((config, report))
}
