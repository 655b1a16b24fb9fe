//! Environment handling for config values.
//!
//! Two mechanisms:
//! - `${VAR_NAME}` substitution inside string values of the config file.
//!   Only uppercase `[A-Z_][A-Z0-9_]*` names are matched; `$${VAR}` escapes
//!   to a literal `${VAR}`.
//! - Well-known variables (`GOOGLE_API_KEY`, `EXAMLENS_PORT`, …) that
//!   override file values outright.

use anyhow::{bail, Context, Result};
use examlens_core::RecorderMode;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;

use crate::schema::{IdentityProviderKind, IntentPolicyKind, RelayConfig};

/// `$${NAME}` (escaped) or `${NAME}`.
static ENV_VAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$?\$\{([A-Z_][A-Z0-9_]*)\}").unwrap());

/// Error returned for missing env vars.
#[derive(Debug, thiserror::Error)]
#[error("Missing env var \"{var_name}\" referenced at config path: {config_path}")]
pub struct MissingEnvVarError {
    pub var_name: String,
    pub config_path: String,
}

/// Substitute `${VAR}` references from the process environment.
pub fn resolve_env_vars(value: &Value) -> Result<Value> {
    resolve_env_vars_with(value, &std::env::vars().collect())
}

/// Substitute env vars using a provided map (useful for testing).
///
/// Walks the value tree; only string leaves are processed. A referenced
/// variable that is unset or empty is an error.
pub fn resolve_env_vars_with(value: &Value, env: &HashMap<String, String>) -> Result<Value> {
    substitute_value(value, env, "")
}

fn substitute_value(value: &Value, env: &HashMap<String, String>, path: &str) -> Result<Value> {
    match value {
        Value::String(s) => Ok(Value::String(substitute_string(s, env, path)?)),
        Value::Array(arr) => arr
            .iter()
            .enumerate()
            .map(|(i, v)| substitute_value(v, env, &format!("{path}[{i}]")))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut result = serde_json::Map::new();
            for (k, v) in map {
                let child_path = if path.is_empty() {
                    k.clone()
                } else {
                    format!("{path}.{k}")
                };
                result.insert(k.clone(), substitute_value(v, env, &child_path)?);
            }
            Ok(Value::Object(result))
        }
        other => Ok(other.clone()),
    }
}

fn substitute_string(s: &str, env: &HashMap<String, String>, path: &str) -> Result<String> {
    if !s.contains('$') {
        return Ok(s.to_string());
    }

    let mut missing: Option<MissingEnvVarError> = None;
    let substituted = ENV_VAR_PATTERN.replace_all(s, |caps: &Captures| {
        let whole = &caps[0];
        let name = &caps[1];
        if whole.starts_with("$$") {
            return format!("${{{name}}}");
        }
        match env.get(name) {
            Some(val) if !val.is_empty() => val.clone(),
            _ => {
                missing.get_or_insert_with(|| MissingEnvVarError {
                    var_name: name.to_string(),
                    config_path: path.to_string(),
                });
                String::new()
            }
        }
    });

    if let Some(err) = missing {
        bail!(err);
    }
    Ok(substituted.into_owned())
}

/// Apply well-known environment variables over file values.
pub fn apply_env_overrides(
    mut config: RelayConfig,
    env: &HashMap<String, String>,
) -> Result<RelayConfig> {
    let get = |name: &str| env.get(name).map(|v| v.trim()).filter(|v| !v.is_empty());

    if let Some(key) = get("GOOGLE_API_KEY") {
        config.upstream.api_key = Some(key.to_string());
    }
    if let Some(model) = get("EXAMLENS_MODEL") {
        config.upstream.model = model.to_string();
    }
    if let Some(url) = get("EXAMLENS_UPSTREAM_URL") {
        config.upstream.base_url = url.to_string();
    }
    if let Some(bind) = get("EXAMLENS_BIND") {
        config.server.bind = bind.to_string();
    }
    if let Some(port) = get("EXAMLENS_PORT").or_else(|| get("PORT")) {
        config.server.port = port
            .parse()
            .with_context(|| format!("Invalid port in environment: {port}"))?;
    }
    if let Some(db) = get("EXAMLENS_DB") {
        config.recorder.db_path = db.to_string();
    }
    if let Some(mode) = get("EXAMLENS_MODE") {
        config.recorder.mode = match mode {
            "session" => RecorderMode::Session,
            "identity" => RecorderMode::Identity,
            other => bail!("Invalid EXAMLENS_MODE: {other} (expected session or identity)"),
        };
    }
    if let Some(url) = get("EXAMLENS_TOKENINFO_URL") {
        config.identity.provider = IdentityProviderKind::TokenInfo;
        config.identity.token_info_url = Some(url.to_string());
    }
    if let Some(aud) = get("EXAMLENS_AUDIENCE") {
        config.identity.audience = Some(aud.to_string());
    }
    if let Some(prompt) = get("EXAMLENS_FIXED_PROMPT") {
        config.intent.policy = IntentPolicyKind::Fixed;
        config.intent.fixed_prompt = Some(prompt.to_string());
    }
    if let Some(dir) = get("EXAMLENS_LOG_DIR") {
        config.logging.dir = dir.to_string();
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn substitutes_nested_var() {
        let v = json!({"upstream": {"apiKey": "${GEMINI_KEY}"}});
        let result = resolve_env_vars_with(&v, &env(&[("GEMINI_KEY", "abc")])).unwrap();
        assert_eq!(result["upstream"]["apiKey"], "abc");
    }

    #[test]
    fn error_names_missing_var_and_path() {
        let v = json!({"upstream": {"apiKey": "${MISSING_VAR}"}});
        let err = resolve_env_vars_with(&v, &HashMap::new()).unwrap_err().to_string();
        assert!(err.contains("MISSING_VAR"));
        assert!(err.contains("upstream.apiKey"));
    }

    #[test]
    fn escaped_reference_stays_literal() {
        let v = json!({"prompt": "keep $${LITERAL} but use ${NAME}"});
        let result = resolve_env_vars_with(&v, &env(&[("NAME", "x")])).unwrap();
        assert_eq!(result["prompt"], "keep ${LITERAL} but use x");
    }

    #[test]
    fn passthrough_non_var_strings_and_arrays() {
        let v = json!({"origins": ["http://a", "http://b"], "n": 3});
        let result = resolve_env_vars_with(&v, &HashMap::new()).unwrap();
        assert_eq!(result, v);
    }

    #[test]
    fn overrides_apply_over_file_values() {
        let cfg = apply_env_overrides(
            RelayConfig::default(),
            &env(&[
                ("GOOGLE_API_KEY", "k"),
                ("PORT", "8081"),
                ("EXAMLENS_MODE", "session"),
                ("EXAMLENS_FIXED_PROMPT", "read it"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.upstream.api_key.as_deref(), Some("k"));
        assert_eq!(cfg.server.port, 8081);
        assert_eq!(cfg.recorder.mode, RecorderMode::Session);
        assert_eq!(cfg.intent.policy, IntentPolicyKind::Fixed);
    }

    #[test]
    fn rejects_bad_mode_and_port() {
        assert!(apply_env_overrides(RelayConfig::default(), &env(&[("EXAMLENS_MODE", "both")])).is_err());
        assert!(apply_env_overrides(RelayConfig::default(), &env(&[("EXAMLENS_PORT", "http")])).is_err());
    }
}
