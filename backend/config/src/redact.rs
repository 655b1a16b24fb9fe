//! Config redaction: safe-to-share snapshots with secrets masked.
//!
//! Used by `examlens check-config` and the startup log line.

use serde_json::{Map, Value};

use crate::schema::RelayConfig;

/// Keys whose string values are secrets.
static SENSITIVE_KEYS: &[&str] = &["apiKey", "api_key", "token", "secret", "password"];

/// Maps whose keys (not values) are secrets. Each key becomes a numbered
/// placeholder so entries sharing a prefix stay distinct.
static SENSITIVE_MAP_KEYS: &[&str] = &["staticTokens"];

/// Serialize the config with every sensitive field replaced by a short hint.
pub fn redact(config: &RelayConfig) -> Value {
    match serde_json::to_value(config) {
        Ok(value) => redact_value(&value, ""),
        Err(_) => Value::Null,
    }
}

fn is_sensitive(key: &str, set: &[&str]) -> bool {
    set.iter().any(|k| k.eq_ignore_ascii_case(key))
}

/// First four characters followed by `***`; short secrets are fully masked.
fn mask(s: &str) -> String {
    if s.chars().count() > 8 {
        format!("{}***", s.chars().take(4).collect::<String>())
    } else {
        "***".to_string()
    }
}

fn redact_value(value: &Value, key: &str) -> Value {
    match value {
        Value::String(s) if is_sensitive(key, SENSITIVE_KEYS) && !s.is_empty() => {
            Value::String(mask(s))
        }
        Value::Array(arr) => Value::Array(arr.iter().map(|v| redact_value(v, key)).collect()),
        Value::Object(map) if is_sensitive(key, SENSITIVE_MAP_KEYS) => {
            let masked: Map<String, Value> = map
                .iter()
                .enumerate()
                .map(|(i, (k, v))| (format!("#{} {}", i + 1, mask(k)), v.clone()))
                .collect();
            Value::Object(masked)
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), redact_value(v, k)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_api_key_with_hint() {
        let mut cfg = RelayConfig::default();
        cfg.upstream.api_key = Some("AIzaSyExampleExampleExample".into());
        let redacted = redact(&cfg);
        assert_eq!(redacted["upstream"]["apiKey"], "AIza***");
    }

    #[test]
    fn masks_static_token_keys_but_keeps_subjects() {
        let mut cfg = RelayConfig::default();
        cfg.identity
            .static_tokens
            .insert("dev-token-0123456789".into(), "dev-user".into());
        let redacted = redact(&cfg);
        let tokens = redacted["identity"]["staticTokens"].as_object().unwrap();
        assert_eq!(tokens.get("#1 dev-***").unwrap(), "dev-user");
    }

    #[test]
    fn static_tokens_sharing_a_prefix_stay_distinct() {
        let mut cfg = RelayConfig::default();
        let tokens = &mut cfg.identity.static_tokens;
        tokens.insert("dev-token-aaaaaaaaaa".into(), "alice".into());
        tokens.insert("dev-token-bbbbbbbbbb".into(), "bob".into());
        let redacted = redact(&cfg);
        let masked = redacted["identity"]["staticTokens"].as_object().unwrap();
        assert_eq!(masked.len(), 2);
        let mut subjects: Vec<&str> = masked.values().filter_map(|v| v.as_str()).collect();
        subjects.sort_unstable();
        assert_eq!(subjects, ["alice", "bob"]);
        assert!(masked.keys().all(|k| !k.contains("aaaa") && !k.contains("bbbb")));
    }

    #[test]
    fn passthrough_non_sensitive() {
        let redacted = redact(&RelayConfig::default());
        assert_eq!(redacted["logging"]["level"], "info");
        assert_eq!(redacted["upstream"]["model"], "gemini-1.5-flash-latest");
    }
}
