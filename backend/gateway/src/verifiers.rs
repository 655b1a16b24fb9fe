//! Identity verifiers: bearer credential in, caller identity out.

use std::collections::HashMap;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use examlens_core::{CallerIdentity, IdentityVerifier};

/// Verifies tokens against an HTTP token-introspection endpoint
/// (Google `tokeninfo` shape).
pub struct TokenInfoVerifier {
    client: Client,
    url: String,
    audience: Option<String>,
}

impl TokenInfoVerifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            audience: None,
        }
    }

    /// Require the `aud` claim to equal `audience`.
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl IdentityVerifier for TokenInfoVerifier {
    async fn verify(&self, token: &str) -> Result<CallerIdentity> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("id_token", token)])
            .send()
            .await
            .context("token introspection request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("token introspection returned {status}");
        }

        let claims: Value = response
            .json()
            .await
            .context("token introspection returned invalid JSON")?;

        identity_from_claims(claims, self.audience.as_deref(), chrono::Utc::now().timestamp())
    }
}

/// Numeric claims arrive as numbers or as decimal strings.
fn claim_i64(claims: &Value, key: &str) -> Option<i64> {
    match claims.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn identity_from_claims(claims: Value, audience: Option<&str>, now: i64) -> Result<CallerIdentity> {
    let subject = claims
        .get("sub")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("token has no subject"))?
        .to_string();

    if let Some(expected) = audience {
        let aud = claims.get("aud").and_then(Value::as_str);
        if aud != Some(expected) {
            bail!("token audience mismatch");
        }
    }

    if let Some(exp) = claim_i64(&claims, "exp") {
        if exp <= now {
            bail!("token expired");
        }
    }

    let mut identity = CallerIdentity::new(subject);
    if let Value::Object(map) = claims {
        for key in ["email", "aud", "exp"] {
            if let Some(value) = map.get(key) {
                identity = identity.with_claim(key, value.clone());
            }
        }
    }
    debug!(subject = %identity.subject, "Token verified");
    Ok(identity)
}

/// Fixed token → subject table. Development and tests only.
#[derive(Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, String>,
}

impl StaticTokenVerifier {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }

    pub fn with_token(mut self, token: impl Into<String>, subject: impl Into<String>) -> Self {
        self.tokens.insert(token.into(), subject.into());
        self
    }
}

#[async_trait]
impl IdentityVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Result<CallerIdentity> {
        self.tokens
            .get(token)
            .map(CallerIdentity::new)
            .ok_or_else(|| anyhow!("unknown static token"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_valid_claims() {
        let claims = json!({"sub": "123", "aud": "app", "email": "a@b.c", "exp": "2000"});
        let identity = identity_from_claims(claims, Some("app"), 1_000).unwrap();
        assert_eq!(identity.subject, "123");
        assert_eq!(identity.claims["email"], "a@b.c");
    }

    #[test]
    fn rejects_missing_subject_wrong_audience_and_expired() {
        assert!(identity_from_claims(json!({"aud": "app"}), None, 0).is_err());
        assert!(identity_from_claims(json!({"sub": "1", "aud": "other"}), Some("app"), 0).is_err());
        assert!(identity_from_claims(json!({"sub": "1", "exp": 10}), None, 10).is_err());
    }

    #[tokio::test]
    async fn static_verifier_maps_known_tokens_only() {
        let verifier = StaticTokenVerifier::default().with_token("t-1", "alice");
        assert_eq!(verifier.verify("t-1").await.unwrap().subject, "alice");
        assert!(verifier.verify("t-2").await.is_err());
    }
}
