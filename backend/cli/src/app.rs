//! Process wiring: config in, running server out.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use examlens_analyzer::providers::{GeminiTransport, GenerationConfig};
use examlens_analyzer::{Analyzer, RequestValidator, RetryPolicy, RetryingClient};
use examlens_config::{IdentityConfig, IdentityProviderKind, RelayConfig};
use examlens_core::{IdentityVerifier, RecorderMode, StateRecorder};
use examlens_gateway::{
    build_router, start_server, AppState, Lookups, ServerSettings, StaticTokenVerifier,
    TokenInfoVerifier,
};
use examlens_store::{IdentityRecorder, SessionRecorder, SqliteStore};

pub async fn run_server(config: RelayConfig) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid bind address {}:{}",
                config.server.bind, config.server.port
            )
        })?;

    info!(
        addr = %addr,
        mode = %config.recorder.mode,
        model = %config.upstream.model,
        db = %config.recorder.db_path,
        "Starting examlens relay"
    );

    let state = build_state(&config)?;
    let settings = ServerSettings {
        body_limit_bytes: config.server.body_limit_bytes,
        cors_origins: config.server.cors_origins.clone(),
    };
    start_server(addr, build_router(state, &settings)).await
}

/// Build the shared application state from a validated config.
pub fn build_state(config: &RelayConfig) -> Result<AppState> {
    let store = Arc::new(
        SqliteStore::open(&config.recorder.db_path)
            .with_context(|| format!("Failed to open store at {}", config.recorder.db_path))?,
    );

    let mode = config.recorder.mode;
    let (recorder, lookups): (Arc<dyn StateRecorder>, Lookups) = match mode {
        RecorderMode::Session => (
            Arc::new(SessionRecorder::new(store.clone())),
            Lookups::Sessions(store),
        ),
        RecorderMode::Identity => (
            Arc::new(IdentityRecorder::new(store.clone())),
            Lookups::Exams(store),
        ),
    };

    let upstream = &config.upstream;
    let api_key = upstream
        .api_key
        .clone()
        .context("upstream.apiKey is not configured")?;
    let transport = GeminiTransport::new(api_key, upstream.model.clone())
        .with_base_url(upstream.base_url.clone())
        .with_generation_config(GenerationConfig {
            temperature: upstream.temperature,
            top_p: upstream.top_p,
            top_k: upstream.top_k,
        });

    let policy = RetryPolicy::new(
        upstream.max_attempts,
        Duration::from_millis(upstream.retry_delay_ms),
    );
    let retry_after = policy.delay;

    let intent = config
        .intent
        .to_policy()
        .context("intent.fixedPrompt is required for the fixed intent policy")?;

    let analyzer = Analyzer::new(
        RequestValidator::new(intent, mode),
        RetryingClient::new(Arc::new(transport), policy),
        recorder,
    );

    Ok(AppState::new(
        Arc::new(analyzer),
        build_verifier(&config.identity)?,
        lookups,
        retry_after,
    ))
}

fn build_verifier(identity: &IdentityConfig) -> Result<Arc<dyn IdentityVerifier>> {
    Ok(match identity.provider {
        IdentityProviderKind::TokenInfo => {
            let url = identity
                .token_info_url
                .clone()
                .context("identity.tokenInfoUrl is not configured")?;
            let mut verifier = TokenInfoVerifier::new(url);
            if let Some(aud) = &identity.audience {
                verifier = verifier.with_audience(aud.clone());
            }
            Arc::new(verifier)
        }
        IdentityProviderKind::Static => {
            Arc::new(StaticTokenVerifier::new(identity.static_tokens.clone()))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(mode: RecorderMode) -> RelayConfig {
        let mut cfg = RelayConfig::default();
        cfg.upstream.api_key = Some("key".into());
        cfg.identity.provider = IdentityProviderKind::Static;
        cfg.identity.static_tokens.insert("t".into(), "u".into());
        cfg.recorder.mode = mode;
        cfg.recorder.db_path = ":memory:".into();
        cfg
    }

    #[test]
    fn builds_state_for_both_modes() {
        for mode in [RecorderMode::Session, RecorderMode::Identity] {
            let state = build_state(&config(mode)).unwrap();
            assert_eq!(state.mode(), mode);
            assert_eq!(state.lookups.mode(), mode);
            assert_eq!(state.retry_after, Duration::from_millis(2_000));
        }
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let mut cfg = config(RecorderMode::Identity);
        cfg.upstream.api_key = None;
        assert!(build_state(&cfg).is_err());
    }
}
