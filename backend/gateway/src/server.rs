//! Router assembly and the HTTP listener.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use examlens_core::RecorderMode;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, instrument, warn};

use crate::analyze::analyze_exam;
use crate::health::health;
use crate::lookups::{get_session, list_exams};
use crate::state::AppState;

/// Listener-level settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub body_limit_bytes: usize,
    /// Empty allows any origin.
    pub cors_origins: Vec<String>,
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Build the router. The lookup route follows the recorder mode.
pub fn build_router(state: AppState, settings: &ServerSettings) -> Router {
    let mut router: Router<AppState> = Router::new()
        .route("/analyze-exam", post(analyze_exam))
        .route("/health", get(health));

    router = match state.lookups.mode() {
        RecorderMode::Session => router.route("/sessions/:id", get(get_session)),
        RecorderMode::Identity => router.route("/exams", get(list_exams)),
    };

    router
        .layer(DefaultBodyLimit::max(settings.body_limit_bytes))
        .layer(cors_layer(&settings.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `app` until Ctrl-C.
#[instrument(skip(app))]
pub async fn start_server(addr: SocketAddr, app: Router) -> Result<()> {
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("examlens listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
            }
        })
        .await
        .context("HTTP server error")?;
    Ok(())
}
