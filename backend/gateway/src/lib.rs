//! examlens HTTP gateway
//!
//! Bearer authentication, the `POST /analyze-exam` endpoint, read-only
//! lookups and health, wired into one axum router.

pub mod analyze;
pub mod auth;
pub mod error;
pub mod health;
pub mod lookups;
pub mod server;
pub mod state;
pub mod verifiers;

pub use auth::RequireAuth;
pub use error::ApiError;
pub use server::{build_router, start_server, ServerSettings};
pub use state::{AppState, Lookups};
pub use verifiers::{StaticTokenVerifier, TokenInfoVerifier};
