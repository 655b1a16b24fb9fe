//! Bearer authentication.
//!
//! Every protected handler takes [`RequireAuth`]; the handler body never
//! runs for an unverified caller.

use axum::{async_trait, extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use examlens_core::{CallerIdentity, RelayError};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// A caller whose bearer credential was verified.
pub struct RequireAuth(pub CallerIdentity);

fn bearer_token(parts: &Parts) -> Option<&str> {
    let header = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

#[async_trait]
impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts) else {
            debug!(path = %parts.uri.path(), "Missing or malformed Authorization header");
            return Err(RelayError::Unauthenticated.into());
        };

        match state.verifier.verify(token).await {
            Ok(caller) => Ok(RequireAuth(caller)),
            Err(e) => {
                // The reason stays in the log; the client only sees 401.
                warn!(path = %parts.uri.path(), error = %e, "Bearer credential rejected");
                Err(RelayError::Unauthenticated.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/analyze-exam");
        if let Some(h) = header {
            builder = builder.header(AUTHORIZATION, h);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn extracts_bearer_token() {
        assert_eq!(bearer_token(&parts(Some("Bearer abc"))), Some("abc"));
    }

    #[test]
    fn rejects_other_schemes_and_blank_tokens() {
        assert_eq!(bearer_token(&parts(Some("Basic abc"))), None);
        assert_eq!(bearer_token(&parts(Some("Bearer   "))), None);
        assert_eq!(bearer_token(&parts(None)), None);
    }
}
