use std::time::Duration;

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use examlens_core::RelayError;
use serde::Serialize;
use tracing::error;

/// Caller-visible failures.
#[derive(Debug)]
pub enum ApiError {
    Relay(RelayError),
    /// Upstream stayed overloaded; carries the `Retry-After` hint.
    Busy { retry_after: Duration },
    NotFound,
    PayloadTooLarge,
    Internal,
}

impl ApiError {
    /// Map a pipeline error, attaching the retry hint to overload.
    pub fn from_relay(err: RelayError, retry_after: Duration) -> Self {
        match err {
            RelayError::UpstreamOverloaded { .. } => Self::Busy { retry_after },
            other => Self::Relay(other),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Relay(RelayError::Unauthenticated) => StatusCode::UNAUTHORIZED,
            Self::Relay(RelayError::InvalidRequest(_)) => StatusCode::BAD_REQUEST,
            Self::Relay(RelayError::UpstreamOverloaded { .. }) | Self::Busy { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Relay(RelayError::UpstreamFailure(_)) => StatusCode::BAD_GATEWAY,
            Self::Relay(RelayError::RecorderUnavailable(_)) | Self::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Relay(RelayError::UpstreamOverloaded { .. }) | Self::Busy { .. } => {
                "upstream is busy, retry later".into()
            }
            Self::Relay(RelayError::RecorderUnavailable(_)) => {
                "could not record analysis state".into()
            }
            Self::Relay(err) => err.to_string(),
            Self::NotFound => "not found".into(),
            Self::PayloadTooLarge => "request body too large".into(),
            Self::Internal => "internal error".into(),
        }
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        Self::Relay(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Whole seconds, rounded up.
fn retry_after_secs(delay: Duration) -> u64 {
    delay.as_millis().div_ceil(1000) as u64
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = ?self, "Request failed");
        }
        let mut response = (status, Json(ErrorBody { error: self.message() })).into_response();
        if let Self::Busy { retry_after } = self {
            response.headers_mut().insert(
                RETRY_AFTER,
                HeaderValue::from(retry_after_secs(retry_after)),
            );
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use examlens_core::FieldCategory;

    #[test]
    fn maps_statuses() {
        let cases = [
            (ApiError::Relay(RelayError::Unauthenticated), StatusCode::UNAUTHORIZED),
            (
                ApiError::Relay(RelayError::InvalidRequest(vec![FieldCategory::Images])),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::Relay(RelayError::UpstreamFailure("x".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ApiError::Relay(RelayError::RecorderUnavailable("x".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn overload_carries_retry_after() {
        let err = ApiError::from_relay(
            RelayError::UpstreamOverloaded { attempts: 3 },
            Duration::from_millis(2_000),
        );
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[RETRY_AFTER], "2");
    }

    #[test]
    fn retry_after_rounds_up() {
        assert_eq!(retry_after_secs(Duration::from_millis(1_500)), 2);
        assert_eq!(retry_after_secs(Duration::ZERO), 0);
    }
}
