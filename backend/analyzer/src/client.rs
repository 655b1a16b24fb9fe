use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use examlens_core::{
    AnalysisOutcome, Extraction, InferenceTransport, RelayError, Sleeper, TokioSleeper,
    UpstreamPayload,
};
use examlens_logging::{redact_sensitive_data, EventLogger, RelayEvent};

use crate::retry::{RetryPolicy, RetryState};

/// Calls the inference transport, retrying transient overload with a fixed
/// delay until the policy's attempt ceiling.
///
/// The same payload is resent on every attempt. Any non-overload failure ends
/// the loop at once without consuming an attempt.
pub struct RetryingClient {
    transport: Arc<dyn InferenceTransport>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryingClient {
    pub fn new(transport: Arc<dyn InferenceTransport>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run the retry loop. `correlation_id` only tags log lines.
    pub async fn call(&self, payload: &UpstreamPayload, correlation_id: &str) -> AnalysisOutcome {
        let mut state = RetryState::default();
        let provider = self.transport.name();
        let start = Instant::now();

        loop {
            let attempt = state.attempts + 1;
            debug!(provider = %provider, attempt, "Calling upstream");

            match self.transport.generate(payload).await {
                Ok(text) => {
                    let extraction = match text {
                        Some(text) if !text.trim().is_empty() => Extraction::Text(text),
                        _ => Extraction::Empty,
                    };
                    info!(
                        provider = %provider,
                        attempt,
                        empty = extraction.is_empty(),
                        latency_ms = start.elapsed().as_millis() as u64,
                        "Upstream responded"
                    );
                    EventLogger::log_event(
                        correlation_id,
                        RelayEvent::UpstreamAttempt {
                            attempt,
                            outcome: if extraction.is_empty() { "empty" } else { "ok" }.into(),
                        },
                    );
                    return Ok(extraction);
                }
                Err(err) if self.policy.is_retryable(&err) => {
                    EventLogger::log_event(
                        correlation_id,
                        RelayEvent::UpstreamAttempt {
                            attempt,
                            outcome: format!("overloaded: {err}"),
                        },
                    );
                    if !state.record_overload(&self.policy, &err) {
                        let last_error = state
                            .last_error
                            .as_deref()
                            .map(redact_sensitive_data)
                            .unwrap_or_default();
                        warn!(
                            provider = %provider,
                            attempts = state.attempts,
                            last_error = %last_error,
                            "Upstream retry policy exhausted"
                        );
                        return Err(RelayError::UpstreamOverloaded {
                            attempts: state.attempts,
                        });
                    }
                    self.sleeper
                        .sleep(self.policy.delay_for(state.attempts))
                        .await;
                }
                Err(err) => {
                    let message = redact_sensitive_data(&err.message);
                    warn!(
                        provider = %provider,
                        attempt,
                        status = ?err.status,
                        error = %message,
                        "Upstream failed"
                    );
                    EventLogger::log_event(
                        correlation_id,
                        RelayEvent::UpstreamAttempt {
                            attempt,
                            outcome: format!("failed: {message}"),
                        },
                    );
                    return Err(RelayError::UpstreamFailure(message));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use examlens_core::{AttemptError, ImageFragment};

    use crate::providers::mock::ScriptedTransport;

    #[derive(Default)]
    struct RecordingSleeper {
        waits: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.waits.lock().unwrap().push(duration);
        }
    }

    fn payload() -> UpstreamPayload {
        UpstreamPayload::new(
            "prompt",
            &[ImageFragment {
                mime_type: "image/png".into(),
                data: "aGVsbG8=".into(),
            }],
        )
    }

    fn overloaded() -> AttemptError {
        AttemptError::http(429, Some("RESOURCE_EXHAUSTED".into()), "quota exceeded")
    }

    fn client(transport: Arc<ScriptedTransport>, sleeper: Arc<RecordingSleeper>) -> RetryingClient {
        RetryingClient::new(transport, RetryPolicy::default()).with_sleeper(sleeper)
    }

    #[tokio::test]
    async fn succeeds_on_third_attempt_after_two_overloads() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Err(overloaded()),
            Err(overloaded()),
            Ok(Some("result".into())),
        ]));
        let sleeper = Arc::new(RecordingSleeper::default());

        let outcome = client(transport.clone(), sleeper.clone())
            .call(&payload(), "t")
            .await;

        assert_eq!(outcome, Ok(Extraction::Text("result".into())));
        assert_eq!(transport.calls(), 3);
        assert_eq!(
            *sleeper.waits.lock().unwrap(),
            vec![Duration::from_secs(2), Duration::from_secs(2)]
        );
    }

    #[tokio::test]
    async fn exhausts_after_three_overloads() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Err(overloaded()),
            Err(overloaded()),
            Err(overloaded()),
            Ok(Some("never reached".into())),
        ]));
        let sleeper = Arc::new(RecordingSleeper::default());

        let outcome = client(transport.clone(), sleeper.clone())
            .call(&payload(), "t")
            .await;

        assert_eq!(outcome, Err(RelayError::UpstreamOverloaded { attempts: 3 }));
        assert_eq!(transport.calls(), 3);
        assert_eq!(sleeper.waits.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn fatal_error_is_not_retried() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Err(AttemptError::http(
                400,
                Some("INVALID_ARGUMENT".into()),
                "INVALID_ARGUMENT: bad image",
            )),
            Ok(Some("never reached".into())),
        ]));
        let sleeper = Arc::new(RecordingSleeper::default());

        let outcome = client(transport.clone(), sleeper.clone())
            .call(&payload(), "t")
            .await;

        assert_eq!(
            outcome,
            Err(RelayError::UpstreamFailure("INVALID_ARGUMENT: bad image".into()))
        );
        assert_eq!(transport.calls(), 1);
        assert!(sleeper.waits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_text_is_empty_result_not_retry() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(None)]));
        let sleeper = Arc::new(RecordingSleeper::default());

        let outcome = client(transport.clone(), sleeper).call(&payload(), "t").await;

        assert_eq!(outcome, Ok(Extraction::Empty));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn retries_resend_identical_payload() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Err(overloaded()),
            Ok(Some("ok".into())),
        ]));
        let sleeper = Arc::new(RecordingSleeper::default());
        let sent = payload();

        client(transport.clone(), sleeper).call(&sent, "t").await.unwrap();

        let seen = transport.payloads();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|p| p == &sent));
    }
}
