//! Retry policy for the upstream inference call: fixed-interval backoff with
//! a ceiling on total attempts, retrying only transient overload.

use std::time::Duration;

use tracing::warn;

use examlens_core::AttemptError;

/// Default ceiling on total upstream attempts per request.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default wait between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Whether an attempt failure signals temporary capacity exhaustion upstream.
///
/// HTTP 429/503, or the upstream error statuses `RESOURCE_EXHAUSTED` and
/// `UNAVAILABLE`. Network faults are not overload.
pub fn is_transient_overload(err: &AttemptError) -> bool {
    if matches!(err.status, Some(429) | Some(503)) {
        return true;
    }
    matches!(
        err.upstream_status.as_deref(),
        Some("RESOURCE_EXHAUSTED") | Some("UNAVAILABLE")
    )
}

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, first call included.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
    classifier: fn(&AttemptError) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
            classifier: is_transient_overload,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            ..Default::default()
        }
    }

    /// Replace the retryable-error predicate.
    pub fn with_classifier(mut self, classifier: fn(&AttemptError) -> bool) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn is_retryable(&self, err: &AttemptError) -> bool {
        (self.classifier)(err)
    }

    /// Fixed interval; the attempt number does not change the delay.
    pub fn delay_for(&self, _attempt_number: u32) -> Duration {
        self.delay
    }

    pub fn should_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }
}

/// Per-request retry bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct RetryState {
    /// Overloaded attempts so far.
    pub attempts: u32,
    /// Diagnostic of the most recent overloaded attempt.
    pub last_error: Option<String>,
}

impl RetryState {
    /// Record an overloaded attempt. Returns `true` when another attempt is
    /// allowed.
    pub fn record_overload(&mut self, policy: &RetryPolicy, error: &AttemptError) -> bool {
        self.attempts += 1;
        self.last_error = Some(error.message.clone());

        if policy.should_retry(self.attempts) {
            warn!(
                attempt = self.attempts,
                max = policy.max_attempts,
                delay_ms = policy.delay_for(self.attempts).as_millis() as u64,
                "Upstream overloaded, will retry"
            );
            true
        } else {
            false
        }
    }
}
