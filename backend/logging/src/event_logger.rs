//! Relay Event Logger
//!
//! Lifecycle events of an analysis request (received, upstream attempt,
//! recorded, failed) emitted as structured entries on the `relay_events`
//! target.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::redact::redact_sensitive_data;

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayEvent {
    Received {
        images: usize,
        mode: String,
    },
    UpstreamAttempt {
        attempt: u32,
        outcome: String,
    },
    Recorded {
        mode: String,
        status: String,
    },
    Failed {
        code: String,
        error_msg: String,
    },
}

#[derive(Debug, Serialize)]
pub struct EventLogEntry {
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
    pub event: RelayEvent,
}

pub struct EventLogger;

impl EventLogger {
    /// Logs a relay event, redacting free-text fields first.
    pub fn log_event(correlation_id: &str, mut event: RelayEvent) {
        match &mut event {
            RelayEvent::UpstreamAttempt { outcome, .. } => {
                *outcome = redact_sensitive_data(outcome);
            }
            RelayEvent::Failed { error_msg, .. } => {
                *error_msg = redact_sensitive_data(error_msg);
            }
            RelayEvent::Received { .. } | RelayEvent::Recorded { .. } => {}
        }

        let entry = EventLogEntry {
            correlation_id: correlation_id.into(),
            timestamp: Utc::now(),
            event,
        };

        info!(target: "relay_events", event = ?entry, "Relay event");
    }
}
