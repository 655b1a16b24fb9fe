//! Structured logging for examlens.
//!
//! Handles log redaction, JSON file output with daily rotation, and relay
//! lifecycle event logging.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{EventLogEntry, EventLogger, RelayEvent};
pub use logger::init_logger;
pub use redact::redact_sensitive_data;
