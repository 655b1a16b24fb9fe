//! Durable state for examlens.
//!
//! Two document kinds live here: per-session status records and the
//! per-caller append-only exam log. Each has a SQLite and an in-memory
//! implementation, and each backs one [`StateRecorder`] mode.
//!
//! [`StateRecorder`]: examlens_core::StateRecorder

pub mod documents;
pub mod memory;
pub mod recorder;
pub mod sqlite;

pub use documents::{ExamLog, SessionStore};
pub use memory::InMemoryStore;
pub use recorder::{IdentityRecorder, SessionRecorder, SESSION_ERROR_DETAIL};
pub use sqlite::SqliteStore;
