pub mod analyzer;
pub mod client;
pub mod payload;
pub mod providers;
pub mod retry;
pub mod validate;

pub use analyzer::Analyzer;
pub use client::RetryingClient;
pub use payload::assemble;
pub use retry::{is_transient_overload, RetryPolicy, RetryState};
pub use validate::{AnalyzeBody, RawImagePart, RequestValidator};
