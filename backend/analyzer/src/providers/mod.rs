pub mod gemini;
pub mod mock;

pub use gemini::{GeminiTransport, GenerationConfig};
pub use mock::ScriptedTransport;
