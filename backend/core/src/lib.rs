pub mod error;
pub mod traits;
pub mod types;

pub use error::{AttemptError, FieldCategory, RelayError};
pub use traits::{IdentityVerifier, InferenceTransport, Sleeper, StateRecorder, TokioSleeper};
pub use types::{
    AnalysisOutcome, AnalysisRequest, CallerIdentity, ContentPart, ExamRecord, Extraction,
    ImageFragment, IntentPolicy, RecorderMode, SessionRecord, SessionStatus, UpstreamPayload,
    NO_TEXT_EXTRACTED,
};
