use tracing::debug;

use examlens_core::{AnalysisRequest, UpstreamPayload};

/// Build the upstream payload for a validated request.
///
/// The instructional text comes first, then every image fragment in input
/// order with its MIME type and data forwarded verbatim.
pub fn assemble(request: &AnalysisRequest) -> UpstreamPayload {
    let payload = UpstreamPayload::new(request.intent.clone(), &request.fragments);
    debug!(
        images = payload.image_count(),
        intent_len = request.intent.len(),
        "Assembled upstream payload"
    );
    payload
}
