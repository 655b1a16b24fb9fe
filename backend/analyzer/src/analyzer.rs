use std::sync::Arc;

use tracing::{error, info, warn};

use examlens_core::{
    AnalysisOutcome, CallerIdentity, Extraction, RelayError, StateRecorder,
};
use examlens_logging::{EventLogger, RelayEvent};

use crate::client::RetryingClient;
use crate::payload::assemble;
use crate::validate::{AnalyzeBody, RequestValidator};

/// The analysis pipeline for one authenticated request:
/// validate, assemble, record `begin`, call upstream with retry, record
/// `finish`.
///
/// Holds no per-request state; one instance serves all concurrent requests.
pub struct Analyzer {
    validator: RequestValidator,
    client: RetryingClient,
    recorder: Arc<dyn StateRecorder>,
}

impl Analyzer {
    pub fn new(
        validator: RequestValidator,
        client: RetryingClient,
        recorder: Arc<dyn StateRecorder>,
    ) -> Self {
        Self {
            validator,
            client,
            recorder,
        }
    }

    pub fn recorder(&self) -> &Arc<dyn StateRecorder> {
        &self.recorder
    }

    /// Run the pipeline for a caller already verified by the gateway.
    ///
    /// Validation failures return before any upstream call or store write.
    /// A failing `finish` write is logged and does not change the returned
    /// outcome.
    pub async fn analyze(&self, caller: CallerIdentity, body: AnalyzeBody) -> AnalysisOutcome {
        let subject = caller.subject.clone();
        let request = match self.validator.validate(body, caller) {
            Ok(request) => request,
            Err(e) => {
                info!(subject = %subject, error = %e, "Rejected invalid analysis request");
                return Err(e);
            }
        };

        let correlation_id = request
            .session_id
            .clone()
            .unwrap_or_else(|| subject.clone());
        let mode = self.recorder.mode();

        EventLogger::log_event(
            &correlation_id,
            RelayEvent::Received {
                images: request.fragments.len(),
                mode: mode.to_string(),
            },
        );

        let payload = assemble(&request);

        if let Err(e) = self.recorder.begin(&request).await {
            error!(
                correlation_id = %correlation_id,
                mode = %mode,
                error = %e,
                "Failed to record processing state"
            );
            let err = RelayError::RecorderUnavailable(e.to_string());
            EventLogger::log_event(
                &correlation_id,
                RelayEvent::Failed {
                    code: err.code().into(),
                    error_msg: e.to_string(),
                },
            );
            return Err(err);
        }

        let outcome = self.client.call(&payload, &correlation_id).await;

        match self.recorder.finish(&request, &outcome).await {
            Ok(()) => EventLogger::log_event(
                &correlation_id,
                RelayEvent::Recorded {
                    mode: mode.to_string(),
                    status: outcome_label(&outcome).into(),
                },
            ),
            Err(e) => warn!(
                correlation_id = %correlation_id,
                mode = %mode,
                error = %e,
                "Failed to record analysis outcome; response unaffected"
            ),
        }

        if let Err(e) = &outcome {
            EventLogger::log_event(
                &correlation_id,
                RelayEvent::Failed {
                    code: e.code().into(),
                    error_msg: e.to_string(),
                },
            );
        }

        outcome
    }
}

fn outcome_label(outcome: &AnalysisOutcome) -> &'static str {
    match outcome {
        Ok(Extraction::Text(_)) => "completed",
        Ok(Extraction::Empty) => "empty",
        Err(e) => e.code(),
    }
}
