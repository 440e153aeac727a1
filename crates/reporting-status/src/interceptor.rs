//! Side-effect interceptor that stops background detection after a confirmed report.

use std::sync::Arc;

use futures::{Stream, StreamExt};

use crate::collaborators::DetectionService;
use crate::coordinator::SubmissionState;

/// Stops the detection process when a submission loads a classification that
/// halts detection.
///
/// The interceptor never filters or alters states. Liveness is queried for
/// every qualifying state, with no lock held between the query and the stop.
#[derive(Clone)]
pub struct DetectionStopInterceptor {
    detection: Arc<dyn DetectionService>,
}

impl DetectionStopInterceptor {
    /// Create an interceptor for the given detection process.
    pub fn new(detection: Arc<dyn DetectionService>) -> Self {
        Self { detection }
    }

    /// Inspect one state, stopping detection if it qualifies.
    ///
    /// Returns `true` if a stop command was issued.
    pub fn intercept(&self, state: &SubmissionState) -> bool {
        let Some(classification) = state.loaded() else {
            return false;
        };
        if !classification.halts_detection() {
            return false;
        }
        if !self.detection.is_running() {
            tracing::debug!(%classification, "detection already stopped");
            return false;
        }
        tracing::info!(%classification, "stopping background detection after submission");
        self.detection.stop();
        true
    }

    /// Run every state of `states` through [`intercept`](Self::intercept) before forwarding it.
    pub fn attach<S>(self, states: S) -> impl Stream<Item = SubmissionState> + Send + 'static
    where
        S: Stream<Item = SubmissionState> + Send + 'static,
    {
        states.inspect(move |state| {
            self.intercept(state);
        })
    }
}

impl std::fmt::Debug for DetectionStopInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionStopInterceptor")
            .finish_non_exhaustive()
    }
}
