//! Report submission coordinator.
//!
//! Owns the submission [`AsyncStateCell`], runs submission attempts on a
//! background worker bound to the coordinator's [`TaskRegistry`], and exposes
//! the submission state and the composite reporting status as streams.
//!
//! ## Attempt lifecycle
//!
//! Every attempt that runs to completion publishes exactly
//! `Loading -> (Loaded | Error) -> Idle` on the cell. Failures become the
//! `Error` state and are never returned to the caller of
//! [`trigger_submission`](ReportSubmissionCoordinator::trigger_submission).
//!
//! A launched attempt is `Loading` by the time `trigger_submission` returns.
//! A queued attempt enters `Loading` on the worker once the attempt ahead of
//! it has published `Idle`.
//!
//! ## Cancellation
//!
//! [`shutdown`](ReportSubmissionCoordinator::shutdown) (or dropping the
//! coordinator) cancels the worker. An attempt cancelled mid-flight leaves the
//! cell where it was, usually `Loading`; no final `Idle` is published.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use parking_lot::Mutex;
use reporting_reactive::{
    AsyncState, AsyncStateCell, CancellationToken, ReactiveError, StreamCombiner, TaskRegistry,
};
use tokio::sync::{mpsc, oneshot};

use crate::collaborators::{DetectionService, DiagnosisRepository, ReportingRepository};
use crate::config::{CoordinatorConfig, OverlapPolicy};
use crate::errors::{ReportingError, SubmissionError};
use crate::interceptor::DetectionStopInterceptor;
use crate::status::{Classification, CompositeSnapshot, StatusSource};

/// State of the report submission.
pub type SubmissionState = AsyncState<Classification, SubmissionError>;

/// Result of one submission attempt.
pub type SubmissionResult = Result<Classification, SubmissionError>;

/// What happened to a call to `trigger_submission`.
#[derive(Debug)]
pub enum TriggerOutcome {
    /// The attempt starts right away
    Launched(SubmissionHandle),
    /// The attempt runs after the attempts already queued
    Queued(SubmissionHandle),
    /// Another attempt is in flight and the overlap policy rejects overlaps
    Rejected,
    /// The coordinator has been shut down
    Closed,
}

impl TriggerOutcome {
    /// Handle of the scheduled attempt, if any.
    pub fn into_handle(self) -> Option<SubmissionHandle> {
        match self {
            Self::Launched(handle) | Self::Queued(handle) => Some(handle),
            Self::Rejected | Self::Closed => None,
        }
    }
}

/// Completion handle of one scheduled submission attempt.
///
/// Dropping the handle does not cancel the attempt.
#[derive(Debug)]
pub struct SubmissionHandle {
    result: oneshot::Receiver<SubmissionResult>,
}

impl SubmissionHandle {
    /// Wait for the attempt to finish.
    ///
    /// Returns `None` if the attempt was cancelled before reaching `Idle`.
    pub async fn wait(self) -> Option<SubmissionResult> {
        self.result.await.ok()
    }
}

struct SubmissionRequest {
    /// The cell was moved to `Loading` when the attempt was accepted
    started: bool,
    reply: oneshot::Sender<SubmissionResult>,
}

/// Coordinates report submission for the reporting status screen.
pub struct ReportSubmissionCoordinator {
    config: CoordinatorConfig,
    cell: Arc<AsyncStateCell<Classification, SubmissionError>>,
    reporting: Arc<dyn ReportingRepository>,
    diagnosis: Arc<dyn DiagnosisRepository>,
    interceptor: DetectionStopInterceptor,
    requests: mpsc::UnboundedSender<SubmissionRequest>,
    /// Attempts accepted but not yet back to `Idle`
    pending: Arc<Mutex<usize>>,
    tasks: TaskRegistry,
}

impl ReportSubmissionCoordinator {
    /// Create a coordinator and start its submission worker.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        config: CoordinatorConfig,
        reporting: Arc<dyn ReportingRepository>,
        diagnosis: Arc<dyn DiagnosisRepository>,
        detection: Arc<dyn DetectionService>,
    ) -> Self {
        let cell = Arc::new(AsyncStateCell::new());
        let pending = Arc::new(Mutex::new(0));
        let tasks = TaskRegistry::new();
        let (requests, request_rx) = mpsc::unbounded_channel();

        let worker = SubmissionWorker {
            cell: cell.clone(),
            reporting: reporting.clone(),
            token: tasks.cancellation_token(),
            timeout: config.submission_timeout(),
            pending: pending.clone(),
        };
        tasks.spawn_cancellable(worker.run(request_rx));

        tracing::debug!(policy = ?config.overlap_policy, "report submission coordinator started");

        Self {
            config,
            cell,
            reporting,
            diagnosis,
            interceptor: DetectionStopInterceptor::new(detection),
            requests,
            pending,
            tasks,
        }
    }

    /// Forward the user's consent decision to the reporting backend.
    pub fn set_user_agreement(&self, agreement: bool) {
        tracing::debug!(agreement, "forwarding user agreement");
        self.reporting.set_user_agreement(agreement);
    }

    /// Schedule a submission attempt without waiting for it.
    ///
    /// While another attempt is in flight the configured [`OverlapPolicy`]
    /// decides between rejecting and queueing the new one.
    pub fn trigger_submission(&self) -> TriggerOutcome {
        if self.tasks.is_shut_down() {
            tracing::warn!("submission triggered after shutdown");
            return TriggerOutcome::Closed;
        }

        // Held until the request is queued so the worker cannot finish an
        // attempt between the idle check and the send.
        let mut pending = self.pending.lock();
        let started = if *pending == 0 {
            if let Err(err) = self.cell.start() {
                tracing::warn!(error = %err, "submission cell not idle, trigger rejected");
                return TriggerOutcome::Rejected;
            }
            true
        } else {
            match self.config.overlap_policy {
                OverlapPolicy::Reject => {
                    tracing::info!(
                        pending = *pending,
                        "submission already in flight, trigger rejected"
                    );
                    return TriggerOutcome::Rejected;
                }
                OverlapPolicy::Serialize => false,
            }
        };

        let (reply, result) = oneshot::channel();
        if self
            .requests
            .send(SubmissionRequest { started, reply })
            .is_err()
        {
            tracing::warn!("submission worker is gone");
            return TriggerOutcome::Closed;
        }
        *pending += 1;

        let handle = SubmissionHandle { result };
        if started {
            tracing::debug!("submission launched");
            TriggerOutcome::Launched(handle)
        } else {
            tracing::debug!(pending = *pending, "submission queued behind attempt in flight");
            TriggerOutcome::Queued(handle)
        }
    }

    /// Signal the reporting backend to leave the agreement screen.
    pub fn go_back(&self) {
        self.reporting.go_back();
    }

    /// Stream of submission states, starting with the current one.
    ///
    /// A `Loaded` state whose classification halts detection stops the
    /// detection process, if it is running, as the state is delivered to this
    /// subscriber.
    pub fn observe_submission_state(&self) -> BoxStream<'static, SubmissionState> {
        self.interceptor
            .clone()
            .attach(self.cell.observe())
            .boxed()
    }

    /// Stream of composite status snapshots.
    ///
    /// Emits once all three sources have produced a value, then once per
    /// source emission. The first source error is forwarded and ends the
    /// stream.
    pub fn observe_composite_status(
        &self,
    ) -> BoxStream<'static, Result<CompositeSnapshot, ReportingError>> {
        let sources = vec![
            self.reporting
                .observe_agreement_data()
                .map_ok(StatusSource::Agreement)
                .boxed(),
            self.reporting
                .observe_classification()
                .map_ok(StatusSource::Classification)
                .boxed(),
            self.diagnosis
                .observe_first_self_diagnose_date()
                .map_ok(StatusSource::FirstSelfDiagnosis)
                .boxed(),
        ];

        StreamCombiner::new(sources)
            .filter_map(|latest| {
                future::ready(match latest {
                    Ok(slots) => CompositeSnapshot::from_sources(&slots).map(Ok),
                    Err(err) => {
                        tracing::warn!(error = %err, "composite status source failed");
                        Some(Err(err))
                    }
                })
            })
            .boxed()
    }

    /// Current submission state.
    pub fn submission_state(&self) -> SubmissionState {
        self.cell.current()
    }

    /// Active configuration.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Cancel the submission worker and any attempt in flight.
    pub fn shutdown(&self) {
        tracing::debug!(
            pending = *self.pending.lock(),
            "report submission coordinator shutting down"
        );
        self.tasks.shutdown();
    }

    /// Check if the coordinator has been shut down.
    pub fn is_shut_down(&self) -> bool {
        self.tasks.is_shut_down()
    }
}

impl fmt::Debug for ReportSubmissionCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportSubmissionCoordinator")
            .field("config", &self.config)
            .field("state", &self.cell.current())
            .field("pending", &*self.pending.lock())
            .field("observers", &self.cell.subscriber_count())
            .field("shut_down", &self.tasks.is_shut_down())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Submission worker
// ----------------------------------------------------------------------------

/// Runs queued attempts one after another.
struct SubmissionWorker {
    cell: Arc<AsyncStateCell<Classification, SubmissionError>>,
    reporting: Arc<dyn ReportingRepository>,
    token: Arc<dyn CancellationToken>,
    timeout: Option<Duration>,
    pending: Arc<Mutex<usize>>,
}

impl SubmissionWorker {
    async fn run(self, mut requests: mpsc::UnboundedReceiver<SubmissionRequest>) {
        while let Some(request) = requests.recv().await {
            match self.attempt(request.started).await {
                Ok(Some(result)) => {
                    let _ = request.reply.send(result);
                }
                Ok(None) => {
                    tracing::debug!("submission attempt cancelled");
                    return;
                }
                Err(err) => {
                    tracing::error!(error = %err, "submission attempt aborted");
                    self.finish();
                }
            }
        }
    }

    /// One full attempt. `Ok(None)` means it was cancelled.
    async fn attempt(&self, started: bool) -> Result<Option<SubmissionResult>, ReactiveError> {
        if !started {
            self.cell.start()?;
        }

        let result = tokio::select! {
            biased;
            _ = self.token.cancelled() => return Ok(None),
            result = self.submit() => result,
        };
        if self.token.is_cancelled() {
            return Ok(None);
        }

        match &result {
            Ok(classification) => {
                tracing::info!(%classification, "report submitted");
                self.cell.succeed(*classification)?;
            }
            Err(err) => {
                tracing::warn!(error = %err, cause = ?err.cause(), "report submission failed");
                self.cell.fail(err.clone())?;
            }
        }

        self.finish();
        Ok(Some(result))
    }

    async fn submit(&self) -> SubmissionResult {
        let submission = self.reporting.submit_report();
        match self.timeout {
            Some(after) => match tokio::time::timeout(after, submission).await {
                Ok(result) => result.map_err(SubmissionError::from),
                Err(_) => Err(SubmissionError::TimedOut { after }),
            },
            None => submission.await.map_err(SubmissionError::from),
        }
    }

    /// Release the attempt and publish `Idle`.
    ///
    /// Both happen under the pending lock, so a trigger that sees no pending
    /// attempt always finds the cell idle.
    fn finish(&self) {
        let mut pending = self.pending.lock();
        *pending = pending.saturating_sub(1);
        self.cell.reset();
    }
}
