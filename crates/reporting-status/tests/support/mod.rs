//! Channel-backed collaborator fakes shared by the integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::Mutex;
use reporting_status::{
    AgreementData, Classification, CoordinatorConfig, DetectionService, DiagnosisRepository,
    ReportSubmissionCoordinator, ReportingError, ReportingRepository, SourceStream,
    SubmissionState,
};
use time::OffsetDateTime;
use tokio::sync::{mpsc, Semaphore};
use tokio_stream::wrappers::UnboundedReceiverStream;

/// A single-subscriber source whose values are pushed by the test.
pub struct SourceChannel<T> {
    tx: mpsc::UnboundedSender<Result<T, ReportingError>>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<Result<T, ReportingError>>>>,
}

impl<T: Send + 'static> SourceChannel<T> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
        }
    }

    pub fn emit(&self, value: T) {
        self.tx.send(Ok(value)).unwrap();
    }

    pub fn fail(&self, err: ReportingError) {
        self.tx.send(Err(err)).unwrap();
    }

    /// Take the stream. Later calls get an empty stream.
    pub fn stream(&self) -> SourceStream<T> {
        match self.rx.lock().take() {
            Some(rx) => UnboundedReceiverStream::new(rx).boxed(),
            None => futures::stream::empty().boxed(),
        }
    }
}

/// Scripted reporting backend.
pub struct FakeReporting {
    pub agreements: Mutex<Vec<bool>>,
    go_back_calls: AtomicUsize,
    submissions: AtomicUsize,
    outcomes: Mutex<VecDeque<Result<Classification, ReportingError>>>,
    /// When set, each submission waits for one permit.
    gate: Option<Semaphore>,
    pub agreement_source: SourceChannel<AgreementData>,
    pub classification_source: SourceChannel<Classification>,
}

impl FakeReporting {
    pub fn new(outcomes: Vec<Result<Classification, ReportingError>>) -> Self {
        Self {
            agreements: Mutex::new(Vec::new()),
            go_back_calls: AtomicUsize::new(0),
            submissions: AtomicUsize::new(0),
            outcomes: Mutex::new(outcomes.into()),
            gate: None,
            agreement_source: SourceChannel::new(),
            classification_source: SourceChannel::new(),
        }
    }

    /// Submissions block until [`release`](Self::release) is called.
    pub fn gated(outcomes: Vec<Result<Classification, ReportingError>>) -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new(outcomes)
        }
    }

    /// Number of `submit_report` calls so far.
    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    pub fn go_back_calls(&self) -> usize {
        self.go_back_calls.load(Ordering::SeqCst)
    }

    pub fn release(&self, submissions: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(submissions);
        }
    }
}

#[async_trait]
impl ReportingRepository for FakeReporting {
    fn set_user_agreement(&self, agreement: bool) {
        self.agreements.lock().push(agreement);
    }

    async fn submit_report(&self) -> Result<Classification, ReportingError> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        self.outcomes
            .lock()
            .pop_front()
            .unwrap_or(Ok(Classification::Suspected))
    }

    fn observe_agreement_data(&self) -> SourceStream<AgreementData> {
        self.agreement_source.stream()
    }

    fn observe_classification(&self) -> SourceStream<Classification> {
        self.classification_source.stream()
    }

    fn go_back(&self) {
        self.go_back_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Self-diagnosis history pushed by the test.
pub struct FakeDiagnosis {
    pub first_self_diagnosis: SourceChannel<Option<OffsetDateTime>>,
}

impl FakeDiagnosis {
    pub fn new() -> Self {
        Self {
            first_self_diagnosis: SourceChannel::new(),
        }
    }
}

impl DiagnosisRepository for FakeDiagnosis {
    fn observe_first_self_diagnose_date(&self) -> SourceStream<Option<OffsetDateTime>> {
        self.first_self_diagnosis.stream()
    }
}

/// Detection process that records stop commands.
#[derive(Default)]
pub struct FakeDetection {
    running: AtomicBool,
    stops: AtomicUsize,
}

impl FakeDetection {
    pub fn running() -> Self {
        Self {
            running: AtomicBool::new(true),
            stops: AtomicUsize::new(0),
        }
    }

    pub fn is_running_now(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl DetectionService for FakeDetection {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Coordinator wired to fakes.
pub struct Harness {
    pub coordinator: ReportSubmissionCoordinator,
    pub reporting: Arc<FakeReporting>,
    pub diagnosis: Arc<FakeDiagnosis>,
    pub detection: Arc<FakeDetection>,
}

impl Harness {
    pub fn new(config: CoordinatorConfig, reporting: FakeReporting, detection: FakeDetection) -> Self {
        let reporting = Arc::new(reporting);
        let diagnosis = Arc::new(FakeDiagnosis::new());
        let detection = Arc::new(detection);
        let coordinator = ReportSubmissionCoordinator::new(
            config,
            reporting.clone(),
            diagnosis.clone(),
            detection.clone(),
        );
        Self {
            coordinator,
            reporting,
            diagnosis,
            detection,
        }
    }
}

/// Next `n` states, failing the test if they do not arrive in time.
pub async fn next_states(
    states: &mut BoxStream<'static, SubmissionState>,
    n: usize,
) -> Vec<SubmissionState> {
    tokio::time::timeout(
        Duration::from_secs(2),
        states.by_ref().take(n).collect::<Vec<_>>(),
    )
    .await
    .expect("timed out waiting for submission states")
}
