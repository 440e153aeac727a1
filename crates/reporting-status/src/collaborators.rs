//! Contracts of the collaborators the coordinator delegates to.
//!
//! Implementations own persistence, networking and the detection process.
//! The coordinator only relies on the operations declared here.

use async_trait::async_trait;
use futures::stream::BoxStream;
use time::OffsetDateTime;

use crate::errors::ReportingError;
use crate::status::{AgreementData, Classification};

/// Stream of values published by a collaborator.
///
/// An `Err` item is terminal for anything combining the stream.
pub type SourceStream<T> = BoxStream<'static, Result<T, ReportingError>>;

/// Reporting flow backend: consent, submission and navigation.
#[async_trait]
pub trait ReportingRepository: Send + Sync {
    /// Record whether the user accepts the reporting terms.
    fn set_user_agreement(&self, agreement: bool);

    /// Upload the report and return the classification it was assigned.
    async fn submit_report(&self) -> Result<Classification, ReportingError>;

    /// Consent state, re-published on every change.
    fn observe_agreement_data(&self) -> SourceStream<AgreementData>;

    /// Classification of the report being prepared.
    fn observe_classification(&self) -> SourceStream<Classification>;

    /// Leave the agreement screen.
    fn go_back(&self);
}

/// Source of the user's self-diagnosis history.
pub trait DiagnosisRepository: Send + Sync {
    /// Date of the first self-diagnosis; `None` until one exists.
    fn observe_first_self_diagnose_date(&self) -> SourceStream<Option<OffsetDateTime>>;
}

/// Background contact detection process.
pub trait DetectionService: Send + Sync {
    /// Whether the process is currently running.
    fn is_running(&self) -> bool;

    /// Stop the process.
    fn stop(&self);
}
