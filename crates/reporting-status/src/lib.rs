//! # Reporting Status
//!
//! Coordinator behind the report submission screen.
//!
//! [`ReportSubmissionCoordinator`] drives a one-shot report submission through
//! the `Idle -> Loading -> (Loaded | Error) -> Idle` lifecycle, fuses the
//! consent, classification and self-diagnosis sources into a
//! [`CompositeSnapshot`], and stops the background detection process once a
//! submission comes back [`Classification::Confirmed`].
//!
//! Persistence, networking, navigation and the detection process itself are
//! delegated to the traits in [`collaborators`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use reporting_status::{CoordinatorConfig, ReportSubmissionCoordinator};
//!
//! let coordinator = ReportSubmissionCoordinator::new(
//!     CoordinatorConfig::default(),
//!     reporting,
//!     diagnosis,
//!     detection,
//! );
//!
//! let mut states = coordinator.observe_submission_state();
//! coordinator.set_user_agreement(true);
//! coordinator.trigger_submission();
//! // states: Idle, Loading, Loaded(Confirmed), Idle
//! ```

pub mod collaborators;
pub mod config;
mod coordinator;
mod errors;
mod interceptor;
pub mod logging;
mod status;

pub use collaborators::{DetectionService, DiagnosisRepository, ReportingRepository, SourceStream};
pub use config::{CoordinatorConfig, OverlapPolicy};
pub use coordinator::{
    ReportSubmissionCoordinator, SubmissionHandle, SubmissionResult, SubmissionState,
    TriggerOutcome,
};
pub use errors::{ConfigError, ReportingError, SubmissionError};
pub use interceptor::DetectionStopInterceptor;
pub use status::{AgreementData, Classification, CompositeSnapshot};

// Re-export reactive primitives for convenience
pub use reporting_reactive::{AsyncState, StatePhase};
