//! Report classification and the composite status rendered by the reporting screen.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Severity tier assigned to a submitted infection report.
///
/// Members are ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Report cleared, no elevated risk
    Cleared,
    /// Suspected infection (self-diagnosis)
    Suspected,
    /// Medically confirmed infection
    Confirmed,
}

impl Classification {
    /// Whether a loaded submission with this classification stops passive
    /// background detection.
    pub fn halts_detection(&self) -> bool {
        match self {
            Self::Confirmed => true,
            Self::Suspected | Self::Cleared => false,
        }
    }

    /// Short lowercase label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Cleared => "cleared",
            Self::Suspected => "suspected",
            Self::Confirmed => "confirmed",
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Consent state of the reporting flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementData {
    /// Whether the user accepted the reporting terms
    pub user_has_agreed: bool,
    /// When the user accepted, if known
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub agreed_at: Option<OffsetDateTime>,
}

impl AgreementData {
    /// Agreement without a timestamp.
    #[must_use]
    pub fn new(user_has_agreed: bool) -> Self {
        Self {
            user_has_agreed,
            agreed_at: None,
        }
    }

    /// Set the acceptance timestamp.
    #[must_use]
    pub fn with_agreed_at(mut self, agreed_at: OffsetDateTime) -> Self {
        self.agreed_at = Some(agreed_at);
        self
    }
}

/// Immutable status snapshot combining the latest value of every status source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeSnapshot {
    agreement: AgreementData,
    classification: Classification,
    first_self_diagnosis: Option<OffsetDateTime>,
}

impl CompositeSnapshot {
    /// Create a snapshot.
    pub fn new(
        agreement: AgreementData,
        classification: Classification,
        first_self_diagnosis: Option<OffsetDateTime>,
    ) -> Self {
        Self {
            agreement,
            classification,
            first_self_diagnosis,
        }
    }

    /// Build a snapshot from combiner slots.
    ///
    /// Returns `None` unless every kind of source is present.
    pub(crate) fn from_sources(sources: &[StatusSource]) -> Option<Self> {
        let mut agreement = None;
        let mut classification = None;
        let mut diagnosis = None;
        for source in sources {
            match source {
                StatusSource::Agreement(value) => agreement = Some(value.clone()),
                StatusSource::Classification(value) => classification = Some(*value),
                StatusSource::FirstSelfDiagnosis(value) => diagnosis = Some(*value),
            }
        }
        Some(Self::new(agreement?, classification?, diagnosis?))
    }

    /// Consent state.
    pub fn agreement(&self) -> &AgreementData {
        &self.agreement
    }

    /// Latest report classification.
    pub fn classification(&self) -> Classification {
        self.classification
    }

    /// Date of the first self-diagnosis, once one exists.
    pub fn first_self_diagnosis(&self) -> Option<OffsetDateTime> {
        self.first_self_diagnosis
    }
}

/// One value from one of the three status sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StatusSource {
    Agreement(AgreementData),
    Classification(Classification),
    FirstSelfDiagnosis(Option<OffsetDateTime>),
}
