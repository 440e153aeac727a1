//! Error types for report submission and composite status.

use std::time::Duration;

/// Failure reported by a reporting or diagnosis collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReportingError {
    /// Network or transport error
    #[error("Network error: {message}")]
    Network {
        /// Error message describing the network issue
        message: String,
    },

    /// Local persistence failed
    #[error("Storage error: {message}")]
    Storage {
        /// Error message describing the storage failure
        message: String,
    },

    /// The backend refused the report
    #[error("Rejected: {message}")]
    Rejected {
        /// Error message returned by the backend
        message: String,
    },

    /// Internal collaborator error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal error
        message: String,
    },
}

impl ReportingError {
    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a rejected error
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// A submission attempt failed.
///
/// This is the payload of the `Error` submission state. It is never returned
/// to the caller that triggered the submission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionError {
    /// The reporting collaborator failed
    #[error("Submission failed: {cause}")]
    Failed {
        /// Underlying collaborator failure
        #[source]
        cause: ReportingError,
    },

    /// The configured submission timeout elapsed
    #[error("Submission timed out after {}ms", .after.as_millis())]
    TimedOut {
        /// Timeout that elapsed
        after: Duration,
    },
}

impl SubmissionError {
    /// Underlying collaborator failure, if any.
    pub fn cause(&self) -> Option<&ReportingError> {
        match self {
            Self::Failed { cause } => Some(cause),
            Self::TimedOut { .. } => None,
        }
    }
}

impl From<ReportingError> for SubmissionError {
    fn from(cause: ReportingError) -> Self {
        Self::Failed { cause }
    }
}

/// Configuration loading or validation failed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML for this schema
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range or malformed
    #[error("Invalid config value for {field}: {message}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// Description of the problem
        message: String,
    },
}

impl ConfigError {
    /// Create an invalid value error
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_error_wraps_cause() {
        let err = SubmissionError::from(ReportingError::network("offline"));
        assert_eq!(err.cause(), Some(&ReportingError::network("offline")));
        assert_eq!(err.to_string(), "Submission failed: Network error: offline");
    }

    #[test]
    fn test_timeout_display() {
        let err = SubmissionError::TimedOut {
            after: Duration::from_millis(1500),
        };
        assert_eq!(err.to_string(), "Submission timed out after 1500ms");
        assert!(err.cause().is_none());
    }
}
