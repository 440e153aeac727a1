//! Coordinator configuration.
//!
//! Values come from defaults, an optional TOML file and `REPORTING_STATUS_*`
//! environment variables, in that order.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "REPORTING_STATUS_";

/// What `trigger_submission` does while another attempt is in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Ignore the new trigger
    #[default]
    Reject,
    /// Queue the new trigger and run it after the current attempt reaches `Idle`
    Serialize,
}

impl FromStr for OverlapPolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "serialize" => Ok(Self::Serialize),
            other => Err(ConfigError::invalid(
                "overlap_policy",
                format!("expected `reject` or `serialize`, got `{other}`"),
            )),
        }
    }
}

/// Configuration for [`ReportSubmissionCoordinator`](crate::ReportSubmissionCoordinator).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoordinatorConfig {
    /// Single-flight policy for overlapping submission triggers (default: reject)
    pub overlap_policy: OverlapPolicy,
    /// Upper bound for one submission attempt (default: none)
    pub submission_timeout_ms: Option<u64>,
}

impl CoordinatorConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Apply `REPORTING_STATUS_*` overrides from the process environment.
    pub fn merge_with_env(&mut self) -> Result<(), ConfigError> {
        self.merge_with_vars(std::env::vars())
    }

    /// Apply overrides from `(key, value)` pairs using the environment naming scheme.
    pub fn merge_with_vars<I>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(field) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match field {
                "OVERLAP_POLICY" => self.overlap_policy = value.parse()?,
                "SUBMISSION_TIMEOUT_MS" => {
                    let ms = value.trim().parse::<u64>().map_err(|e| {
                        ConfigError::invalid("submission_timeout_ms", e.to_string())
                    })?;
                    self.submission_timeout_ms = Some(ms);
                }
                _ => tracing::debug!(%key, "ignoring unknown configuration override"),
            }
        }
        self.validate()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.submission_timeout_ms == Some(0) {
            return Err(ConfigError::invalid(
                "submission_timeout_ms",
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Submission timeout as a `Duration`.
    pub fn submission_timeout(&self) -> Option<Duration> {
        self.submission_timeout_ms.map(Duration::from_millis)
    }
}
