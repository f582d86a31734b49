//! Numeric queue settings (backoff and retry budget).

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::errors::ConfigError;

/// Backoff and retry budget of a queue.
///
/// Durations are read and written as seconds. Missing keys fall back to
/// [`QueueSettings::default`]; unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Base delay used when a task fails for the first time without a delay.
    #[serde(with = "super::secs")]
    pub default_delay: Duration,

    /// Growth factor applied on every failure.
    pub delay_multiplier: f64,

    /// Upper bound of any computed delay.
    #[serde(with = "super::secs")]
    pub delay_threshold: Duration,

    /// Retry budget. `<= 0` means unlimited.
    pub max_attempts: i64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            default_delay: Duration::from_secs(1),
            delay_multiplier: 2.0,
            delay_threshold: Duration::from_secs(3600),
            max_attempts: 0,
        }
    }
}

impl QueueSettings {
    /// Check the settings in a fixed order; the first violation wins.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.delay_multiplier.is_finite() || self.delay_multiplier < 1.0 {
            return Err(ConfigError::InvalidOption {
                option: "delay_multiplier",
                reason: format!("must be a finite number >= 1, got {}", self.delay_multiplier),
            });
        }
        Ok(())
    }

    /// Attempt limit, or `None` when retries are unlimited.
    pub fn attempt_limit(&self) -> Option<u32> {
        if self.max_attempts <= 0 {
            None
        } else {
            Some(u32::try_from(self.max_attempts).unwrap_or(u32::MAX))
        }
    }

    /// Has a task with `attempts` failures used up its budget?
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        self.attempt_limit().is_some_and(|limit| attempts > limit)
    }
}
