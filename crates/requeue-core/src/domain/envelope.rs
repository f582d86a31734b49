//! TaskEnvelope: the payload wrapper stored inside the queue substrate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::ids::Identifier;

/// Identifier + opaque data + retry metadata.
///
/// The substrate owns the envelope while it is enqueued. While a task is taken,
/// only the worker holding its [`TaskHandle`](crate::app::TaskHandle) mutates
/// it, and only through the delay and attempts policies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    identifier: Identifier,

    data: serde_json::Value,

    /// Backoff delay. Absent until the first failure unless supplied at `put`.
    #[serde(
        default,
        with = "super::secs::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub delay: Option<Duration>,

    /// Failures so far.
    #[serde(default)]
    pub attempts: u32,
}

impl TaskEnvelope {
    pub fn new(identifier: Identifier, data: serde_json::Value, delay: Option<Duration>) -> Self {
        Self {
            identifier,
            data,
            delay,
            attempts: 0,
        }
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn data(&self) -> &serde_json::Value {
        &self.data
    }
}

impl fmt::Display for TaskEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] attempts={}", self.identifier, self.attempts)?;
        if let Some(delay) = self.delay {
            write!(f, " delay={}s", delay.as_secs_f64())?;
        }
        write!(f, " data={}", self.data)
    }
}
