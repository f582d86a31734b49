//! Task state as tracked by the queue substrate.

use serde::{Deserialize, Serialize};

/// Substrate-side state of an enqueued task.
///
/// State transitions:
/// - Ready -> Taken -> (acked, removed)
/// - Ready -> Taken -> Delayed -> Ready (release with a delay)
/// - Ready -> Taken -> Ready (release without a delay)
/// - Ready -> Taken -> Buried (bury; only an operator kick revives it)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Eligible for take.
    Ready,

    /// Waiting for its release delay to elapse.
    Delayed,

    /// Held by exactly one worker.
    Taken,

    /// Out of rotation.
    Buried,
}

impl TaskState {
    /// Is this task eligible for take?
    pub fn is_runnable(self) -> bool {
        matches!(self, TaskState::Ready)
    }

    /// Can ack/release/bury be applied?
    pub fn is_taken(self) -> bool {
        matches!(self, TaskState::Taken)
    }
}
