//! Error types.
//!
//! - [`ConfigError`]: startup faults raised by `attach` / config parsing.
//! - [`PutError`]: a payload was rejected or the queue refused it.
//! - [`QueueError`]: failures reported by the queue substrate, passed through
//!   unchanged.

use thiserror::Error;

use super::ids::TaskId;
use super::state::TaskState;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("queue '{0}' does not exist")]
    UnknownQueue(String),

    #[error("queue configuration must be an object")]
    NotAnObject,

    #[error("option '{0}' must be a callable; provide it through the QueueConfig builder")]
    NotCallable(&'static str),

    #[error("invalid option '{option}': {reason}")]
    InvalidOption { option: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum PutError {
    #[error("task rejected: {0}")]
    Rejected(String),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("{0} not found")]
    NotFound(TaskId),

    #[error("{id} is {state:?}, not taken")]
    NotTaken { id: TaskId, state: TaskState },

    #[error("queue backend error: {0}")]
    Backend(String),
}
