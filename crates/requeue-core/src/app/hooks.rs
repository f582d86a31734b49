//! Lifecycle hooks: observers, policies, validator and display formatter.
//!
//! Every slot has a default; any of them can be replaced through
//! [`QueueConfig`](super::QueueConfig). Observers are for side effects only
//! (logging, metrics) and cannot change the outcome of a transition. A panic
//! inside a hook is not caught.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info};

use super::handle::TaskHandle;
use crate::domain::{QueueSettings, TaskEnvelope, bump_attempts, escalate_delay};
use crate::ports::{IdentifierGenerator, RandomIdentifier};

/// Called on `put` with the new envelope and its rendered data.
pub type PutHook = Arc<dyn Fn(&TaskEnvelope, &str) + Send + Sync>;

/// Called on `take`.
pub type TakeHook = Arc<dyn Fn(&TaskHandle) + Send + Sync>;

/// Called on success (rendered result), fail and fatal (error text).
pub type OutcomeHook = Arc<dyn Fn(&TaskHandle, &str) + Send + Sync>;

/// Computes the next delay into the envelope.
pub type DelayPolicy = Arc<dyn Fn(&QueueSettings, &mut TaskEnvelope) + Send + Sync>;

/// Counts a failure into the envelope.
pub type AttemptsPolicy = Arc<dyn Fn(&mut TaskEnvelope) + Send + Sync>;

/// Accepts or rejects a payload before it is enqueued.
pub type Validator = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// Renders a payload (or result) for logs.
pub type Formatter = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// The full hook table of a queue.
#[derive(Clone)]
pub struct Hooks {
    pub identifier_generator: Arc<dyn IdentifierGenerator>,
    pub on_put: PutHook,
    pub on_take: TakeHook,
    pub on_success: OutcomeHook,
    pub on_fail: OutcomeHook,
    pub on_fatal: OutcomeHook,
    pub on_delay: DelayPolicy,
    pub on_attempts: AttemptsPolicy,
    pub validate_task: Validator,
    pub to_string: Formatter,
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            identifier_generator: Arc::new(RandomIdentifier::new()),
            on_put: Arc::new(log_put),
            on_take: Arc::new(log_take),
            on_success: Arc::new(log_success),
            on_fail: Arc::new(log_fail),
            on_fatal: Arc::new(log_fatal),
            on_delay: Arc::new(escalate_delay),
            on_attempts: Arc::new(bump_attempts),
            validate_task: Arc::new(accept_any),
            to_string: Arc::new(Value::to_string),
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks").finish_non_exhaustive()
    }
}

fn accept_any(_data: &Value) -> Result<(), String> {
    Ok(())
}

fn log_put(envelope: &TaskEnvelope, data: &str) {
    info!(
        identifier = %envelope.identifier(),
        delay = ?envelope.delay,
        data,
        "task put"
    );
}

fn log_take(task: &TaskHandle) {
    info!(
        task_id = %task.id(),
        identifier = %task.identifier(),
        attempts = task.attempts(),
        data = %task.render(),
        "task taken"
    );
}

fn log_success(task: &TaskHandle, result: &str) {
    info!(
        task_id = %task.id(),
        identifier = %task.identifier(),
        attempts = task.attempts(),
        result,
        "task succeeded"
    );
}

fn log_fail(task: &TaskHandle, err: &str) {
    error!(
        task_id = %task.id(),
        identifier = %task.identifier(),
        attempts = task.attempts(),
        delay = ?task.delay(),
        error = err,
        "task failed"
    );
}

fn log_fatal(task: &TaskHandle, err: &str) {
    error!(
        task_id = %task.id(),
        identifier = %task.identifier(),
        attempts = task.attempts(),
        error = err,
        data = %task.render(),
        "task buried"
    );
}
