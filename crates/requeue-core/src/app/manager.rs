//! QueueManager: a named queue bound to its settings and hooks.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{info, info_span};

use super::config::QueueConfig;
use super::handle::TaskHandle;
use super::hooks::Hooks;
use crate::domain::{
    ConfigError, Identifier, PutError, QueueError, QueueSettings, TaskEnvelope, TaskId,
};
use crate::ports::{QueueBinding, QueueRegistry};

struct ManagerInner {
    name: String,
    binding: QueueBinding,
    settings: QueueSettings,
    hooks: Hooks,
}

/// Entry point for producers (`put`) and workers (`take`).
///
/// Design:
/// - Built once by [`attach`](Self::attach), read-only afterwards.
/// - Cloning is cheap and every clone shares the same configuration, so one
///   manager can be handed to any number of concurrent workers.
/// - Holds no locks. Single delivery of a task is the queue substrate's job.
#[derive(Clone)]
pub struct QueueManager {
    inner: Arc<ManagerInner>,
}

impl std::fmt::Debug for QueueManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueManager")
            .field("name", &self.inner.name)
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

impl QueueManager {
    /// Bind the queue called `name` to `config`.
    ///
    /// Fails if the name does not resolve or the settings are invalid. These are
    /// startup faults; nothing here is retried.
    pub fn attach(
        registry: &dyn QueueRegistry,
        name: &str,
        config: QueueConfig,
    ) -> Result<Self, ConfigError> {
        let binding = registry
            .resolve(name)
            .ok_or_else(|| ConfigError::UnknownQueue(name.to_string()))?;
        let (settings, hooks) = config.into_parts();
        settings.validate()?;

        info!(queue = name, settings = ?settings, "queue attached");
        Ok(Self {
            inner: Arc::new(ManagerInner {
                name: name.to_string(),
                binding,
                settings,
                hooks,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.inner.settings
    }

    pub(crate) fn hooks(&self) -> &Hooks {
        &self.inner.hooks
    }

    pub(crate) fn binding(&self) -> &QueueBinding {
        &self.inner.binding
    }

    /// Render a payload or result with the configured formatter.
    pub fn render(&self, data: &Value) -> String {
        (self.inner.hooks.to_string)(data)
    }

    /// Run a hook inside a span carrying the queue name.
    pub(crate) fn observe<R>(&self, f: impl FnOnce() -> R) -> R {
        info_span!("queue", queue = %self.inner.name).in_scope(f)
    }

    /// Validate `data`, wrap it in a fresh envelope and enqueue it.
    ///
    /// A rejected payload has no side effects: no identifier is drawn, the put
    /// hook does not run and nothing reaches the queue.
    pub async fn put(&self, data: Value, delay: Option<Duration>) -> Result<TaskId, PutError> {
        let hooks = self.hooks();
        (hooks.validate_task)(&data).map_err(PutError::Rejected)?;

        let identifier = Identifier::new(hooks.identifier_generator.generate());
        let envelope = TaskEnvelope::new(identifier, data, delay);
        self.observe(|| (hooks.on_put)(&envelope, &self.render(envelope.data())));

        let id = self.binding().queue.enqueue(envelope, delay).await?;
        Ok(id)
    }

    /// Wait up to `timeout` for a ready task.
    ///
    /// Only the calling task waits; `Ok(None)` means the timeout elapsed with
    /// nothing to hand out.
    pub async fn take(&self, timeout: Duration) -> Result<Option<TaskHandle>, QueueError> {
        let Some((id, envelope)) = self.binding().queue.dequeue(timeout).await? else {
            return Ok(None);
        };

        let task = TaskHandle::new(id, envelope, self.clone());
        self.observe(|| (self.hooks().on_take)(&task));
        Ok(Some(task))
    }
}
