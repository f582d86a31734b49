//! TaskHandle: one taken task and its success/fail/fatal protocol.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::manager::QueueManager;
use crate::domain::{Identifier, QueueError, TaskEnvelope, TaskId};

/// What `fail` did with the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Back in rotation after `delay`.
    Released { delay: Duration, attempts: u32 },

    /// Retry budget exhausted; escalated to `fatal`.
    Buried { attempts: u32 },
}

/// A taken task, owned by exactly one worker.
///
/// The worker must finish it with exactly one of [`success`](Self::success),
/// [`fail`](Self::fail) or [`fatal`](Self::fatal). Each consumes the handle.
/// Dropping a handle without calling any of them leaves the task taken until
/// the queue substrate reclaims it.
pub struct TaskHandle {
    id: TaskId,
    envelope: TaskEnvelope,
    manager: QueueManager,
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("envelope", &self.envelope)
            .field("queue", &self.manager.name())
            .finish()
    }
}

impl TaskHandle {
    pub(crate) fn new(id: TaskId, envelope: TaskEnvelope, manager: QueueManager) -> Self {
        Self {
            id,
            envelope,
            manager,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn identifier(&self) -> &Identifier {
        self.envelope.identifier()
    }

    pub fn data(&self) -> &Value {
        self.envelope.data()
    }

    pub fn delay(&self) -> Option<Duration> {
        self.envelope.delay
    }

    pub fn attempts(&self) -> u32 {
        self.envelope.attempts
    }

    pub fn envelope(&self) -> &TaskEnvelope {
        &self.envelope
    }

    pub fn manager(&self) -> &QueueManager {
        &self.manager
    }

    /// The payload through the queue's display formatter.
    pub fn render(&self) -> String {
        self.manager.render(self.data())
    }

    /// Decode the payload into a concrete type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(self.data())
    }

    /// Success hook, then ack. The task is gone for good afterwards.
    pub async fn success(self, result: Value) -> Result<(), QueueError> {
        let manager = self.manager.clone();
        let rendered = manager.render(&result);
        manager.observe(|| (manager.hooks().on_success)(&self, &rendered));
        manager.binding().queue.ack(self.id).await
    }

    /// Count a failure, then release with backoff or escalate to `fatal`.
    ///
    /// 1. delay policy, 2. attempts policy, 3. fail hook (sees the new values),
    /// 4. past `max_attempts`: fatal hook + bury,
    /// 5. otherwise: store the envelope, then release with the new delay.
    pub fn fail(
        self,
        error: impl fmt::Display,
    ) -> impl Future<Output = Result<Disposition, QueueError>> + Send {
        self.fail_with(error.to_string())
    }

    /// Fatal hook, then bury. Reviving a buried task is an operator action on
    /// the queue itself.
    pub fn fatal(
        self,
        error: impl fmt::Display,
    ) -> impl Future<Output = Result<(), QueueError>> + Send {
        let error = error.to_string();
        async move { self.bury_with(&error).await }
    }

    async fn fail_with(mut self, error: String) -> Result<Disposition, QueueError> {
        let manager = self.manager.clone();
        let hooks = manager.hooks();

        (hooks.on_delay)(manager.settings(), &mut self.envelope);
        (hooks.on_attempts)(&mut self.envelope);
        manager.observe(|| (hooks.on_fail)(&self, &error));

        let attempts = self.envelope.attempts;
        if manager.settings().is_exhausted(attempts) {
            self.bury_with(&error).await?;
            return Ok(Disposition::Buried { attempts });
        }

        // update and release are two calls: a crash in between leaves the task
        // taken until the substrate's own take timeout reclaims it
        let delay = self.envelope.delay.unwrap_or_default();
        let binding = manager.binding();
        binding.store.update(self.id, &self.envelope).await?;
        binding.queue.release(self.id, delay).await?;
        Ok(Disposition::Released { delay, attempts })
    }

    async fn bury_with(&self, error: &str) -> Result<(), QueueError> {
        self.manager
            .observe(|| (self.manager.hooks().on_fatal)(self, error));
        self.manager.binding().queue.bury(self.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::QueueConfig;
    use crate::domain::TaskState;
    use crate::impls::{InMemoryQueue, InMemoryRegistry};
    use crate::ports::TaskQueue;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    /// Records every hook invocation as "<hook>:<attempts>".
    #[derive(Clone, Default)]
    struct Journal(Arc<Mutex<Vec<String>>>);

    impl Journal {
        fn push(&self, entry: String) {
            self.0.lock().unwrap().push(entry);
        }

        fn entries(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    fn journaled(config: QueueConfig, journal: &Journal) -> QueueConfig {
        let (a, b, c, d) = (journal.clone(), journal.clone(), journal.clone(), journal.clone());
        config
            .on_take(move |t| a.push(format!("take:{}", t.attempts())))
            .on_success(move |t, r| b.push(format!("success:{}:{r}", t.attempts())))
            .on_fail(move |t, e| c.push(format!("fail:{}:{e}", t.attempts())))
            .on_fatal(move |t, e| d.push(format!("fatal:{}:{e}", t.attempts())))
    }

    fn setup(doc: Value, journal: &Journal) -> (QueueManager, Arc<InMemoryQueue>) {
        let registry = InMemoryRegistry::new();
        let queue = registry.create("jobs");
        let config = journaled(QueueConfig::from_value(&doc).unwrap(), journal);
        let manager = QueueManager::attach(&registry, "jobs", config).unwrap();
        (manager, queue)
    }

    async fn take_now(manager: &QueueManager) -> TaskHandle {
        manager
            .take(Duration::from_secs(3600))
            .await
            .unwrap()
            .expect("a task should become ready")
    }

    #[tokio::test(start_paused = true)]
    async fn retry_scenario_ends_buried_after_budget() {
        let journal = Journal::default();
        let (manager, queue) = setup(
            json!({"max_attempts": 3, "default_delay": 1, "delay_multiplier": 2, "delay_threshold": 3600}),
            &journal,
        );
        let id = manager.put(json!({"job": "x"}), None).await.unwrap();

        let mut identifiers = Vec::new();
        for (expected_delay, expected_attempts) in [(2, 1), (4, 2), (8, 3)] {
            let task = take_now(&manager).await;
            identifiers.push(task.identifier().clone());
            let disposition = task.fail("boom").await.unwrap();
            assert_eq!(
                disposition,
                Disposition::Released {
                    delay: Duration::from_secs(expected_delay),
                    attempts: expected_attempts,
                }
            );
            assert_eq!(queue.state_of(id).await, Some(TaskState::Delayed));
        }

        let task = take_now(&manager).await;
        identifiers.push(task.identifier().clone());
        assert_eq!(task.attempts(), 3);
        assert_eq!(task.delay(), Some(Duration::from_secs(8)));
        let disposition = task.fail("boom").await.unwrap();
        assert_eq!(disposition, Disposition::Buried { attempts: 4 });
        assert_eq!(queue.state_of(id).await, Some(TaskState::Buried));

        // same label across every cycle
        assert!(identifiers.windows(2).all(|w| w[0] == w[1]));

        // the fail hook fires before the fatal hook on escalation
        assert_eq!(
            journal.entries(),
            vec![
                "take:0", "fail:1:boom", "take:1", "fail:2:boom", "take:2", "fail:3:boom",
                "take:3", "fail:4:boom", "fatal:4:boom",
            ]
        );

        assert!(
            manager
                .take(Duration::from_secs(7200))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn nth_failure_still_releases() {
        let journal = Journal::default();
        let (manager, queue) = setup(json!({"max_attempts": 1}), &journal);
        let id = manager.put(json!(1), None).await.unwrap();

        let first = take_now(&manager).await.fail("e").await.unwrap();
        assert!(matches!(first, Disposition::Released { attempts: 1, .. }));

        let second = take_now(&manager).await.fail("e").await.unwrap();
        assert_eq!(second, Disposition::Buried { attempts: 2 });
        assert_eq!(queue.counts().await.buried, 1);
        assert_eq!(queue.state_of(id).await, Some(TaskState::Buried));
    }

    #[tokio::test(start_paused = true)]
    async fn unlimited_budget_keeps_releasing_under_the_cap() {
        let journal = Journal::default();
        let (manager, _queue) = setup(
            json!({"max_attempts": 0, "default_delay": 1, "delay_multiplier": 10, "delay_threshold": 30}),
            &journal,
        );
        manager.put(json!(1), None).await.unwrap();

        for attempt in 1..=20 {
            let outcome = take_now(&manager).await.fail("again").await.unwrap();
            match outcome {
                Disposition::Released { delay, attempts } => {
                    assert_eq!(attempts, attempt);
                    assert!(delay <= Duration::from_secs(30));
                }
                Disposition::Buried { .. } => panic!("unlimited budget must never bury"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fail_stores_envelope_before_release() {
        let journal = Journal::default();
        let (manager, queue) = setup(json!({"default_delay": 5}), &journal);
        let id = manager.put(json!({"k": "v"}), None).await.unwrap();

        let task = take_now(&manager).await;
        let label = task.identifier().clone();
        task.fail("nope").await.unwrap();

        let stored = queue.envelope_of(id).await.unwrap();
        assert_eq!(stored.identifier(), &label);
        assert_eq!(stored.attempts, 1);
        assert_eq!(stored.delay, Some(Duration::from_secs(10)));
        assert_eq!(stored.data(), &json!({"k": "v"}));
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_put_delay_is_multiplied_on_first_failure() {
        let journal = Journal::default();
        let (manager, _queue) = setup(json!({"default_delay": 1, "delay_multiplier": 3}), &journal);
        manager
            .put(json!(1), Some(Duration::from_secs(2)))
            .await
            .unwrap();

        let task = take_now(&manager).await;
        assert_eq!(task.delay(), Some(Duration::from_secs(2)));
        let outcome = task.fail("x").await.unwrap();
        assert_eq!(
            outcome,
            Disposition::Released {
                delay: Duration::from_secs(6),
                attempts: 1
            }
        );
    }

    #[tokio::test]
    async fn success_acks_and_leaves_attempts_alone() {
        let journal = Journal::default();
        let (manager, queue) = setup(json!({"default_delay": 0}), &journal);
        let id = manager.put(json!({"job": "x"}), None).await.unwrap();

        take_now(&manager).await.fail("flaky").await.unwrap();
        let task = take_now(&manager).await;
        assert_eq!(task.attempts(), 1);
        task.success(json!({"ok": true})).await.unwrap();

        assert_eq!(queue.state_of(id).await, None);
        assert!(
            manager
                .take(Duration::from_millis(10))
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(
            journal.entries(),
            vec!["take:0", "fail:1:flaky", "take:1", r#"success:1:{"ok":true}"#]
        );
    }

    #[tokio::test]
    async fn fatal_buries_immediately() {
        let journal = Journal::default();
        let (manager, queue) = setup(json!({"max_attempts": 10}), &journal);
        let id = manager.put(json!(1), None).await.unwrap();

        take_now(&manager).await.fatal("corrupt payload").await.unwrap();

        assert_eq!(queue.state_of(id).await, Some(TaskState::Buried));
        assert_eq!(journal.entries(), vec!["take:0", "fatal:0:corrupt payload"]);
    }

    #[tokio::test]
    async fn queue_errors_propagate_from_protocol_calls() {
        let journal = Journal::default();
        let (manager, queue) = setup(json!({}), &journal);
        let id = manager.put(json!(1), None).await.unwrap();
        let task = take_now(&manager).await;

        // someone else finalizes the task behind the handle's back
        queue.ack(id).await.unwrap();

        let err = task.success(json!(null)).await.unwrap_err();
        assert!(matches!(err, QueueError::NotFound(x) if x == id));
    }

    #[tokio::test]
    async fn release_error_reaches_fail_caller() {
        let journal = Journal::default();
        let (manager, queue) = setup(json!({"max_attempts": 5}), &journal);
        let id = manager.put(json!(1), None).await.unwrap();
        let task = take_now(&manager).await;

        // buried behind the handle's back: the envelope still exists, release refuses
        queue.bury(id).await.unwrap();

        let err = task.fail("late").await.unwrap_err();
        assert!(matches!(
            err,
            QueueError::NotTaken { id: x, state: TaskState::Buried } if x == id
        ));
    }

    #[tokio::test]
    async fn bury_error_reaches_fatal_caller() {
        let journal = Journal::default();
        let (manager, queue) = setup(json!({}), &journal);
        let id = manager.put(json!(1), None).await.unwrap();
        let task = take_now(&manager).await;

        queue.ack(id).await.unwrap();

        let err = task.fatal("late").await.unwrap_err();
        assert!(matches!(err, QueueError::NotFound(x) if x == id));
        assert_eq!(journal.entries(), vec!["take:0", "fatal:0:late"]);
    }

    #[tokio::test]
    async fn exhausted_fail_returns_bury_error() {
        let journal = Journal::default();
        let (manager, queue) = setup(json!({"max_attempts": 1, "default_delay": 0}), &journal);
        let id = manager.put(json!(1), None).await.unwrap();
        take_now(&manager).await.fail("once").await.unwrap();
        let task = take_now(&manager).await;

        queue.ack(id).await.unwrap();

        let err = task.fail("twice").await.unwrap_err();
        assert!(matches!(err, QueueError::NotFound(x) if x == id));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_handle_gets_not_taken_after_lease_expiry() {
        let registry = InMemoryRegistry::new();
        let queue = registry.create_with_ttr("jobs", Duration::from_secs(10));
        let manager = QueueManager::attach(&registry, "jobs", QueueConfig::default()).unwrap();
        let id = manager.put(json!(1), None).await.unwrap();
        let task = take_now(&manager).await;

        tokio::time::sleep(Duration::from_secs(11)).await;

        let err = task.fail("too slow").await.unwrap_err();
        assert!(matches!(
            err,
            QueueError::NotTaken { state: TaskState::Ready, .. }
        ));
        assert_eq!(queue.state_of(id).await, Some(TaskState::Ready));
    }

    #[tokio::test]
    async fn custom_policies_replace_defaults() {
        let registry = InMemoryRegistry::new();
        let _queue = registry.create("jobs");
        let config = QueueConfig::default()
            .on_delay(|_, env| env.delay = Some(Duration::from_millis(250)))
            .on_attempts(|env| env.attempts += 10);
        let manager = QueueManager::attach(&registry, "jobs", config).unwrap();
        manager.put(json!(1), None).await.unwrap();

        let outcome = take_now(&manager).await.fail("x").await.unwrap();
        assert_eq!(
            outcome,
            Disposition::Released {
                delay: Duration::from_millis(250),
                attempts: 10
            }
        );
    }

    #[tokio::test]
    async fn decode_reads_typed_payload() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Job {
            job: String,
        }

        let journal = Journal::default();
        let (manager, _queue) = setup(json!({}), &journal);
        manager.put(json!({"job": "x"}), None).await.unwrap();

        let task = take_now(&manager).await;
        assert_eq!(task.decode::<Job>().unwrap(), Job { job: "x".to_string() });
        assert!(task.decode::<u32>().is_err());
    }
}
