//! InMemoryQueue - 開発用のキュー基盤
//!
//! # 学習ポイント
//! - 1 つの Mutex で taken の単一所有を保証する
//! - Notify + sleep_until による timeout 付き blocking take
//! - BinaryHeap（min-heap）で delayed タスクを管理
//! - take タイムアウト（ttr）: 期限切れの taken を ready に戻す

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::debug;

use crate::domain::{QueueError, TaskEnvelope, TaskId, TaskState};
use crate::observability::QueueCounts;
use crate::ports::{EnvelopeStore, QueueBinding, QueueRegistry, TaskQueue};

/// Default take timeout ("time to run").
pub const DEFAULT_TTR: Duration = Duration::from_secs(120);

/// Far enough in the future to stand in for "never".
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

fn after(delay: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(delay).unwrap_or(now + FAR_FUTURE)
}

/// Timed entry (delayed release or lease expiry) for the priority queues.
///
/// Reverse ordering so BinaryHeap acts as a min-heap (earliest first).
#[derive(Debug, Clone, PartialEq, Eq)]
struct ScheduledTask {
    due_at: Instant,
    task_id: TaskId,
}

impl PartialOrd for ScheduledTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledTask {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due_at
            .cmp(&self.due_at)
            .then_with(|| other.task_id.cmp(&self.task_id))
    }
}

#[derive(Debug, Clone)]
struct QueuedTask {
    envelope: TaskEnvelope,
    state: TaskState,

    /// Lease deadline while taken.
    taken_until: Option<Instant>,
}

#[derive(Default)]
struct InMemoryQueueState {
    /// Every live task (acked tasks are removed).
    records: HashMap<TaskId, QueuedTask>,

    /// Ready queue (TaskIds only), FIFO.
    ready: VecDeque<TaskId>,

    /// Delayed queue.
    delayed: BinaryHeap<ScheduledTask>,

    /// Lease deadlines of taken tasks. Entries go stale once the task is
    /// finished or re-taken; `reclaim_expired` skips those.
    leases: BinaryHeap<ScheduledTask>,

    /// Buried tasks in burial order, for kick.
    buried: VecDeque<TaskId>,

    next_task_id: u64,
}

impl InMemoryQueueState {
    fn allocate_task_id(&mut self) -> TaskId {
        self.next_task_id += 1;
        TaskId::new(self.next_task_id)
    }

    /// Put `id` into the ready or delayed rotation.
    fn place(&mut self, id: TaskId, delay: Duration) {
        let state = if delay.is_zero() {
            self.ready.push_back(id);
            TaskState::Ready
        } else {
            self.delayed.push(ScheduledTask {
                due_at: after(delay),
                task_id: id,
            });
            TaskState::Delayed
        };
        if let Some(record) = self.records.get_mut(&id) {
            record.state = state;
            record.taken_until = None;
        }
    }

    /// Return taken tasks whose lease ran out to the ready queue.
    fn reclaim_expired(&mut self, now: Instant) {
        while let Some(entry) = self.leases.peek() {
            if entry.due_at > now {
                break;
            }
            let Some(entry) = self.leases.pop() else {
                break;
            };
            let expired = self.records.get(&entry.task_id).is_some_and(|r| {
                r.state == TaskState::Taken && r.taken_until == Some(entry.due_at)
            });
            if expired {
                debug!(task_id = %entry.task_id, "lease expired: back to ready");
                self.place(entry.task_id, Duration::ZERO);
            }
        }
    }

    /// Earliest instant at which a delayed task or a lease comes due.
    fn next_wake(&self) -> Option<Instant> {
        let delayed = self.delayed.peek().map(|entry| entry.due_at);
        let lease = self.leases.peek().map(|entry| entry.due_at);
        match (delayed, lease) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Move delayed tasks whose time has come to the ready queue.
    fn promote_delayed(&mut self, now: Instant) {
        while let Some(entry) = self.delayed.peek() {
            if entry.due_at > now {
                break; // Heap is sorted, so we can stop
            }
            let Some(entry) = self.delayed.pop() else {
                break;
            };
            if let Some(record) = self.records.get_mut(&entry.task_id)
                && record.state == TaskState::Delayed
            {
                record.state = TaskState::Ready;
                self.ready.push_back(entry.task_id);
            }
        }
    }

    fn take_next(&mut self, ttr: Duration) -> Option<(TaskId, TaskEnvelope)> {
        while let Some(id) = self.ready.pop_front() {
            if let Some(record) = self.records.get_mut(&id)
                && record.state.is_runnable()
            {
                let until = after(ttr);
                record.state = TaskState::Taken;
                record.taken_until = Some(until);
                let envelope = record.envelope.clone();
                self.leases.push(ScheduledTask {
                    due_at: until,
                    task_id: id,
                });
                return Some((id, envelope));
            }
        }
        None
    }

    fn taken(&mut self, id: TaskId) -> Result<&mut QueuedTask, QueueError> {
        let record = self.records.get_mut(&id).ok_or(QueueError::NotFound(id))?;
        if !record.state.is_taken() {
            return Err(QueueError::NotTaken {
                id,
                state: record.state,
            });
        }
        Ok(record)
    }

    fn counts(&self) -> QueueCounts {
        let mut counts = QueueCounts::default();
        for record in self.records.values() {
            match record.state {
                TaskState::Ready => counts.ready += 1,
                TaskState::Delayed => counts.delayed += 1,
                TaskState::Taken => counts.taken += 1,
                TaskState::Buried => counts.buried += 1,
            }
        }
        counts
    }
}

/// InMemoryQueue は開発・テスト用のキュー基盤
///
/// # 実装詳細
/// - 状態はすべて 1 つの `tokio::sync::Mutex` の内側
/// - dequeue は取り出しと Taken への遷移を同じロック区間で行う
/// - enqueue/release/kick は `notify_waiters` で待機中の taker を起こす
/// - taken のまま ttr を過ぎたタスクは ready に戻る（handle の drop やクラッシュからの回復）
///
/// 期限切れ後、古い handle からの ack/release/bury は `NotTaken` になります。
/// ただし別の worker が取り直した後は id が同じなので区別できません。
///
/// 永続化はしません。プロセスが落ちればすべて消えます。
pub struct InMemoryQueue {
    state: Mutex<InMemoryQueueState>,
    notify: Notify,
    ttr: Duration,
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::with_ttr(DEFAULT_TTR)
    }

    /// Queue whose taken tasks return to ready after `ttr`.
    pub fn with_ttr(ttr: Duration) -> Self {
        Self {
            state: Mutex::new(InMemoryQueueState::default()),
            notify: Notify::new(),
            ttr,
        }
    }

    pub fn ttr(&self) -> Duration {
        self.ttr
    }

    /// Snapshot of tasks per state.
    pub async fn counts(&self) -> QueueCounts {
        let mut state = self.state.lock().await;
        state.reclaim_expired(Instant::now());
        state.counts()
    }

    /// Current state of a task; `None` once acked (or never enqueued).
    pub async fn state_of(&self, id: TaskId) -> Option<TaskState> {
        let mut state = self.state.lock().await;
        state.reclaim_expired(Instant::now());
        state.records.get(&id).map(|r| r.state)
    }

    /// Stored envelope of a task.
    pub async fn envelope_of(&self, id: TaskId) -> Option<TaskEnvelope> {
        self.state
            .lock()
            .await
            .records
            .get(&id)
            .map(|r| r.envelope.clone())
    }

    /// Operator action: move up to `bound` buried tasks back to ready, oldest
    /// burial first. Returns how many were revived.
    pub async fn kick(&self, bound: usize) -> usize {
        let kicked = {
            let mut state = self.state.lock().await;
            let mut kicked = 0;
            while kicked < bound {
                let Some(id) = state.buried.pop_front() else {
                    break;
                };
                if state
                    .records
                    .get(&id)
                    .is_some_and(|r| r.state == TaskState::Buried)
                {
                    state.place(id, Duration::ZERO);
                    kicked += 1;
                }
            }
            kicked
        };
        if kicked > 0 {
            debug!(kicked, "kick: revived buried tasks");
            self.notify.notify_waiters();
        }
        kicked
    }
}

#[async_trait]
impl TaskQueue for InMemoryQueue {
    async fn enqueue(
        &self,
        envelope: TaskEnvelope,
        delay: Option<Duration>,
    ) -> Result<TaskId, QueueError> {
        let id = {
            let mut state = self.state.lock().await;
            let id = state.allocate_task_id();
            state.records.insert(
                id,
                QueuedTask {
                    envelope,
                    state: TaskState::Ready,
                    taken_until: None,
                },
            );
            state.place(id, delay.unwrap_or_default());
            id
        };
        debug!(task_id = %id, ?delay, "enqueue: stored");

        // Notify outside the lock
        self.notify.notify_waiters();
        Ok(id)
    }

    async fn dequeue(
        &self,
        timeout: Duration,
    ) -> Result<Option<(TaskId, TaskEnvelope)>, QueueError> {
        let deadline = after(timeout);
        loop {
            // Register interest before looking at the state so a concurrent
            // enqueue between the check and the wait is not lost.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let next_wake = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                state.reclaim_expired(now);
                state.promote_delayed(now);
                if let Some((id, envelope)) = state.take_next(self.ttr) {
                    debug!(task_id = %id, "dequeue: taken");
                    return Ok(Some((id, envelope)));
                }
                state.next_wake()
            };

            if Instant::now() >= deadline {
                return Ok(None);
            }

            // Wait for notification, the next delay or lease expiry, or the deadline
            let wake_at = next_wake.map_or(deadline, |at| at.min(deadline));
            tokio::select! {
                _ = &mut notified => {},
                _ = tokio::time::sleep_until(wake_at) => {},
            }
        }
    }

    async fn ack(&self, id: TaskId) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        state.reclaim_expired(Instant::now());
        state.taken(id)?;
        state.records.remove(&id);
        debug!(task_id = %id, "ack: removed");
        Ok(())
    }

    async fn release(&self, id: TaskId, delay: Duration) -> Result<(), QueueError> {
        {
            let mut state = self.state.lock().await;
            state.reclaim_expired(Instant::now());
            state.taken(id)?;
            state.place(id, delay);
        }
        debug!(task_id = %id, ?delay, "release: back in rotation");
        self.notify.notify_waiters();
        Ok(())
    }

    async fn bury(&self, id: TaskId) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        state.reclaim_expired(Instant::now());
        let record = state.taken(id)?;
        record.state = TaskState::Buried;
        record.taken_until = None;
        state.buried.push_back(id);
        debug!(task_id = %id, "bury: out of rotation");
        Ok(())
    }
}

#[async_trait]
impl EnvelopeStore for InMemoryQueue {
    async fn update(&self, id: TaskId, envelope: &TaskEnvelope) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        let record = state.records.get_mut(&id).ok_or(QueueError::NotFound(id))?;
        record.envelope = envelope.clone();
        Ok(())
    }
}

/// InMemoryRegistry は名前付きの InMemoryQueue を管理
///
/// # 使用例
/// ```ignore
/// let registry = InMemoryRegistry::new();
/// let queue = registry.create("emails");
/// let manager = QueueManager::attach(&registry, "emails", QueueConfig::default())?;
/// ```
#[derive(Default)]
pub struct InMemoryRegistry {
    queues: RwLock<HashMap<String, Arc<InMemoryQueue>>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the named queue, or return it if it already exists.
    pub fn create(&self, name: &str) -> Arc<InMemoryQueue> {
        self.create_with_ttr(name, DEFAULT_TTR)
    }

    /// Like [`create`](Self::create) with an explicit take timeout. An existing
    /// queue keeps its own.
    pub fn create_with_ttr(&self, name: &str, ttr: Duration) -> Arc<InMemoryQueue> {
        let mut queues = self.queues.write().unwrap_or_else(PoisonError::into_inner);
        let queue = queues
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(InMemoryQueue::with_ttr(ttr)));
        Arc::clone(queue)
    }

    pub fn get(&self, name: &str) -> Option<Arc<InMemoryQueue>> {
        let queues = self.queues.read().unwrap_or_else(PoisonError::into_inner);
        queues.get(name).cloned()
    }
}

impl QueueRegistry for InMemoryRegistry {
    fn resolve(&self, name: &str) -> Option<QueueBinding> {
        let queue = self.get(name)?;
        Some(QueueBinding {
            queue: Arc::clone(&queue) as Arc<dyn TaskQueue>,
            store: queue as Arc<dyn EnvelopeStore>,
        })
    }
}
