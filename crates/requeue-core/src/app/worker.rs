//! WorkerPool - take→process→success/fail/fatal のループ
//!
//! # フロー
//! 1. QueueManager::take() で 1 件取得（poll_timeout まで待つ）
//! 2. TaskProcessor::process() を実行 → Outcome
//! 3. Outcome に応じて success / fail / fatal
//!
//! process が panic した場合は fail 扱い（worker は止まらない）

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info_span, warn};

use super::handle::TaskHandle;
use super::manager::QueueManager;

/// How a processor wants its task finished.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Done; ack with this result.
    Success(Value),

    /// Transient failure; retry with backoff (may escalate to buried).
    Retry(String),

    /// Permanent failure; bury now.
    Fatal(String),
}

/// User code run for every taken task.
#[async_trait]
pub trait TaskProcessor: Send + Sync {
    async fn process(&self, task: &TaskHandle) -> Outcome;
}

/// Worker pool handle.
/// - `request_shutdown` でワーカー全体に停止を伝える
/// - 実行中の take はキャンセルしない（poll_timeout が停止までの上限）
/// - `shutdown_and_join()` で全ワーカーの終了を待てる
pub struct WorkerPool {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `n` workers on the current tokio runtime.
    pub fn spawn(
        n: usize,
        manager: QueueManager,
        processor: Arc<dyn TaskProcessor>,
        poll_timeout: Duration,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let name = format!("{}-worker-{worker_id}", manager.name());
            let span = info_span!("worker", name = %name, id = worker_id);
            let join = tokio::spawn(
                worker_loop(
                    manager.clone(),
                    Arc::clone(&processor),
                    poll_timeout,
                    shutdown_rx.clone(),
                )
                .instrument(span),
            );
            joins.push(join);
        }

        Self { shutdown_tx, joins }
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// Ask every worker to stop after its current task.
    pub fn request_shutdown(&self) {
        // ignore send error: receivers may already be dropped
        let _ = self.shutdown_tx.send(true);
    }

    /// Shutdown and wait for all workers.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            if let Err(e) = join.await {
                error!(error = %e, "worker ended abnormally");
            }
        }
    }
}

async fn worker_loop(
    manager: QueueManager,
    processor: Arc<dyn TaskProcessor>,
    poll_timeout: Duration,
    shutdown_rx: watch::Receiver<bool>,
) {
    while !*shutdown_rx.borrow() {
        let task = match manager.take(poll_timeout).await {
            Ok(Some(task)) => task,
            Ok(None) => continue,
            Err(e) => {
                warn!(error = %e, "take failed");
                tokio::time::sleep(poll_timeout).await;
                continue;
            }
        };

        let task_id = task.id();
        let outcome = AssertUnwindSafe(processor.process(&task))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                let message = panic_message(&*panic);
                error!(task_id = %task_id, panic = message, "processor panicked");
                Outcome::Retry(format!("processor panicked: {message}"))
            });

        let result = match outcome {
            Outcome::Success(result) => task.success(result).await,
            Outcome::Retry(reason) => task.fail(reason).await.map(|_| ()),
            Outcome::Fatal(reason) => task.fatal(reason).await,
        };
        if let Err(e) = result {
            error!(task_id = %task_id, error = %e, "outcome report failed");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}
