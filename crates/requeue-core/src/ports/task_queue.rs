//! TaskQueue port - 外部キュー基盤（put/take/ack/release/bury）
//!
//! ライフサイクル層はこの trait だけを通してキューに触れます。
//! 耐久性・ready/delayed/taken の管理・クラッシュ回復は実装側の責務です。

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{QueueError, TaskEnvelope, TaskId};

/// TaskQueue は外部キュー基盤のプリミティブ
///
/// # 保証（実装側）
/// - ready な envelope は同時に 1 つの taker にしか渡さない
/// - `dequeue` は呼び出し元のタスクだけを待たせる（他の worker をブロックしない）
///
/// # エラー
/// - 未知の id や taken でない id への ack/release/bury はエラーを返す
/// - ライフサイクル層はそれを握りつぶさず呼び出し元へ返す
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Enqueue an envelope, optionally delayed. Returns the queue-assigned id.
    async fn enqueue(
        &self,
        envelope: TaskEnvelope,
        delay: Option<Duration>,
    ) -> Result<TaskId, QueueError>;

    /// Wait up to `timeout` for a ready task and mark it taken.
    async fn dequeue(&self, timeout: Duration)
        -> Result<Option<(TaskId, TaskEnvelope)>, QueueError>;

    /// Remove a taken task permanently.
    async fn ack(&self, id: TaskId) -> Result<(), QueueError>;

    /// Put a taken task back into rotation after `delay`.
    async fn release(&self, id: TaskId, delay: Duration) -> Result<(), QueueError>;

    /// Move a taken task out of rotation.
    async fn bury(&self, id: TaskId) -> Result<(), QueueError>;
}
