//! EnvelopeStore port - envelope の保存先
//!
//! `fail` は release の前にここへ最新の delay/attempts を書き込みます。

use async_trait::async_trait;

use crate::domain::{QueueError, TaskEnvelope, TaskId};

/// EnvelopeStore は id 単位で envelope を上書きする
///
/// # 注意
/// - update と release は別操作でありアトミックではない
/// - 間でプロセスが落ちた場合、タスクは taken のまま残り、
///   キュー基盤側の take タイムアウト回収に任せる
#[async_trait]
pub trait EnvelopeStore: Send + Sync {
    async fn update(&self, id: TaskId, envelope: &TaskEnvelope) -> Result<(), QueueError>;
}
