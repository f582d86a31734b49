//! QueueRegistry port - キュー名の解決

use std::sync::Arc;

use super::{EnvelopeStore, TaskQueue};

/// A resolved queue: its primitives and the storage behind it.
#[derive(Clone)]
pub struct QueueBinding {
    pub queue: Arc<dyn TaskQueue>,
    pub store: Arc<dyn EnvelopeStore>,
}

impl std::fmt::Debug for QueueBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueBinding")
            .field("queue", &"<dyn TaskQueue>")
            .field("store", &"<dyn EnvelopeStore>")
            .finish()
    }
}

/// QueueRegistry は名前から既存のキューを引く
///
/// `attach` は未知の名前に対して即座に失敗します。
pub trait QueueRegistry: Send + Sync {
    fn resolve(&self, name: &str) -> Option<QueueBinding>;
}
