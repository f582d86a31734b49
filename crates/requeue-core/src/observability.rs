//! Observability: queue counts and the process-wide tracing sink.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Tasks per substrate state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub ready: usize,
    pub delayed: usize,
    pub taken: usize,
    pub buried: usize,
}

impl QueueCounts {
    /// Nothing left to hand out or finish (buried tasks do not count).
    pub fn is_drained(&self) -> bool {
        self.ready == 0 && self.delayed == 0 && self.taken == 0
    }
}

/// Initialize tracing/logging for the process.
///
/// JSON lines, filtered through `RUST_LOG` (default `info`). Safe to call more
/// than once; later calls are no-ops. The library itself never calls this.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_current_span(true)
        .with_target(false)
        .try_init();
}
