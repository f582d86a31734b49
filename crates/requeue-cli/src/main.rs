use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::time::{Duration, sleep};
use tracing::{info, warn};

use requeue_core::impls::InMemoryRegistry;
use requeue_core::observability::init_tracing;
use requeue_core::{Outcome, QueueConfig, QueueManager, TaskHandle, TaskProcessor, WorkerPool};

#[derive(Debug, Deserialize)]
struct HelloPayload {
    name: String,
    #[serde(default)]
    poison: bool,
}

struct HelloProcessor {
    remaining_failures: AtomicU32,
}

impl HelloProcessor {
    fn new(n: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(n),
        }
    }
}

#[async_trait]
impl TaskProcessor for HelloProcessor {
    async fn process(&self, task: &TaskHandle) -> Outcome {
        let p: HelloPayload = match task.decode() {
            Ok(p) => p,
            Err(e) => return Outcome::Fatal(format!("json decode: {e}")),
        };

        if p.poison {
            return Outcome::Retry(format!("{} never succeeds", p.name));
        }

        // fetch_update: 0 になったら成功に切り替える
        if let Ok(left) = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        {
            return Outcome::Retry(format!("intentional failure (left={left})"));
        }

        println!("Hello, {}!", p.name);
        Outcome::Success(json!({ "greeted": p.name }))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    // (A) キューと設定を用意（短いバックオフ、3 回まで再試行）
    let registry = InMemoryRegistry::new();
    let queue = registry.create("default");
    let config = QueueConfig::from_value(&json!({
        "max_attempts": 3,
        "default_delay": 0.1,
        "delay_multiplier": 2,
        "delay_threshold": 1,
    }))?;
    let manager = QueueManager::attach(&registry, "default", config)?;

    // (B) タスク投入：いずれ成功するものと、必ず失敗して埋められるもの
    let hello = manager.put(json!({ "name": "requeue" }), None).await?;
    let doomed = manager
        .put(json!({ "name": "doomed", "poison": true }), None)
        .await?;
    info!(%hello, %doomed, "demo tasks enqueued");

    // (C) worker を起動（2 本）
    let pool = WorkerPool::spawn(
        2,
        manager,
        Arc::new(HelloProcessor::new(2)),
        Duration::from_millis(200),
    );

    // (D) ready / delayed / taken が空になるまでポーリング（上限 30 秒）
    let drained = tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            let counts = queue.counts().await;
            if counts.is_drained() {
                break counts;
            }
            sleep(Duration::from_millis(50)).await;
        }
    })
    .await;
    let counts = match drained {
        Ok(counts) => counts,
        Err(_) => {
            let counts = queue.counts().await;
            warn!(?counts, "queue did not drain in time");
            counts
        }
    };
    println!("counts: {}", serde_json::to_string(&counts)?);
    println!("doomed: {:?}", queue.state_of(doomed).await);

    // (E) graceful shutdown
    pool.shutdown_and_join().await;
    Ok(())
}
