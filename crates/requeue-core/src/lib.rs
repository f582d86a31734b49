//! requeue-core
//!
//! Retry and backoff lifecycle for tasks held in an external work queue.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, envelope, settings, policy, state, errors）
//! - **ports**: 抽象化レイヤー（TaskQueue, EnvelopeStore, QueueRegistry, IdentifierGenerator）
//! - **app**: アプリケーションロジック（config, manager, handle, hooks, worker）
//! - **impls**: 実装（InMemoryQueue / InMemoryRegistry）
//! - **observability**: tracing の初期化とキューのカウント

pub mod app;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;

pub use app::{Disposition, Outcome, QueueConfig, QueueManager, TaskHandle, TaskProcessor, WorkerPool};
pub use domain::{QueueSettings, TaskEnvelope};
