//! App - アプリケーション層
//!
//! ports を組み合わせて、タスクのライフサイクル（put → take → success / fail / fatal）を実装します。
//!
//! # 主要コンポーネント
//! - **QueueConfig**: 設定とフックの組み立て（起動時検証）
//! - **QueueManager**: 名前付きキューへの put / take
//! - **TaskHandle**: 取り出したタスクの完了報告
//! - **WorkerPool**: take→process→報告のループ

pub mod config;
pub mod handle;
pub mod hooks;
pub mod manager;
pub mod worker;

// 主要な型を再エクスポート
pub use self::config::{CALLABLE_OPTIONS, QueueConfig, SETTING_OPTIONS};
pub use self::handle::{Disposition, TaskHandle};
pub use self::hooks::Hooks;
pub use self::manager::QueueManager;
pub use self::worker::{Outcome, TaskProcessor, WorkerPool};
