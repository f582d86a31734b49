//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 外部のキュー基盤・ストレージ・ラベル生成への境界をここに集約し、
//! ライフサイクル層（app）は実装の詳細を知りません。
//!
//! # 設計原則
//! - キュー基盤が ready/delayed/taken/buried の正本
//! - ライフサイクル層は独自のロックや永続化を持たない

pub mod envelope_store;
pub mod id_generator;
pub mod registry;
pub mod task_queue;

// 主要な trait を再エクスポート
pub use self::envelope_store::EnvelopeStore;
pub use self::id_generator::{IdentifierGenerator, RandomIdentifier};
pub use self::registry::{QueueBinding, QueueRegistry};
pub use self::task_queue::TaskQueue;
