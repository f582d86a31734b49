//! Impls - 実装（開発用・テスト用）
//!
//! このモジュールには ports の実装を含めます。
//!
//! # 含まれる実装
//! - **InMemoryQueue**: TaskQueue + EnvelopeStore の開発用実装（ttr 付き）
//! - **InMemoryRegistry**: 名前付き InMemoryQueue の QueueRegistry
//!
//! # 本番用実装
//! 本番では耐久性のあるキュー基盤に対して ports を実装してください。

pub mod inmem_queue;

// 主要な型を再エクスポート
pub use self::inmem_queue::{DEFAULT_TTR, InMemoryQueue, InMemoryRegistry};
