//! IdentifierGenerator port - 表示用ラベルの生成
//!
//! ラベルはログの相関用であり、一意性は保証しません（キーとして使わないこと）。
//! テスト容易性のために trait として抽象化しています。
//!
//! # 実装
//! - **RandomIdentifier**: base58 アルファベットからの一様ランダム（デフォルト）
//! - 任意の `Fn() -> String` クロージャ

use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// 58 symbols; `0`, `O`, `I` and `l` are left out.
pub const ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Default label length.
pub const DEFAULT_LENGTH: usize = 10;

/// IdentifierGenerator は表示用ラベルを生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（全 worker から共有される）
pub trait IdentifierGenerator: Send + Sync {
    fn generate(&self) -> String;
}

impl<F> IdentifierGenerator for F
where
    F: Fn() -> String + Send + Sync,
{
    fn generate(&self) -> String {
        self()
    }
}

/// RandomIdentifier は自前の RNG を持つラベル生成器
///
/// プロセス全体の seed には触れません。構築時に seed された RNG を保持するので、
/// テストでは `StdRng::seed_from_u64` を渡して決定的にできます。
pub struct RandomIdentifier<R = StdRng> {
    rng: Mutex<R>,
    length: usize,
}

impl RandomIdentifier<StdRng> {
    /// Entropy-seeded generator producing labels of [`DEFAULT_LENGTH`].
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy(), DEFAULT_LENGTH)
    }
}

impl Default for RandomIdentifier<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng + Send> RandomIdentifier<R> {
    pub fn with_rng(rng: R, length: usize) -> Self {
        Self {
            rng: Mutex::new(rng),
            length,
        }
    }
}

impl<R: Rng + Send> IdentifierGenerator for RandomIdentifier<R> {
    fn generate(&self) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        (0..self.length)
            .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
            .collect()
    }
}
