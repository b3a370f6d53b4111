use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 協調的キャンセルのトークン
///
/// 検出処理はアイテムの境目でのみこのフラグを確認する。
/// 実行中の検出呼び出しは中断されず、結果も記録される。
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
