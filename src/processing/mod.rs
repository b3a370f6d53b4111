//! 処理状態トラッカー
//!
//! `Idle → Running → {Completed, Cancelled}` の状態遷移を管理する。
//! 共有ハンドル（`Clone`）なので、検出中に別タスクからキャンセルできる。

mod cancel;

pub use cancel::CancelToken;

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
}

/// 表示用のスナップショット
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSnapshot {
    pub state: RunState,
    pub is_processing: bool,
    pub can_cancel: bool,
    pub processing_complete: bool,
    pub run_id: u64,
}

#[derive(Debug, Default)]
struct TrackerState {
    state: RunState,
    is_processing: bool,
    can_cancel: bool,
    processing_complete: bool,
    completed_batches: HashSet<String>,
    run_id: u64,
    token: Option<CancelToken>,
}

#[derive(Debug, Clone, Default)]
pub struct ProcessingTracker {
    inner: Arc<Mutex<TrackerState>>,
}

impl ProcessingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Idleからのみ開始できる。それ以外では何もせず `None`
    pub fn start_processing(&self) -> Option<CancelToken> {
        let mut s = self.lock();
        if s.state != RunState::Idle {
            debug!(state = ?s.state, "start ignored");
            return None;
        }

        let token = CancelToken::new();
        s.state = RunState::Running;
        s.is_processing = true;
        s.can_cancel = true;
        s.processing_complete = false;
        s.completed_batches.clear();
        s.run_id += 1;
        s.token = Some(token.clone());
        debug!(run_id = s.run_id, "run started");
        Some(token)
    }

    /// 実行中のみ有効。次のアイテム境界で停止する
    pub fn cancel(&self) -> bool {
        let mut s = self.lock();
        if s.state != RunState::Running {
            return false;
        }

        s.state = RunState::Cancelled;
        s.is_processing = false;
        s.can_cancel = false;
        if let Some(token) = &s.token {
            token.cancel();
        }
        debug!(run_id = s.run_id, "run cancelled");
        true
    }

    /// キューが空になった時点で呼ぶ
    ///
    /// 最後のアイテムの検出中にキャンセルされた場合も、待機が残って
    /// いなければ完了として扱う。
    pub fn complete(&self) -> bool {
        let mut s = self.lock();
        if !matches!(s.state, RunState::Running | RunState::Cancelled) {
            return false;
        }

        s.state = RunState::Completed;
        s.is_processing = false;
        s.can_cancel = false;
        s.processing_complete = true;
        s.token = None;
        true
    }

    /// 検出失敗で実行を打ち切る
    pub fn fail(&self) -> bool {
        let mut s = self.lock();
        if s.state != RunState::Running {
            return false;
        }

        s.state = RunState::Idle;
        s.is_processing = false;
        s.can_cancel = false;
        s.token = None;
        true
    }

    /// 完了・キャンセル済みの実行を破棄してIdleへ戻す
    pub fn reset(&self) {
        let mut s = self.lock();
        if let Some(token) = s.token.take() {
            token.cancel();
        }
        s.state = RunState::Idle;
        s.is_processing = false;
        s.can_cancel = false;
        s.processing_complete = false;
        s.completed_batches.clear();
    }

    /// 初回のみ `true`。バッチ完了時の副作用を1回に限定する
    pub fn mark_batch_completed(&self, batch_id: &str) -> bool {
        self.lock().completed_batches.insert(batch_id.to_string())
    }

    pub fn is_batch_completed(&self, batch_id: &str) -> bool {
        self.lock().completed_batches.contains(batch_id)
    }

    pub fn state(&self) -> RunState {
        self.lock().state
    }

    pub fn is_processing(&self) -> bool {
        self.lock().is_processing
    }

    pub fn can_cancel(&self) -> bool {
        self.lock().can_cancel
    }

    pub fn processing_complete(&self) -> bool {
        self.lock().processing_complete
    }

    pub fn run_id(&self) -> u64 {
        self.lock().run_id
    }

    pub fn snapshot(&self) -> RunSnapshot {
        let s = self.lock();
        RunSnapshot {
            state: s.state,
            is_processing: s.is_processing,
            can_cancel: s.can_cancel,
            processing_complete: s.processing_complete,
            run_id: s.run_id,
        }
    }
}
