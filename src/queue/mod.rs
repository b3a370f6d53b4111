//! 処理キュー
//!
//! 投入されたファイルを投入順に保持し、アイテムごとの状態を管理する。
//! 変更のたびに状態別件数を `watch` チャネルへ流すので、表示側は
//! `subscribe()` で購読するだけでよい。

use crate::error::{CardIntakeError, Result};
use crate::scanner::SourceFile;
use card_intake_common::DetectionResult;
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

/// アイテムの状態（表示用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Processing => "processing",
            ItemStatus::Completed => "completed",
            ItemStatus::Error => "error",
        }
    }
}

/// 状態と付随データ
///
/// 検出結果は完了時のみ、エラーメッセージはエラー時のみ存在する。
#[derive(Debug, Clone, PartialEq)]
pub enum ItemState {
    Pending,
    Processing,
    Completed(DetectionResult),
    Error(String),
}

/// `update_status` に渡す遷移
#[derive(Debug, Clone)]
pub enum ItemUpdate {
    StartProcessing,
    Complete(DetectionResult),
    Fail(String),
    /// 待機状態へ戻す（結果・エラーは破棄）
    Requeue,
}

#[derive(Debug, Clone)]
pub struct QueueItem {
    id: String,
    file: SourceFile,
    state: ItemState,
}

impl QueueItem {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn file(&self) -> &SourceFile {
        &self.file
    }

    pub fn state(&self) -> &ItemState {
        &self.state
    }

    pub fn status(&self) -> ItemStatus {
        match self.state {
            ItemState::Pending => ItemStatus::Pending,
            ItemState::Processing => ItemStatus::Processing,
            ItemState::Completed(_) => ItemStatus::Completed,
            ItemState::Error(_) => ItemStatus::Error,
        }
    }

    pub fn result(&self) -> Option<&DetectionResult> {
        match &self.state {
            ItemState::Completed(result) => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            ItemState::Error(message) => Some(message),
            _ => None,
        }
    }
}

/// 状態別件数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub error: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.pending + self.processing + self.completed + self.error
    }
}

impl std::fmt::Display for StatusCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "待機 {} / 処理中 {} / 完了 {} / エラー {}",
            self.pending, self.processing, self.completed, self.error
        )
    }
}

/// `enqueue` の結果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnqueueReport {
    /// 追加されたアイテムのID（投入順）
    pub accepted: Vec<String>,
    /// 画像以外として除外された件数
    pub rejected: usize,
}

pub struct QueueStore {
    items: Vec<QueueItem>,
    counts_tx: watch::Sender<StatusCounts>,
}

impl Default for QueueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueStore {
    pub fn new() -> Self {
        let (counts_tx, _) = watch::channel(StatusCounts::default());
        Self {
            items: Vec::new(),
            counts_tx,
        }
    }

    /// 画像ファイルのみを待機状態で追加
    ///
    /// 1件も受け付けられなかった場合はキューを変更せずエラーを返す。
    pub fn enqueue(&mut self, files: Vec<SourceFile>) -> Result<EnqueueReport> {
        let (images, others): (Vec<_>, Vec<_>) = files.into_iter().partition(|f| f.is_image());
        let rejected = others.len();

        if images.is_empty() {
            return Err(CardIntakeError::NoImagesAccepted { rejected });
        }

        let mut accepted = Vec::with_capacity(images.len());
        for file in images {
            let id = uuid::Uuid::new_v4().to_string();
            debug!(id = %id, file = %file.file_name, "enqueued");
            accepted.push(id.clone());
            self.items.push(QueueItem {
                id,
                file,
                state: ItemState::Pending,
            });
        }

        self.publish();
        Ok(EnqueueReport { accepted, rejected })
    }

    /// 状態に関わらず削除する。処理中の検出は中断されない
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        let removed = self.items.len() != before;
        if removed {
            self.publish();
        }
        removed
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.publish();
    }

    pub fn update_status(&mut self, id: &str, update: ItemUpdate) -> Result<ItemStatus> {
        let item = self
            .items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| CardIntakeError::ItemNotFound(id.to_string()))?;

        item.state = match update {
            ItemUpdate::StartProcessing => ItemState::Processing,
            ItemUpdate::Complete(result) => ItemState::Completed(result),
            ItemUpdate::Fail(message) => ItemState::Error(message),
            ItemUpdate::Requeue => ItemState::Pending,
        };
        let status = item.status();

        self.publish();
        Ok(status)
    }

    pub fn get(&self, id: &str) -> Option<&QueueItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    /// 待機中アイテムのID（投入順）
    pub fn pending_ids(&self) -> Vec<String> {
        self.items
            .iter()
            .filter(|item| item.status() == ItemStatus::Pending)
            .map(|item| item.id.clone())
            .collect()
    }

    pub fn has_pending(&self) -> bool {
        self.items.iter().any(|item| item.status() == ItemStatus::Pending)
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for item in &self.items {
            match item.status() {
                ItemStatus::Pending => counts.pending += 1,
                ItemStatus::Processing => counts.processing += 1,
                ItemStatus::Completed => counts.completed += 1,
                ItemStatus::Error => counts.error += 1,
            }
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusCounts> {
        self.counts_tx.subscribe()
    }

    fn publish(&self) {
        self.counts_tx.send_replace(self.counts());
    }
}
