//! 一括取り込みセッション
//!
//! キュー・処理状態・レビューと各サービスをまとめて持つコンテキスト。
//! グローバル状態は使わず、操作はすべてこのオブジェクト経由で行う。

use crate::creator::{CardCreator, CardId};
use crate::detector::{BatchDetector, RunOutcome, RunReport};
use crate::error::{CardIntakeError, Result};
use crate::notify::{send, NotificationLevel, Notifier};
use crate::processing::{ProcessingTracker, RunState};
use crate::progress::ProgressSink;
use crate::queue::{EnqueueReport, QueueStore};
use crate::review::ReviewStage;
use crate::scanner::SourceFile;
use card_intake_common::{Bounds, DetectedCard};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

pub struct BatchSession {
    queue: QueueStore,
    tracker: ProcessingTracker,
    review: ReviewStage,
    detector: BatchDetector,
    notifier: Arc<dyn Notifier>,
    /// キャンセルされた実行で完了し、まだレビューに渡していないアイテム
    unreviewed: Vec<String>,
}

impl BatchSession {
    pub fn new(detector: BatchDetector, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            queue: QueueStore::new(),
            tracker: ProcessingTracker::new(),
            review: ReviewStage::new(),
            detector,
            notifier,
            unreviewed: Vec::new(),
        }
    }

    pub fn queue(&self) -> &QueueStore {
        &self.queue
    }

    /// キャンセル用に共有できるハンドル
    pub fn tracker(&self) -> ProcessingTracker {
        self.tracker.clone()
    }

    pub fn review(&self) -> &ReviewStage {
        &self.review
    }

    /// 画像以外を除外してキューに追加
    pub fn add_files(&mut self, files: Vec<SourceFile>) -> Result<EnqueueReport> {
        match self.queue.enqueue(files) {
            Ok(report) => {
                if report.rejected > 0 {
                    self.warn_rejected(report.rejected);
                }
                self.notify(
                    NotificationLevel::Success,
                    format!("{}件の画像をキューに追加しました", report.accepted.len()),
                );
                Ok(report)
            }
            Err(CardIntakeError::NoImagesAccepted { rejected }) => {
                if rejected > 0 {
                    self.warn_rejected(rejected);
                }
                self.notify(NotificationLevel::Error, "画像ファイルが選択されていません");
                Err(CardIntakeError::NoImagesAccepted { rejected })
            }
            Err(e) => Err(e),
        }
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.queue.remove(id)
    }

    /// キューを空にし、実行状態とバッチ完了記録も初期化
    pub fn clear(&mut self) {
        self.queue.clear();
        self.tracker.reset();
        self.unreviewed.clear();
    }

    /// 待機中アイテムを検出する
    ///
    /// 既に実行中なら何もせず `Ok(None)`。完了時に1枚以上検出されていれば
    /// レビューを開く。キャンセル後の再開では、前の実行で検出済みの
    /// カードもまとめてレビューに渡す。
    pub async fn process_queue(&mut self, progress: &dyn ProgressSink) -> Result<Option<RunReport>> {
        if !self.queue.has_pending() {
            self.notify(NotificationLevel::Warning, "処理するファイルがありません");
            return Err(CardIntakeError::EmptyQueue);
        }

        // 前回の実行が確定済みならIdleへ戻してから開始
        if matches!(self.tracker.state(), RunState::Completed | RunState::Cancelled) {
            self.tracker.reset();
        }

        let Some(token) = self.tracker.start_processing() else {
            debug!("processing already running");
            return Ok(None);
        };

        let result = self
            .detector
            .process_queue(&mut self.queue, &self.tracker, &token, progress)
            .await;

        match result {
            Ok(report) => {
                self.finish_run(&report);
                Ok(Some(report))
            }
            Err(e) => {
                self.notify(NotificationLevel::Error, format!("カード検出に失敗しました: {}", e));
                Err(e)
            }
        }
    }

    /// 実行中ならキャンセルを要求する（次のアイテム境界で停止）
    pub fn cancel(&self) -> bool {
        let cancelled = self.tracker.cancel();
        if cancelled {
            self.notify(NotificationLevel::Info, "キャンセルを要求しました");
        }
        cancelled
    }

    pub fn toggle(&mut self, card_id: &str) {
        self.review.toggle(card_id);
    }

    pub fn set_selection<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.review.set_selection(ids);
    }

    pub fn edit(&mut self, card_id: &str, bounds: Bounds) -> Result<()> {
        self.review.edit(card_id, bounds)
    }

    pub async fn confirm_selected(&mut self, creator: &dyn CardCreator) -> Result<Vec<CardId>> {
        match self.review.confirm_selected(creator).await {
            Ok(ids) => {
                self.notify(
                    NotificationLevel::Success,
                    format!("{}枚のカードを作成しました", ids.len()),
                );
                Ok(ids)
            }
            Err(e) => {
                self.notify(NotificationLevel::Error, format!("カード作成に失敗しました: {}", e));
                Err(e)
            }
        }
    }

    pub fn start_over(&mut self) {
        self.review.start_over();
    }

    fn finish_run(&mut self, report: &RunReport) {
        match report.outcome {
            RunOutcome::Completed => {
                // 完了通知は実行ごとに1回だけ
                if !self.tracker.mark_batch_completed(&format!("run{}", report.run_id)) {
                    return;
                }

                let mut items = std::mem::take(&mut self.unreviewed);
                items.extend(report.completed_items.iter().cloned());
                let detections = self.collect_item_detections(&items);

                let total = detections.len();
                if total > 0 {
                    self.review.open(detections);
                    self.notify(
                        NotificationLevel::Success,
                        format!("{}件の画像から{}枚のカードを検出しました", report.processed, total),
                    );
                } else {
                    self.notify(NotificationLevel::Info, "カードが検出されませんでした");
                }

                if report.failed > 0 {
                    self.notify(
                        NotificationLevel::Warning,
                        format!("{}件の画像で検出に失敗しました", report.failed),
                    );
                }
            }
            RunOutcome::Cancelled => {
                self.unreviewed.extend(report.completed_items.iter().cloned());
                self.notify(
                    NotificationLevel::Warning,
                    format!("処理をキャンセルしました（{}件処理済み）", report.processed),
                );
            }
        }
    }

    /// 完了済みアイテムの検出カードをカードID順にまとめる。削除済みは無視
    fn collect_item_detections(&self, item_ids: &[String]) -> BTreeMap<String, DetectedCard> {
        item_ids
            .iter()
            .filter_map(|id| self.queue.get(id).and_then(|item| item.result()))
            .flat_map(|result| result.cards.iter())
            .map(|card| (card.id.clone(), card.clone()))
            .collect()
    }

    fn warn_rejected(&self, rejected: usize) {
        self.notify(
            NotificationLevel::Warning,
            format!("{}件のファイルをスキップしました（画像ではありません）", rejected),
        );
    }

    fn notify(&self, level: NotificationLevel, message: impl Into<String>) {
        send(self.notifier.as_ref(), level, message);
    }
}
