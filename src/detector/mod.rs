//! バッチ検出アダプタ
//!
//! 待機中アイテムを投入順に1件ずつ検出器へ渡し、結果をキューへ書き戻す。
//! キャンセルはアイテムの境目でのみ確認する。

pub mod cache;
mod simple;

pub use cache::{CacheFile, CachedDetector};
pub use simple::{candidate_regions, detect_in_dimensions, SimpleDetector};

use crate::error::{CardIntakeError, Result};
use crate::processing::{CancelToken, ProcessingTracker};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::queue::{ItemUpdate, QueueStore};
use crate::scanner::SourceFile;
use async_trait::async_trait;
use card_intake_common::{DetectedCard, DetectionResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 検出器が返す失敗理由
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DetectError {
    #[error("画像を読み込めません: {0}")]
    Unreadable(String),

    #[error("{0}")]
    Failed(String),
}

/// 検出サービス
///
/// 返すカードのIDはアダプタ側で `<item-id>-card-<n>` に振り直される。
#[async_trait]
pub trait CardDetector: Send + Sync {
    async fn detect(
        &self,
        file: &SourceFile,
        cancel: &CancelToken,
    ) -> std::result::Result<DetectionResult, DetectError>;
}

/// 1件の検出失敗をどう扱うか
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// 1件でも失敗したら実行全体を失敗とし、この実行の検出結果を破棄
    #[default]
    FailFast,
    /// 失敗したアイテムをエラーにして続行
    ContinueOnError,
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailurePolicy::FailFast => write!(f, "fail-fast"),
            FailurePolicy::ContinueOnError => write!(f, "continue-on-error"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Cancelled,
}

/// 1回の実行結果
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: u64,
    pub outcome: RunOutcome,
    pub processed: usize,
    pub failed: usize,
    /// カードID → 検出カード（この実行分すべて）
    pub detections: BTreeMap<String, DetectedCard>,
    /// 画像単位の結果（IDは振り直し済み）
    pub results: Vec<DetectionResult>,
    /// この実行で完了したアイテムのID（投入順）
    pub completed_items: Vec<String>,
}

impl RunReport {
    pub fn total_detected(&self) -> usize {
        self.detections.len()
    }

    /// 完了した実行の結果のみJSONで書き出す
    ///
    /// キャンセルされた実行では何も書かずに `false` を返す。
    pub fn save_results(&self, path: &Path) -> Result<bool> {
        if self.outcome != RunOutcome::Completed {
            return Ok(false);
        }
        let json = serde_json::to_string_pretty(&self.results)?;
        std::fs::write(path, json)?;
        Ok(true)
    }
}

pub struct BatchDetector {
    detector: Arc<dyn CardDetector>,
    policy: FailurePolicy,
    timeout: Option<Duration>,
    batch_size: usize,
}

impl BatchDetector {
    pub fn new(detector: Arc<dyn CardDetector>) -> Self {
        Self {
            detector,
            policy: FailurePolicy::default(),
            timeout: None,
            batch_size: 5,
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// 待機中アイテムをすべて検出する
    ///
    /// 呼び出し側で `tracker.start_processing()` 済みであること。
    /// 待機中アイテムがなければ実行を打ち切って `EmptyQueue` を返す。
    pub async fn process_queue(
        &self,
        queue: &mut QueueStore,
        tracker: &ProcessingTracker,
        token: &CancelToken,
        progress: &dyn ProgressSink,
    ) -> Result<RunReport> {
        let pending = queue.pending_ids();
        if pending.is_empty() {
            tracker.fail();
            return Err(CardIntakeError::EmptyQueue);
        }

        let run_id = tracker.run_id();
        let total = pending.len();
        info!(run_id, total, policy = %self.policy, "detection run started");
        progress.on_event(ProgressEvent::RunStarted { total });

        let mut detections = BTreeMap::new();
        let mut results = Vec::new();
        let mut completed_items: Vec<String> = Vec::new();
        let mut processed = 0;
        let mut failed = 0;
        let mut index = 0;

        'batches: for (batch_idx, batch) in pending.chunks(self.batch_size).enumerate() {
            let batch_id = format!("run{}-batch{}", run_id, batch_idx + 1);

            for id in batch {
                if token.is_cancelled() {
                    debug!(run_id, "cancel observed at item boundary");
                    break 'batches;
                }

                let Some(file) = queue.get(id).map(|item| item.file().clone()) else {
                    continue;
                };

                queue.update_status(id, ItemUpdate::StartProcessing)?;
                progress.on_event(ProgressEvent::Started {
                    file_name: file.file_name.clone(),
                    index,
                    total,
                });
                index += 1;

                match self.detect_one(&file, token).await {
                    Ok(mut result) => {
                        for (n, card) in result.cards.iter_mut().enumerate() {
                            card.id = format!("{}-card-{}", id, n);
                            detections.insert(card.id.clone(), card.clone());
                        }
                        let cards = result.cards.len();
                        debug!(file = %file.file_name, cards, "detected");

                        results.push(result.clone());
                        write_back(queue, id, ItemUpdate::Complete(result));
                        completed_items.push(id.clone());
                        processed += 1;
                        progress.on_event(ProgressEvent::Completed {
                            file_name: file.file_name.clone(),
                            cards,
                        });
                    }
                    Err(err) => {
                        failed += 1;
                        let reason = err.to_string();
                        write_back(queue, id, ItemUpdate::Fail(reason.clone()));
                        progress.on_event(ProgressEvent::Failed {
                            file_name: file.file_name.clone(),
                            reason: reason.clone(),
                        });

                        match self.policy {
                            FailurePolicy::FailFast => {
                                warn!(run_id, file = %file.file_name, %reason, "run failed");
                                // この実行で完了したアイテムは待機へ戻し、次の実行で再検出する
                                for done in &completed_items {
                                    write_back(queue, done, ItemUpdate::Requeue);
                                }
                                tracker.fail();
                                progress.on_event(ProgressEvent::Finished {
                                    processed,
                                    failed,
                                    cancelled: false,
                                });
                                return Err(err);
                            }
                            FailurePolicy::ContinueOnError => {
                                warn!(run_id, file = %file.file_name, %reason, "item failed, continuing");
                            }
                        }
                    }
                }
            }

            if tracker.mark_batch_completed(&batch_id) {
                progress.on_event(ProgressEvent::BatchCompleted {
                    batch_id,
                    items: batch.len(),
                });
            }
        }

        // 最後のアイテムの検出中にキャンセルされても、待機が残っていなければ完了
        let outcome = if token.is_cancelled() && queue.has_pending() {
            // トークンだけが直接キャンセルされた場合もトラッカーを揃える
            tracker.cancel();
            RunOutcome::Cancelled
        } else {
            tracker.complete();
            RunOutcome::Completed
        };

        progress.on_event(ProgressEvent::Finished {
            processed,
            failed,
            cancelled: outcome == RunOutcome::Cancelled,
        });
        info!(run_id, processed, failed, detected = detections.len(), ?outcome, "detection run finished");

        Ok(RunReport {
            run_id,
            outcome,
            processed,
            failed,
            detections,
            results,
            completed_items,
        })
    }

    async fn detect_one(&self, file: &SourceFile, token: &CancelToken) -> Result<DetectionResult> {
        let detection = self.detector.detect(file, token);

        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, detection).await.map_err(|_| {
                CardIntakeError::DetectionTimeout {
                    file: file.file_name.clone(),
                    seconds: limit.as_secs(),
                }
            })?,
            None => detection.await,
        };

        outcome.map_err(|e| CardIntakeError::DetectionFailed {
            file: file.file_name.clone(),
            reason: e.to_string(),
        })
    }
}

/// 実行中に削除されたアイテムへの書き戻しは捨てる
fn write_back(queue: &mut QueueStore, id: &str, update: ItemUpdate) {
    if let Err(e) = queue.update_status(id, update) {
        debug!(id, error = %e, "write-back skipped");
    }
}
