//! 進捗表示
//!
//! 検出ループから `ProgressEvent` を受け取り、端末に進捗バーを描く。

use indicatif::{ProgressBar, ProgressStyle};

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// 実行開始
    RunStarted { total: usize },
    /// 1件の検出を開始
    Started { file_name: String, index: usize, total: usize },
    /// 1件の検出が完了
    Completed { file_name: String, cards: usize },
    /// 1件の検出が失敗
    Failed { file_name: String, reason: String },
    /// バッチ単位の完了（同じバッチで2回は来ない）
    BatchCompleted { batch_id: String, items: usize },
    /// 実行終了
    Finished { processed: usize, failed: usize, cancelled: bool },
}

pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: ProgressEvent);
}

/// 何も表示しない
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_event(&self, _event: ProgressEvent) {}
}

/// indicatifによる進捗バー
pub struct ConsoleProgress {
    bar: ProgressBar,
    verbose: bool,
}

impl ConsoleProgress {
    pub fn new(verbose: bool) -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("  [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        Self { bar, verbose }
    }
}

impl ProgressSink for ConsoleProgress {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::RunStarted { total } => {
                self.bar.set_length(total as u64);
                self.bar.set_position(0);
            }
            ProgressEvent::Started { file_name, .. } => {
                self.bar.set_message(file_name);
            }
            ProgressEvent::Completed { file_name, cards } => {
                if self.verbose {
                    self.bar.println(format!("  ✔ {}: {}枚検出", file_name, cards));
                }
                self.bar.inc(1);
            }
            ProgressEvent::Failed { file_name, reason } => {
                self.bar.println(format!("  ✘ {}: {}", file_name, reason));
                self.bar.inc(1);
            }
            ProgressEvent::BatchCompleted { batch_id, items } => {
                if self.verbose {
                    self.bar.println(format!("  バッチ {} 完了 ({}件)", batch_id, items));
                }
            }
            ProgressEvent::Finished { cancelled, .. } => {
                if cancelled {
                    self.bar.abandon_with_message("キャンセル");
                } else {
                    self.bar.finish_with_message("完了");
                }
            }
        }
    }
}
