//! ユーザー向け通知
//!
//! 成功・警告・エラーをトースト的に投げっぱなしで通知する。
//! 正しさには関与しない。

use std::sync::Mutex;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// 通知ヘルパー（`dyn Notifier` 用）
pub fn send(notifier: &dyn Notifier, level: NotificationLevel, message: impl Into<String>) {
    notifier.notify(Notification {
        level,
        message: message.into(),
    });
}

/// 端末表示 + tracingログ
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        let message = &notification.message;
        match notification.level {
            NotificationLevel::Success => {
                info!(target: "notify", "{}", message);
                println!("✔ {}", message);
            }
            NotificationLevel::Info => {
                info!(target: "notify", "{}", message);
                println!("- {}", message);
            }
            NotificationLevel::Warning => {
                warn!(target: "notify", "{}", message);
                eprintln!("⚠ {}", message);
            }
            NotificationLevel::Error => {
                error!(target: "notify", "{}", message);
                eprintln!("✘ {}", message);
            }
        }
    }
}

/// 通知を記録するだけの実装
#[derive(Default)]
pub struct RecordingNotifier {
    entries: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Notification> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    pub fn levels(&self) -> Vec<NotificationLevel> {
        self.entries().into_iter().map(|n| n.level).collect()
    }

    pub fn count(&self, level: NotificationLevel) -> usize {
        self.entries().iter().filter(|n| n.level == level).count()
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(notification);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_notifier() {
        let notifier = RecordingNotifier::new();
        send(&notifier, NotificationLevel::Warning, "1件スキップ");
        send(&notifier, NotificationLevel::Success, "完了");

        let entries = notifier.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].level, NotificationLevel::Warning);
        assert_eq!(entries[0].message, "1件スキップ");
        assert_eq!(notifier.count(NotificationLevel::Success), 1);

        notifier.clear();
        assert!(notifier.entries().is_empty());
    }
}
