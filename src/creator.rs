//! カード作成サービス
//!
//! レビューで確定したカードを受け取り、永続化する。

use crate::error::{CardIntakeError, Result};
use async_trait::async_trait;
use card_intake_common::{Bounds, DetectedCard};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

pub type CardId = String;

#[async_trait]
pub trait CardCreator: Send + Sync {
    async fn create(&self, cards: Vec<DetectedCard>) -> Result<Vec<CardId>>;
}

/// ライブラリに保存されるカード
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedCard {
    pub id: CardId,
    /// 元になった検出カードのID
    pub source_card: String,
    pub bounds: Bounds,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

/// JSONファイルに追記するカードライブラリ
pub struct JsonCardLibrary {
    path: PathBuf,
}

impl JsonCardLibrary {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Vec<CreatedCard>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn store(&self, cards: &[CreatedCard]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(cards)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

#[async_trait]
impl CardCreator for JsonCardLibrary {
    async fn create(&self, cards: Vec<DetectedCard>) -> Result<Vec<CardId>> {
        if cards.is_empty() {
            return Ok(Vec::new());
        }

        let mut library = self
            .load()
            .map_err(|e| CardIntakeError::CreationFailed(format!("ライブラリ読み込み: {}", e)))?;

        let now = Utc::now();
        let created: Vec<CreatedCard> = cards
            .into_iter()
            .map(|card| CreatedCard {
                id: uuid::Uuid::new_v4().to_string(),
                source_card: card.id,
                bounds: card.bounds,
                confidence: card.confidence,
                created_at: now,
            })
            .collect();
        let ids = created.iter().map(|c| c.id.clone()).collect();

        library.extend(created);
        self.store(&library)
            .map_err(|e| CardIntakeError::CreationFailed(format!("ライブラリ書き込み: {}", e)))?;

        info!(path = %self.path.display(), total = library.len(), "cards stored");
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn card(id: &str) -> DetectedCard {
        DetectedCard {
            id: id.to_string(),
            bounds: Bounds::new(0.0, 0.0, 250.0, 350.0),
            confidence: 0.95,
            aspect_ratio: None,
        }
    }

    #[tokio::test]
    async fn test_create_appends_to_library() {
        let dir = tempdir().unwrap();
        let library = JsonCardLibrary::new(dir.path().join("lib").join("cards.json"));

        let first = library.create(vec![card("a-card-0")]).await.unwrap();
        let second = library.create(vec![card("b-card-0"), card("b-card-1")]).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 2);

        let stored = library.load().unwrap();
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[0].source_card, "a-card-0");
        assert_eq!(stored[2].source_card, "b-card-1");
    }

    #[tokio::test]
    async fn test_create_empty_does_not_touch_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cards.json");
        let library = JsonCardLibrary::new(&path);

        let ids = library.create(vec![]).await.unwrap();
        assert!(ids.is_empty());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_corrupt_library_is_creation_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cards.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = JsonCardLibrary::new(&path).create(vec![card("x")]).await.unwrap_err();
        assert!(matches!(err, CardIntakeError::CreationFailed(_)));
    }
}
