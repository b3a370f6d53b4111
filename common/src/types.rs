//! 検出結果の型定義
//!
//! CLIとライブラリ利用側で共有される型:
//! - Bounds: 元画像座標系の矩形
//! - DetectedCard: 1枚分の検出カード候補
//! - DetectionResult: 1画像分の検出結果

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// 元画像のピクセル座標系での矩形
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// 幅/高さ。高さ0の場合は0を返す
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0.0 {
            0.0
        } else {
            self.width / self.height
        }
    }

    /// 編集時の入力検証
    pub fn validate(&self) -> Result<()> {
        let values = [self.x, self.y, self.width, self.height];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidBounds("non-finite coordinate".into()));
        }
        if self.x < 0.0 || self.y < 0.0 {
            return Err(Error::InvalidBounds(format!(
                "origin must be non-negative: ({}, {})",
                self.x, self.y
            )));
        }
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(Error::InvalidBounds(format!(
                "size must be positive: {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

/// 検出されたカード候補
///
/// 選択状態はここには持たない（レビュー側の選択集合で管理）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedCard {
    /// 元画像ごとに一意なID（`<item-id>-card-<n>`）
    pub id: String,
    pub bounds: Bounds,
    /// 0.0〜1.0の検出スコア
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<f64>,
}

/// 1画像分の検出結果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    /// 元画像のファイルパス
    pub image: String,

    #[serde(default)]
    pub image_width: u32,

    #[serde(default)]
    pub image_height: u32,

    #[serde(default)]
    pub cards: Vec<DetectedCard>,
}

impl DetectionResult {
    pub fn total_detected(&self) -> usize {
        self.cards.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_aspect_ratio() {
        let b = Bounds::new(0.0, 0.0, 250.0, 350.0);
        assert!((b.aspect_ratio() - 2.5 / 3.5).abs() < 1e-9);
        assert_eq!(Bounds::new(0.0, 0.0, 10.0, 0.0).aspect_ratio(), 0.0);
    }

    #[test]
    fn test_bounds_validate() {
        assert!(Bounds::new(10.0, 20.0, 100.0, 140.0).validate().is_ok());
        assert!(Bounds::new(-1.0, 0.0, 100.0, 140.0).validate().is_err());
        assert!(Bounds::new(0.0, 0.0, 0.0, 140.0).validate().is_err());
        assert!(Bounds::new(0.0, 0.0, f64::NAN, 140.0).validate().is_err());
    }

    #[test]
    fn test_detected_card_serialize() {
        let card = DetectedCard {
            id: "item-card-0".to_string(),
            bounds: Bounds::new(1.0, 2.0, 3.0, 4.0),
            confidence: 0.9,
            aspect_ratio: None,
        };

        let json = serde_json::to_string(&card).expect("シリアライズ失敗");
        assert!(json.contains("\"id\":\"item-card-0\""));
        assert!(json.contains("\"confidence\":0.9"));
        assert!(!json.contains("aspectRatio"));
    }

    #[test]
    fn test_detection_result_deserialize_missing_fields() {
        let json = r#"{"image": "scan.jpg"}"#;

        let result: DetectionResult = serde_json::from_str(json).expect("デシリアライズ失敗");
        assert_eq!(result.image, "scan.jpg");
        assert_eq!(result.image_width, 0);
        assert!(result.cards.is_empty());
        assert_eq!(result.total_detected(), 0);
    }
}
