//! 簡易カード検出
//!
//! 画像サイズから固定の候補矩形を作り、アスペクト比だけでスコアを付ける。
//! 実際の画像解析は行わない。

use super::{CardDetector, DetectError};
use crate::processing::CancelToken;
use crate::scanner::SourceFile;
use async_trait::async_trait;
use card_intake_common::{rank_candidates, Bounds, DetectedCard, DetectionResult, TARGET_ASPECT_RATIO};

pub struct SimpleDetector;

#[async_trait]
impl CardDetector for SimpleDetector {
    async fn detect(
        &self,
        file: &SourceFile,
        _cancel: &CancelToken,
    ) -> Result<DetectionResult, DetectError> {
        let path = file.path.clone();
        let (width, height) = tokio::task::spawn_blocking(move || image::image_dimensions(&path))
            .await
            .map_err(|e| DetectError::Failed(e.to_string()))?
            .map_err(|e| DetectError::Unreadable(format!("{}: {}", file.file_name, e)))?;

        Ok(detect_in_dimensions(&file.path.display().to_string(), width, height))
    }
}

/// 候補矩形
///
/// 中央のカード型領域、全体、左半分、右半分の4つ。
pub fn candidate_regions(width: u32, height: u32) -> Vec<Bounds> {
    let (w, h) = (width as f64, height as f64);
    if w <= 0.0 || h <= 0.0 {
        return Vec::new();
    }

    let mut card_h = h * 0.8;
    let mut card_w = card_h * TARGET_ASPECT_RATIO;
    if card_w > w * 0.9 {
        card_w = w * 0.9;
        card_h = card_w / TARGET_ASPECT_RATIO;
    }

    vec![
        Bounds::new((w - card_w) / 2.0, (h - card_h) / 2.0, card_w, card_h),
        Bounds::new(0.0, 0.0, w, h),
        Bounds::new(0.0, 0.0, w / 2.0, h),
        Bounds::new(w / 2.0, 0.0, w / 2.0, h),
    ]
}

pub fn detect_in_dimensions(image: &str, width: u32, height: u32) -> DetectionResult {
    let cards = rank_candidates(&candidate_regions(width, height))
        .into_iter()
        .enumerate()
        .map(|(n, (bounds, confidence))| DetectedCard {
            id: format!("card-{}", n),
            bounds,
            confidence,
            aspect_ratio: Some(bounds.aspect_ratio()),
        })
        .collect();

    DetectionResult {
        image: image.to_string(),
        image_width: width,
        image_height: height,
        cards,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use card_intake_common::CONFIDENCE_THRESHOLD;

    #[test]
    fn test_portrait_single_card() {
        // カード1枚を縦に撮った写真
        let result = detect_in_dimensions("single.jpg", 714, 1000);

        // 中央領域と全体が残り、左右半分は除外
        assert_eq!(result.cards.len(), 2);
        assert!(result.cards.iter().all(|c| c.confidence > CONFIDENCE_THRESHOLD));
        assert!(result.cards[0].confidence >= result.cards[1].confidence);
    }

    #[test]
    fn test_landscape_two_cards() {
        // 2枚を横に並べたスキャン
        let result = detect_in_dimensions("pair.png", 1428, 1000);

        let halves: Vec<_> = result
            .cards
            .iter()
            .filter(|c| c.bounds.height == 1000.0 && c.bounds.width == 714.0)
            .collect();
        assert_eq!(halves.len(), 2);
        assert!(result.cards.iter().all(|c| c.bounds.width != 1428.0));
    }

    #[test]
    fn test_wide_panorama_falls_back_to_center() {
        let result = detect_in_dimensions("wide.jpg", 4000, 500);
        assert_eq!(result.cards.len(), 1);
        let card = &result.cards[0];
        assert!(card.bounds.x > 0.0);
        assert!((card.aspect_ratio.unwrap() - TARGET_ASPECT_RATIO).abs() < 1e-9);
    }

    #[test]
    fn test_candidate_regions_stay_inside_image() {
        for (w, h) in [(100, 1000), (1000, 100), (714, 1000)] {
            for b in candidate_regions(w, h) {
                assert!(b.x >= 0.0 && b.y >= 0.0);
                assert!(b.x + b.width <= w as f64 + 1e-9);
                assert!(b.y + b.height <= h as f64 + 1e-9);
            }
        }
    }

    #[test]
    fn test_zero_size_image() {
        assert!(candidate_regions(0, 100).is_empty());
        assert!(detect_in_dimensions("empty.png", 0, 0).cards.is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_image_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not an image").unwrap();

        let file = SourceFile::from_path(&path).unwrap();
        let result = SimpleDetector.detect(&file, &CancelToken::new()).await;
        assert!(matches!(result, Err(DetectError::Unreadable(_))));
    }

    #[tokio::test]
    async fn test_detect_real_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("card.png");
        image::RgbImage::new(50, 70).save(&path).unwrap();

        let file = SourceFile::from_path(&path).unwrap();
        let result = SimpleDetector.detect(&file, &CancelToken::new()).await.unwrap();
        assert_eq!(result.image_width, 50);
        assert_eq!(result.image_height, 70);
        assert!(!result.cards.is_empty());
    }
}
