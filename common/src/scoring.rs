//! アスペクト比による検出スコアリング
//!
//! トレーディングカードの縦横比（2.5in x 3.5in）との差でスコアを付け、
//! 閾値以下の候補を除外してスコア降順に並べる。

use crate::types::Bounds;

/// カードの目標アスペクト比（幅/高さ）
pub const TARGET_ASPECT_RATIO: f64 = 2.5 / 3.5;

/// スコアの下限
pub const CONFIDENCE_FLOOR: f64 = 0.3;

/// この値以下の候補は除外
pub const CONFIDENCE_THRESHOLD: f64 = 0.4;

/// `max(0.3, 1 - 2 * |r - t|)` を1.0で頭打ちにしたもの
pub fn aspect_confidence(aspect_ratio: f64) -> f64 {
    let deviation = (aspect_ratio - TARGET_ASPECT_RATIO).abs();
    (1.0 - 2.0 * deviation).max(CONFIDENCE_FLOOR).min(1.0)
}

/// 候補矩形をスコアリングし、閾値超えのものをスコア降順で返す
///
/// 同点の場合は入力順を保つ。
pub fn rank_candidates(candidates: &[Bounds]) -> Vec<(Bounds, f64)> {
    let mut scored: Vec<(Bounds, f64)> = candidates
        .iter()
        .map(|b| (*b, aspect_confidence(b.aspect_ratio())))
        .filter(|(_, confidence)| *confidence > CONFIDENCE_THRESHOLD)
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored
}
