//! 対話式レビュー
//!
//! 端末上で作成するカードを選び、必要なら矩形を修正する。

use super::ReviewStage;
use crate::error::{CardIntakeError, Result};
use card_intake_common::{Bounds, DetectedCard, DetectionResult};
use dialoguer::{Confirm, Input, MultiSelect, Select};
use std::collections::BTreeMap;

/// 画像単位の結果からカードID → カードのマップを作る
pub fn collect_detections(results: &[DetectionResult]) -> BTreeMap<String, DetectedCard> {
    results
        .iter()
        .flat_map(|r| r.cards.iter())
        .map(|card| (card.id.clone(), card.clone()))
        .collect()
}

/// "x,y,幅,高さ" を矩形に変換
pub fn parse_bounds(text: &str) -> Result<Bounds> {
    let values: Vec<f64> = text
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| CardIntakeError::Config(format!("矩形の数値が不正です: {} ({})", text, e)))?;

    match values.as_slice() {
        [x, y, w, h] => {
            let bounds = Bounds::new(*x, *y, *w, *h);
            bounds.validate()?;
            Ok(bounds)
        }
        _ => Err(CardIntakeError::Config(format!(
            "矩形は x,y,幅,高さ の4つで指定してください: {}",
            text
        ))),
    }
}

/// "ID=x,y,幅,高さ" を分解
pub fn parse_edit(text: &str) -> Result<(String, Bounds)> {
    let (id, bounds) = text
        .split_once('=')
        .ok_or_else(|| CardIntakeError::Config(format!("ID=x,y,幅,高さ の形式で指定してください: {}", text)))?;
    Ok((id.trim().to_string(), parse_bounds(bounds)?))
}

fn describe(card: &DetectedCard) -> String {
    format!(
        "{}  ({:.0},{:.0} {:.0}x{:.0})  信頼度 {:.2}",
        card.id, card.bounds.x, card.bounds.y, card.bounds.width, card.bounds.height, card.confidence
    )
}

/// 現在の検出結果と表示ラベル（カードID順）
pub fn card_labels(stage: &ReviewStage) -> (Vec<DetectedCard>, Vec<String>) {
    let cards: Vec<DetectedCard> = stage.detections().values().cloned().collect();
    let labels = cards.iter().map(describe).collect();
    (cards, labels)
}

fn prompt_error(e: dialoguer::Error) -> CardIntakeError {
    CardIntakeError::Io(std::io::Error::new(std::io::ErrorKind::Other, e))
}

/// 対話的に選択・修正し、作成に進むなら `true`
pub fn run_interactive_review(stage: &mut ReviewStage) -> Result<bool> {
    let (mut cards, mut labels) = card_labels(stage);
    if cards.is_empty() {
        println!("検出カードがありません");
        return Ok(false);
    }

    println!("🃏 検出カード: {}枚", cards.len());
    println!("操作: [Space]選択切替 [Enter]確定");
    println!("---\n");

    let defaults: Vec<bool> = cards.iter().map(|c| stage.is_selected(&c.id)).collect();

    let chosen = MultiSelect::new()
        .with_prompt("作成するカード")
        .items(&labels)
        .defaults(&defaults)
        .interact()
        .map_err(prompt_error)?;

    // 変化したものだけ切り替える
    for (i, card) in cards.iter().enumerate() {
        if chosen.contains(&i) != stage.is_selected(&card.id) {
            stage.toggle(&card.id);
        }
    }

    loop {
        let wants_edit = Confirm::new()
            .with_prompt("矩形を修正しますか？")
            .default(false)
            .interact()
            .map_err(prompt_error)?;
        if !wants_edit {
            break;
        }

        let index = Select::new()
            .with_prompt("修正するカード")
            .items(&labels)
            .default(0)
            .interact()
            .map_err(prompt_error)?;

        let card_id = cards[index].id.clone();
        let b = cards[index].bounds;
        let current = format!("{},{},{},{}", b.x, b.y, b.width, b.height);
        let text: String = Input::new()
            .with_prompt("x,y,幅,高さ")
            .with_initial_text(current)
            .interact_text()
            .map_err(prompt_error)?;

        match parse_bounds(&text).and_then(|b| stage.edit(&card_id, b)) {
            Ok(()) => {
                println!("✔ {} を修正しました", card_id);
                (cards, labels) = card_labels(stage);
            }
            Err(e) => println!("✘ {}", e),
        }
    }

    let count = stage.selected_count();
    Confirm::new()
        .with_prompt(format!("{}枚のカードを作成しますか？", count))
        .default(true)
        .interact()
        .map_err(prompt_error)
}
