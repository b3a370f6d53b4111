//! レビュー・選択ステージ
//!
//! 検出されたカード候補のうち、どれを実際のカードにするかを選ぶ。
//! 選択状態はカード自体ではなく別の集合で持つ。

mod interactive;

pub use interactive::{
    card_labels, collect_detections, parse_bounds, parse_edit, run_interactive_review,
};

use crate::creator::{CardCreator, CardId};
use crate::error::{CardIntakeError, Result};
use card_intake_common::{Bounds, DetectedCard};
use std::collections::{BTreeMap, HashSet};
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct ReviewStage {
    detections: BTreeMap<String, DetectedCard>,
    selection: HashSet<String>,
    open: bool,
}

impl ReviewStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 検出結果を読み込み、全件を選択状態で開く
    pub fn open(&mut self, detections: BTreeMap<String, DetectedCard>) {
        self.selection = detections.keys().cloned().collect();
        self.detections = detections;
        self.open = true;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// 選択を反転する。未知のIDは無視
    pub fn toggle(&mut self, card_id: &str) {
        if !self.detections.contains_key(card_id) {
            return;
        }
        if !self.selection.remove(card_id) {
            self.selection.insert(card_id.to_string());
        }
    }

    /// 選択集合をそのまま置き換える
    pub fn set_selection<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selection = ids.into_iter().map(Into::into).collect();
    }

    pub fn is_selected(&self, card_id: &str) -> bool {
        self.selection.contains(card_id)
    }

    /// 矩形のみ更新（IDとスコアは変えない）
    pub fn edit(&mut self, card_id: &str, bounds: Bounds) -> Result<()> {
        bounds.validate()?;
        let card = self
            .detections
            .get_mut(card_id)
            .ok_or_else(|| CardIntakeError::CardNotFound(card_id.to_string()))?;
        card.bounds = bounds;
        Ok(())
    }

    pub fn detections(&self) -> &BTreeMap<String, DetectedCard> {
        &self.detections
    }

    pub fn get(&self, card_id: &str) -> Option<&DetectedCard> {
        self.detections.get(card_id)
    }

    pub fn selected_cards(&self) -> Vec<DetectedCard> {
        self.detections
            .values()
            .filter(|card| self.selection.contains(&card.id))
            .cloned()
            .collect()
    }

    pub fn selected_count(&self) -> usize {
        self.selected_cards().len()
    }

    /// 選択カードを作成サービスへ渡す
    ///
    /// 作成を待つ前に検出結果と選択を消去する。作成に失敗しても
    /// 状態は戻らない。
    pub async fn confirm_selected(&mut self, creator: &dyn CardCreator) -> Result<Vec<CardId>> {
        let cards = self.selected_cards();
        let requested = cards.len();
        self.clear();

        match creator.create(cards).await {
            Ok(ids) => {
                info!(requested, created = ids.len(), "selection confirmed");
                Ok(ids)
            }
            Err(e) => {
                warn!(requested, error = %e, "card creation failed after selection was cleared");
                Err(e)
            }
        }
    }

    /// 何も作成せずに破棄
    pub fn start_over(&mut self) {
        self.clear();
    }

    fn clear(&mut self) {
        self.detections.clear();
        self.selection.clear();
        self.open = false;
    }
}
