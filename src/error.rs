use thiserror::Error;

#[derive(Error, Debug)]
pub enum CardIntakeError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("フォルダが見つかりません: {0}")]
    FolderNotFound(String),

    #[error("画像が1枚も受け付けられませんでした（{rejected}件は画像以外）")]
    NoImagesAccepted { rejected: usize },

    #[error("処理待ちのファイルがありません")]
    EmptyQueue,

    #[error("キューに存在しないアイテム: {0}")]
    ItemNotFound(String),

    #[error("検出結果に存在しないカード: {0}")]
    CardNotFound(String),

    #[error("カード検出に失敗: {file}: {reason}")]
    DetectionFailed { file: String, reason: String },

    #[error("カード検出がタイムアウト ({seconds}秒): {file}")]
    DetectionTimeout { file: String, seconds: u64 },

    #[error("カード作成に失敗: {0}")]
    CreationFailed(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] card_intake_common::Error),
}

pub type Result<T> = std::result::Result<T, CardIntakeError>;
