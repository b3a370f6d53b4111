use crate::detector::FailurePolicy;
use crate::error::{CardIntakeError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const LIBRARY_ENV: &str = "CARD_INTAKE_LIBRARY";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 進捗表示で1バッチとして扱う件数
    pub batch_size: usize,
    pub failure_policy: FailurePolicy,
    /// 検出1回あたりのタイムアウト（0で無効）
    pub timeout_seconds: u64,
    /// 作成済みカードを保存するJSONファイル
    pub library_path: Option<PathBuf>,
    pub use_cache: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            batch_size: 5,
            failure_policy: FailurePolicy::FailFast,
            timeout_seconds: 120,
            library_path: None,
            use_cache: true,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &std::path::Path) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, config_path: &std::path::Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| CardIntakeError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("card-intake").join("config.json"))
    }

    /// カードライブラリのパス
    ///
    /// 環境変数 > 設定ファイル > `~/.local/share/card-intake/cards.json`
    pub fn library_path(&self) -> Result<PathBuf> {
        if let Ok(path) = std::env::var(LIBRARY_ENV) {
            if !path.trim().is_empty() {
                return Ok(PathBuf::from(path));
            }
        }

        if let Some(path) = &self.library_path {
            return Ok(path.clone());
        }

        let data_dir = dirs::data_dir()
            .ok_or_else(|| CardIntakeError::Config("データディレクトリが見つかりません".into()))?;
        Ok(data_dir.join("card-intake").join("cards.json"))
    }

    pub fn detect_timeout(&self) -> Option<std::time::Duration> {
        (self.timeout_seconds > 0).then(|| std::time::Duration::from_secs(self.timeout_seconds))
    }
}
