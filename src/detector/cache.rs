//! 検出結果キャッシュモジュール
//!
//! 画像のSHA-256ハッシュをキーにして検出結果をキャッシュし、
//! 同じ画像の再検出をスキップする。

use super::{CardDetector, DetectError};
use crate::error::Result;
use crate::processing::CancelToken;
use crate::scanner::SourceFile;
use async_trait::async_trait;
use card_intake_common::DetectionResult;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::{debug, warn};

const CACHE_FILE_NAME: &str = ".detect-cache.json";

/// キャッシュファイルの構造
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheFile {
    /// バージョン（互換性チェック用）
    version: u32,
    /// ファイルハッシュ → 検出結果のマップ
    entries: HashMap<String, CacheEntry>,
}

/// キャッシュエントリ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub file_name: String,
    pub file_size: u64,
    pub result: DetectionResult,
}

impl CacheFile {
    const CURRENT_VERSION: u32 = 1;

    pub fn cache_path(folder: &Path) -> PathBuf {
        folder.join(CACHE_FILE_NAME)
    }

    /// キャッシュファイルを読み込み。壊れている場合は空から始める
    pub fn load(folder: &Path) -> Self {
        let cache_path = Self::cache_path(folder);
        if !cache_path.exists() {
            return Self::default();
        }

        let file = match File::open(&cache_path) {
            Ok(f) => f,
            Err(_) => return Self::default(),
        };

        let reader = BufReader::new(file);
        match serde_json::from_reader::<_, CacheFile>(reader) {
            Ok(cache) if cache.version == Self::CURRENT_VERSION => cache,
            Ok(_) => {
                warn!("キャッシュバージョン不一致、再生成します");
                Self::default()
            }
            Err(e) => {
                warn!(error = %e, "キャッシュを読み込めません、再生成します");
                Self::default()
            }
        }
    }

    pub fn save(&self, folder: &Path) -> Result<()> {
        let file = File::create(Self::cache_path(folder))?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// キャッシュファイルを削除。存在しなければ `false`
    pub fn clear(folder: &Path) -> Result<bool> {
        let cache_path = Self::cache_path(folder);
        if cache_path.exists() {
            std::fs::remove_file(cache_path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn get(&self, hash: &str) -> Option<&DetectionResult> {
        self.entries.get(hash).map(|e| &e.result)
    }

    pub fn insert(&mut self, hash: String, file_name: String, file_size: u64, result: DetectionResult) {
        self.entries.insert(hash, CacheEntry {
            file_name,
            file_size,
            result,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CacheFile {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            entries: HashMap::new(),
        }
    }
}

/// ファイル内容のSHA-256（16進）
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// キャッシュ付き検出器
///
/// ヒットした画像は内側の検出器を呼ばない。検出失敗はキャッシュしない。
pub struct CachedDetector<D> {
    inner: D,
    cache: Mutex<CacheFile>,
    hits: AtomicUsize,
}

impl<D: CardDetector> CachedDetector<D> {
    pub fn new(inner: D, cache: CacheFile) -> Self {
        Self {
            inner,
            cache: Mutex::new(cache),
            hits: AtomicUsize::new(0),
        }
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn save(&self, folder: &Path) -> Result<()> {
        match self.cache.lock() {
            Ok(cache) => cache.save(folder),
            Err(poisoned) => poisoned.into_inner().save(folder),
        }
    }

    fn lookup(&self, hash: &str) -> Option<DetectionResult> {
        self.cache.lock().ok()?.get(hash).cloned()
    }
}

#[async_trait]
impl<D: CardDetector> CardDetector for CachedDetector<D> {
    async fn detect(
        &self,
        file: &SourceFile,
        cancel: &CancelToken,
    ) -> std::result::Result<DetectionResult, DetectError> {
        // ハッシュ計算失敗時は未キャッシュとして扱う
        let path = file.path.clone();
        let hash = match tokio::task::spawn_blocking(move || compute_file_hash(&path)).await {
            Ok(Ok(h)) => Some(h),
            Ok(Err(e)) => {
                debug!(file = %file.file_name, error = %e, "hash failed");
                None
            }
            Err(e) => {
                debug!(file = %file.file_name, error = %e, "hash task failed");
                None
            }
        };

        if let Some(hash) = &hash {
            if let Some(mut cached) = self.lookup(hash) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(file = %file.file_name, "cache hit");
                cached.image = file.path.display().to_string();
                return Ok(cached);
            }
        }

        let result = self.inner.detect(file, cancel).await?;

        if let Some(hash) = hash {
            if let Ok(mut cache) = self.cache.lock() {
                cache.insert(hash, file.file_name.clone(), file.size, result.clone());
            }
        }

        Ok(result)
    }
}
