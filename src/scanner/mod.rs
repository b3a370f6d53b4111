use crate::error::{CardIntakeError, Result};
use card_intake_common::mime_type_for;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 投入されるファイル1件
///
/// 画像かどうかの判定はキュー側で `mime_type` を見て行う。
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub file_name: String,
    pub mime_type: String,
    pub size: u64,
}

impl SourceFile {
    pub fn from_path(path: &Path) -> Result<Self> {
        let meta = std::fs::metadata(path)
            .map_err(|_| CardIntakeError::FileNotFound(path.display().to_string()))?;
        Ok(Self::with_size(path, meta.len()))
    }

    /// ディスクに触れずに生成（メタデータが既にある場合やテスト用）
    pub fn with_size(path: &Path, size: u64) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        Self {
            path: path.to_path_buf(),
            file_name,
            mime_type: mime_type_for(path).to_string(),
            size,
        }
    }

    pub fn is_image(&self) -> bool {
        card_intake_common::is_image_mime(&self.mime_type)
    }
}

/// フォルダ内の通常ファイルをすべて列挙（画像以外も含む）
pub fn scan_folder(folder: &Path, recursive: bool) -> Result<Vec<SourceFile>> {
    if !folder.is_dir() {
        return Err(CardIntakeError::FolderNotFound(folder.display().to_string()));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }

        // キャッシュ等の隠しファイルは対象外
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }

        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        files.push(SourceFile::with_size(path, size));
    }

    // ファイル名でソート
    files.sort_by(|a, b| a.file_name.cmp(&b.file_name).then_with(|| a.path.cmp(&b.path)));

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_scan_folder_not_found() {
        let result = scan_folder(Path::new("/nonexistent/folder"), false);
        assert!(matches!(result, Err(CardIntakeError::FolderNotFound(_))));
    }

    #[test]
    fn test_scan_folder_includes_non_images() {
        let dir = tempdir().unwrap();

        File::create(dir.path().join("card1.jpg")).unwrap().write_all(b"dummy").unwrap();
        File::create(dir.path().join("card2.PNG")).unwrap().write_all(b"dummy").unwrap();
        File::create(dir.path().join("readme.txt")).unwrap().write_all(b"text").unwrap();
        File::create(dir.path().join(".detect-cache.json")).unwrap();

        let result = scan_folder(dir.path(), false).unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result[0].file_name, "card1.jpg");
        assert_eq!(result[0].mime_type, "image/jpeg");
        assert_eq!(result[0].size, 5);
        assert_eq!(result[1].mime_type, "image/png");
        assert_eq!(result[2].file_name, "readme.txt");
        assert!(!result[2].is_image());
    }

    #[test]
    fn test_scan_folder_recursive() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("binder");
        fs::create_dir_all(&sub).unwrap();

        File::create(dir.path().join("a.jpg")).unwrap();
        File::create(sub.join("b.jpg")).unwrap();

        assert_eq!(scan_folder(dir.path(), false).unwrap().len(), 1);
        assert_eq!(scan_folder(dir.path(), true).unwrap().len(), 2);
    }

    #[test]
    fn test_source_file_from_missing_path() {
        let result = SourceFile::from_path(Path::new("/nonexistent/card.jpg"));
        assert!(matches!(result, Err(CardIntakeError::FileNotFound(_))));
    }
}
