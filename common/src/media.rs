//! 拡張子からのメディアタイプ判定
//!
//! ブラウザの `File.type` 相当の文字列を返す。画像判定は `image/` 接頭辞で行う。

use std::path::Path;

const MIME_TABLE: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("bmp", "image/bmp"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("txt", "text/plain"),
    ("json", "application/json"),
    ("pdf", "application/pdf"),
];

/// ファイル名（パス）からMIMEタイプを推定
pub fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    MIME_TABLE
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| *mime)
        .unwrap_or("application/octet-stream")
}

pub fn is_image_mime(mime: &str) -> bool {
    mime.starts_with("image/")
}
