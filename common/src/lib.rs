//! Card Intake Common Library
//!
//! CLIとライブラリ利用側で共有される型と検出スコアリング

pub mod error;
pub mod media;
pub mod scoring;
pub mod types;

pub use error::{Error, Result};
pub use media::{is_image_mime, mime_type_for};
pub use scoring::{
    aspect_confidence, rank_candidates, CONFIDENCE_FLOOR, CONFIDENCE_THRESHOLD,
    TARGET_ASPECT_RATIO,
};
pub use types::{Bounds, DetectedCard, DetectionResult};
