//! 构建配置（JSON 可加载）

use crate::core::capture::{Frame, DEFAULT_SIMILARITY_THRESHOLD};
use crate::core::capture::end_detector::DEFAULT_MAX_FRAMES;
use crate::core::document::page::{
    DocumentMetadata, DEFAULT_AUTHOR, DEFAULT_CREATOR, DEFAULT_SUBJECT, DEFAULT_TITLE,
};
use crate::core::document::codec::DEFAULT_JPEG_QUALITY;
use crate::core::layer::DEFAULT_DPI;
use crate::core::ocr::DEFAULT_MIN_CONFIDENCE;
use chrono::Local;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const MAX_TITLE_CHARS: usize = 40;
const FALLBACK_TITLE: &str = "page";

static UNSAFE_TITLE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s-]").expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BuildMode {
    /// 每帧一页
    #[default]
    PerFrame,
    /// 拼成一张长页
    Seamless,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RasterEncoding {
    Jpeg { quality: u8 },
    Lossless,
}

impl Default for RasterEncoding {
    fn default() -> Self {
        Self::Jpeg {
            quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StitchConfig {
    pub crop_top: u32,
    pub crop_bottom: u32,
    pub background: [u8; 3],
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            crop_top: 0,
            crop_bottom: 0,
            background: [255, 255, 255],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub enabled: bool,
    pub min_confidence: f32,
    pub language: String,
    pub tesseract_path: Option<PathBuf>,
    pub page_segmentation_mode: u8,
    pub timeout_secs: u64,
    pub jobs: usize,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            language: "eng".to_string(),
            tesseract_path: None,
            page_segmentation_mode: 3,
            timeout_secs: 60,
            jobs: num_cpus::get().min(4),
        }
    }
}

impl OcrConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub dpi: f32,
    /// 内嵌位图的上限分辨率；页面尺寸仍按 `dpi`
    pub raster_dpi: Option<f32>,
    pub encoding: RasterEncoding,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            raster_dpi: None,
            encoding: RasterEncoding::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub title: Option<String>,
    pub author: String,
    pub subject: Option<String>,
    pub creator: String,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            title: None,
            author: DEFAULT_AUTHOR.to_string(),
            subject: Some(DEFAULT_SUBJECT.to_string()),
            creator: DEFAULT_CREATOR.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub mode: BuildMode,
    pub stitch: StitchConfig,
    pub similarity_threshold: f32,
    pub suppress_duplicates: bool,
    /// 采集循环的帧数上限
    pub max_frames: usize,
    pub ocr: OcrConfig,
    pub layout: LayoutConfig,
    pub metadata: MetadataConfig,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            mode: BuildMode::default(),
            stitch: StitchConfig::default(),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            suppress_duplicates: false,
            max_frames: DEFAULT_MAX_FRAMES,
            ocr: OcrConfig::default(),
            layout: LayoutConfig::default(),
            metadata: MetadataConfig::default(),
        }
    }
}

impl BuildConfig {
    /// 拼接模式预设
    pub fn seamless(crop_top: u32, crop_bottom: u32) -> Self {
        Self {
            mode: BuildMode::Seamless,
            stitch: StitchConfig {
                crop_top,
                crop_bottom,
                ..StitchConfig::default()
            },
            ..Self::default()
        }
    }

    /// 只输出位图，不做 OCR
    pub fn raster_only() -> Self {
        Self {
            ocr: OcrConfig {
                enabled: false,
                ..OcrConfig::default()
            },
            ..Self::default()
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return invalid(format!(
                "similarity_threshold must be within [0, 1], got {}",
                self.similarity_threshold
            ));
        }
        if !self.layout.dpi.is_finite() || self.layout.dpi <= 0.0 {
            return invalid(format!("layout.dpi must be positive, got {}", self.layout.dpi));
        }
        if let Some(raster_dpi) = self.layout.raster_dpi {
            if !raster_dpi.is_finite() || raster_dpi <= 0.0 {
                return invalid(format!("layout.raster_dpi must be positive, got {}", raster_dpi));
            }
        }
        if let RasterEncoding::Jpeg { quality } = self.layout.encoding {
            if !(1..=100).contains(&quality) {
                return invalid(format!("JPEG quality must be within 1..=100, got {}", quality));
            }
        }
        if !(0.0..=100.0).contains(&self.ocr.min_confidence) {
            return invalid(format!(
                "ocr.min_confidence must be within [0, 100], got {}",
                self.ocr.min_confidence
            ));
        }
        if self.ocr.jobs == 0 {
            return invalid("ocr.jobs must be at least 1".to_string());
        }
        if self.ocr.language.trim().is_empty() {
            return invalid("ocr.language must not be empty".to_string());
        }
        if self.max_frames == 0 {
            return invalid("max_frames must be at least 1".to_string());
        }
        Ok(())
    }

    /// 标题优先级：配置 > 首个带标题的帧 > 默认
    pub fn resolve_metadata(&self, frames: &[Frame]) -> DocumentMetadata {
        let title = self
            .metadata
            .title
            .clone()
            .or_else(|| {
                frames
                    .iter()
                    .filter_map(|f| f.title.as_deref())
                    .map(str::trim)
                    .find(|t| !t.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());

        DocumentMetadata {
            title,
            author: self.metadata.author.clone(),
            subject: self.metadata.subject.clone(),
            creator: self.metadata.creator.clone(),
            created_at: Local::now(),
        }
    }
}

/// 文件名安全的标题
pub fn sanitize_title(title: &str) -> String {
    let stripped = UNSAFE_TITLE_CHARS.replace_all(title, "");
    let collapsed = WHITESPACE.replace_all(stripped.trim(), "_");
    let capped: String = collapsed.chars().take(MAX_TITLE_CHARS).collect();
    if capped.is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        capped
    }
}

/// `<dir>/<prefix>_<YYYYmmdd_HHMMSS>.pdf`
pub fn default_output_path<P: AsRef<Path>>(dir: P, prefix: &str) -> PathBuf {
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    dir.as_ref()
        .join(format!("{}_{}.pdf", sanitize_title(prefix), stamp))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BuildConfig::default();
        assert_eq!(config.mode, BuildMode::PerFrame);
        assert_eq!(config.similarity_threshold, 0.98);
        assert_eq!(config.layout.dpi, 96.0);
        assert_eq!(config.layout.encoding, RasterEncoding::Jpeg { quality: 95 });
        assert!(config.ocr.enabled);
        assert!(config.ocr.jobs >= 1 && config.ocr.jobs <= 4);
        assert_eq!(config.max_frames, 50);
        assert_eq!(config.metadata.creator, "E-book Chapter Scraper");
        assert_eq!(config.metadata.subject.as_deref(), Some("Scraped e-book chapter"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets() {
        let seamless = BuildConfig::seamless(100, 120);
        assert_eq!(seamless.mode, BuildMode::Seamless);
        assert_eq!((seamless.stitch.crop_top, seamless.stitch.crop_bottom), (100, 120));
        assert!(!BuildConfig::raster_only().ocr.enabled);
    }

    #[test]
    fn test_from_json_partial() {
        let config = BuildConfig::from_json(
            r#"{
                "mode": "seamless",
                "stitch": { "crop_top": 80 },
                "layout": { "encoding": { "type": "lossless" } },
                "ocr": { "language": "chi_sim" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.mode, BuildMode::Seamless);
        assert_eq!(config.stitch.crop_top, 80);
        assert_eq!(config.stitch.crop_bottom, 0);
        assert_eq!(config.layout.encoding, RasterEncoding::Lossless);
        assert_eq!(config.ocr.language, "chi_sim");
        assert_eq!(config.ocr.min_confidence, 30.0);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            BuildConfig::from_json(r#"{ "similarity_threshold": 1.5 }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            BuildConfig::from_json(r#"{ "layout": { "dpi": 0 } }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            BuildConfig::from_json(r#"{ "mode": "sideways" }"#),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = BuildConfig::seamless(10, 20);
        fs::write(&path, config.to_json().unwrap()).unwrap();

        assert_eq!(BuildConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_title_resolution() {
        let frames = vec![
            Frame::new(1, 1, vec![0; 4], 0),
            Frame::new(1, 1, vec![0; 4], 1).with_source("  Chapter 1 ", None),
        ];
        let config = BuildConfig::default();
        assert_eq!(config.resolve_metadata(&frames).title, "Chapter 1");
        assert_eq!(config.resolve_metadata(&frames[..1]).title, DEFAULT_TITLE);

        let mut titled = BuildConfig::default();
        titled.metadata.title = Some("Given".to_string());
        assert_eq!(titled.resolve_metadata(&frames).title, "Given");
    }

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("My Book: Part 1/2"), "My_Book_Part_12");
        assert_eq!(sanitize_title("!!!"), "page");
        assert_eq!(sanitize_title(&"a".repeat(60)).len(), 40);
        assert_eq!(sanitize_title("re-read  me"), "re-read_me");
    }

    #[test]
    fn test_default_output_path() {
        let path = default_output_path("/tmp/out", "ebook_capture");
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("ebook_capture_"));
        assert!(name.ends_with(".pdf"));
        // ebook_capture_ + YYYYmmdd_HHMMSS + .pdf
        assert_eq!(name.len(), "ebook_capture_".len() + 15 + 4);
        assert_eq!(path.parent().unwrap(), Path::new("/tmp/out"));
    }
}
