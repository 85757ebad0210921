use crate::core::layer::{px_to_pt, TextRun};
use chrono::{DateTime, Local};
use image::RgbaImage;

pub const DEFAULT_TITLE: &str = "E-book Capture";
pub const DEFAULT_AUTHOR: &str = "E-book Scraper";
pub const DEFAULT_SUBJECT: &str = "Scraped e-book chapter";
pub const DEFAULT_CREATOR: &str = "E-book Chapter Scraper";

/// 一页：满版位图 + 不可见文字
#[derive(Debug, Clone)]
pub struct Page {
    pub image: RgbaImage,
    pub width_pt: f32,
    pub height_pt: f32,
    pub runs: Vec<TextRun>,
}

impl Page {
    /// 页面尺寸由像素按 dpi 换算
    pub fn from_raster(image: RgbaImage, dpi: f32, runs: Vec<TextRun>) -> Self {
        let width_pt = px_to_pt(image.width() as f32, dpi);
        let height_pt = px_to_pt(image.height() as f32, dpi);
        Self {
            image,
            width_pt,
            height_pt,
            runs,
        }
    }

    pub fn has_text(&self) -> bool {
        !self.runs.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentMetadata {
    pub title: String,
    pub author: String,
    pub subject: Option<String>,
    pub creator: String,
    pub created_at: DateTime<Local>,
}

impl DocumentMetadata {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// `D:YYYYMMDDHHmmSS`
    pub fn pdf_date(&self) -> String {
        self.created_at.format("D:%Y%m%d%H%M%S").to_string()
    }
}

impl Default for DocumentMetadata {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            author: DEFAULT_AUTHOR.to_string(),
            subject: Some(DEFAULT_SUBJECT.to_string()),
            creator: DEFAULT_CREATOR.to_string(),
            created_at: Local::now(),
        }
    }
}

/// 组装完成后只读
#[derive(Debug, Clone)]
pub struct Document {
    pages: Vec<Page>,
    metadata: DocumentMetadata,
    search_layer: bool,
}

impl Document {
    pub(crate) fn new(pages: Vec<Page>, metadata: DocumentMetadata, search_layer: bool) -> Self {
        Self {
            pages,
            metadata,
            search_layer,
        }
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn metadata(&self) -> &DocumentMetadata {
        &self.metadata
    }

    pub fn search_layer(&self) -> bool {
        self.search_layer
    }

    pub fn run_count(&self) -> usize {
        self.pages.iter().map(|p| p.runs.len()).sum()
    }
}
