use chrono::{DateTime, Local};
use image::RgbaImage;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image decode error: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Invalid pixel buffer: {width}x{height} needs {expected} bytes, got {actual}")]
    InvalidBuffer {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("Crop {top}+{bottom} leaves no rows in a frame of height {height}")]
    CropTooLarge { top: u32, bottom: u32, height: u32 },
}

/// 截图帧（RGBA8），构造后只读
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>, // RGBA 格式
    pub index: u64,
    pub title: Option<String>,
    pub url: Option<String>,
    pub captured_at: Option<DateTime<Local>>,
}

impl Frame {
    pub fn new(width: u32, height: u32, data: Vec<u8>, index: u64) -> Self {
        Self {
            width,
            height,
            data,
            index,
            title: None,
            url: None,
            captured_at: None,
        }
    }

    pub fn from_image(image: RgbaImage, index: u64) -> Self {
        let (width, height) = image.dimensions();
        Self::new(width, height, image.into_raw(), index)
    }

    /// 从内存中的 PNG/JPEG/BMP 数据解码
    pub fn decode(bytes: &[u8], index: u64) -> Result<Self, FrameError> {
        let image = image::load_from_memory(bytes)?.to_rgba8();
        Ok(Self::from_image(image, index))
    }

    /// 从文件解码，采集时间取文件修改时间
    pub fn open<P: AsRef<Path>>(path: P, index: u64) -> Result<Self, FrameError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let mut frame = Self::decode(&bytes, index)?;
        frame.captured_at = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Local>::from);
        Ok(frame)
    }

    pub fn with_source(mut self, title: impl Into<String>, url: Option<String>) -> Self {
        self.title = Some(title.into());
        self.url = url;
        self
    }

    pub fn with_captured_at(mut self, captured_at: DateTime<Local>) -> Self {
        self.captured_at = Some(captured_at);
        self
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn validate(&self) -> Result<(), FrameError> {
        let expected = self.pixel_count() * 4;
        if self.width == 0 || self.height == 0 || self.data.len() != expected {
            return Err(FrameError::InvalidBuffer {
                width: self.width,
                height: self.height,
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }

    pub fn to_image(&self) -> Result<RgbaImage, FrameError> {
        self.validate()?;
        RgbaImage::from_raw(self.width, self.height, self.data.clone()).ok_or(
            FrameError::InvalidBuffer {
                width: self.width,
                height: self.height,
                expected: self.pixel_count() * 4,
                actual: self.data.len(),
            },
        )
    }

    pub fn resize_to(&self, target_width: u32, target_height: u32) -> Result<Frame, FrameError> {
        let img = self.to_image()?;
        let resized = image::imageops::resize(
            &img,
            target_width,
            target_height,
            image::imageops::FilterType::Triangle,
        );

        Ok(Frame {
            width: target_width,
            height: target_height,
            data: resized.into_raw(),
            index: self.index,
            title: self.title.clone(),
            url: self.url.clone(),
            captured_at: self.captured_at,
        })
    }

    /// 单通道亮度 (299R + 587G + 114B) / 1000
    pub fn luminance(&self) -> Vec<u8> {
        self.data
            .chunks_exact(4)
            .map(|rgba| {
                ((rgba[0] as u32 * 299 + rgba[1] as u32 * 587 + rgba[2] as u32 * 114) / 1000) as u8
            })
            .collect()
    }
}

/// 拼接前的裁剪量（像素）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CropSpec {
    pub top: u32,
    pub bottom: u32,
}

impl CropSpec {
    pub const NONE: CropSpec = CropSpec { top: 0, bottom: 0 };

    pub fn new(top: u32, bottom: u32) -> Self {
        Self { top, bottom }
    }

    pub fn validate(&self, height: u32) -> Result<(), FrameError> {
        if self.top.saturating_add(self.bottom) >= height {
            return Err(FrameError::CropTooLarge {
                top: self.top,
                bottom: self.bottom,
                height,
            });
        }
        Ok(())
    }

    /// Rows left after cropping; zero when the crop eats the whole frame.
    pub fn content_height(&self, height: u32) -> u32 {
        height.saturating_sub(self.top.saturating_add(self.bottom))
    }

    /// Whether source row `y` survives the crop.
    pub fn keeps_row(&self, y: u32, height: u32) -> bool {
        y >= self.top && y < height.saturating_sub(self.bottom)
    }

    /// Whether any row of `[y, end)` survives the crop.
    pub fn keeps_span(&self, y: u32, end: u32, height: u32) -> bool {
        let first = y.max(self.top);
        first < end && self.keeps_row(first, height)
    }
}
