use super::error::AssembleError;
use crate::core::config::RasterEncoding;
use crate::core::layer::POINTS_PER_INCH;
use image::imageops::FilterType;
use image::{DynamicImage, ImageOutputFormat, RgbImage, RgbaImage};
use log::debug;
use std::io::Cursor;

pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// 编码后的页面位图
#[derive(Debug, Clone)]
pub struct EncodedRaster {
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
    /// PDF 流的 Filter 名；`None` 表示原始 RGB，由写出端压缩
    pub filter: Option<&'static str>,
}

impl EncodedRaster {
    pub fn is_raw(&self) -> bool {
        self.filter.is_none()
    }
}

pub trait RasterEncoder: Send + Sync {
    fn name(&self) -> &str;
    fn encode(&self, image: &RgbImage) -> Result<EncodedRaster, AssembleError>;

    /// 单边像素上限；`None` 表示不限
    fn max_dimension(&self) -> Option<u32> {
        None
    }
}

pub struct JpegEncoder {
    quality: u8,
}

impl JpegEncoder {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }
}

impl Default for JpegEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl RasterEncoder for JpegEncoder {
    fn name(&self) -> &str {
        "jpeg"
    }

    /// JPEG 头部用 16 位存宽高
    fn max_dimension(&self) -> Option<u32> {
        Some(u16::MAX as u32)
    }

    fn encode(&self, image: &RgbImage) -> Result<EncodedRaster, AssembleError> {
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image.clone())
            .write_to(&mut buffer, ImageOutputFormat::Jpeg(self.quality))?;
        Ok(EncodedRaster {
            width: image.width(),
            height: image.height(),
            bytes: buffer.into_inner(),
            filter: Some("DCTDecode"),
        })
    }
}

/// 无损：原始 RGB，写出时 Flate 压缩
pub struct LosslessEncoder;

impl RasterEncoder for LosslessEncoder {
    fn name(&self) -> &str {
        "lossless"
    }

    fn encode(&self, image: &RgbImage) -> Result<EncodedRaster, AssembleError> {
        Ok(EncodedRaster {
            width: image.width(),
            height: image.height(),
            bytes: image.as_raw().clone(),
            filter: None,
        })
    }
}

pub fn encoder_for(encoding: &RasterEncoding) -> Box<dyn RasterEncoder> {
    match encoding {
        RasterEncoding::Jpeg { quality } => Box::new(JpegEncoder::new(*quality)),
        RasterEncoding::Lossless => Box::new(LosslessEncoder),
    }
}

/// 去掉 alpha；指定 `raster_dpi` 时只缩小不放大
pub fn prepare_raster(
    image: &RgbaImage,
    width_pt: f32,
    height_pt: f32,
    raster_dpi: Option<f32>,
) -> RgbImage {
    let rgb = DynamicImage::ImageRgba8(image.clone()).into_rgb8();
    let Some(dpi) = raster_dpi else {
        return rgb;
    };

    let max_width = (width_pt / POINTS_PER_INCH * dpi).round().max(1.0) as u32;
    let max_height = (height_pt / POINTS_PER_INCH * dpi).round().max(1.0) as u32;
    if rgb.width() <= max_width && rgb.height() <= max_height {
        return rgb;
    }

    debug!(
        "Downsampling raster {}x{} -> {}x{} ({} dpi)",
        rgb.width(),
        rgb.height(),
        max_width,
        max_height,
        dpi
    );
    image::imageops::resize(&rgb, max_width, max_height, FilterType::Triangle)
}
