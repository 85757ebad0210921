use crate::core::capture::{CropSpec, Frame, FrameError};
use image::{Rgba, RgbaImage};
use log::{debug, info, warn};
use rayon::prelude::*;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StitchError {
    #[error("No frames to stitch")]
    NoFrames,
    #[error("Every frame was cropped away; nothing to stitch")]
    EmptyCanvas,
    #[error("Frame {index} is unusable: {source}")]
    InvalidFrame {
        index: u64,
        #[source]
        source: FrameError,
    },
    #[error("Canvas height overflows u32")]
    TooLarge,
}

/// 单帧在画布上的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub frame_index: u64,
    pub crop: CropSpec,
    pub x_offset: u32,
    pub y_offset: u32,
    /// post-crop size
    pub width: u32,
    pub height: u32,
}

impl Placement {
    pub fn is_elided(&self) -> bool {
        self.height == 0
    }
}

/// 拼接结果：一张长图 + 每帧的放置信息（与输入顺序一致）
#[derive(Debug, Clone)]
pub struct Canvas {
    pub image: RgbaImage,
    pub placements: Vec<Placement>,
}

impl Canvas {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn elided(&self) -> impl Iterator<Item = &Placement> {
        self.placements.iter().filter(|p| p.is_elided())
    }
}

/// 无缝拼接：去掉相邻截图重复的页眉/页脚
pub struct SeamStitcher {
    crop_top: u32,
    crop_bottom: u32,
    background: Rgba<u8>,
}

impl SeamStitcher {
    pub fn new(crop_top: u32, crop_bottom: u32) -> Self {
        Self {
            crop_top,
            crop_bottom,
            background: Rgba([255, 255, 255, 255]),
        }
    }

    pub fn with_background(mut self, rgb: [u8; 3]) -> Self {
        self.background = Rgba([rgb[0], rgb[1], rgb[2], 255]);
        self
    }

    /// 首帧不裁；中间帧裁掉顶部 `crop_top` 和底部 `crop_bottom`；
    /// 末帧保留底边，只在接缝一侧（顶部）去掉 `crop_bottom` 行
    pub fn crop_for(&self, position: usize, count: usize) -> CropSpec {
        if count <= 1 || position == 0 {
            return CropSpec::NONE;
        }
        if position + 1 == count {
            return CropSpec::new(self.crop_bottom, 0);
        }
        CropSpec::new(self.crop_top, self.crop_bottom)
    }

    pub fn stitch(&self, frames: &[Frame]) -> Result<Canvas, StitchError> {
        if frames.is_empty() {
            return Err(StitchError::NoFrames);
        }

        let count = frames.len();
        let cropped: Vec<(CropSpec, RgbaImage)> = frames
            .par_iter()
            .enumerate()
            .map(|(position, frame)| {
                let crop = self.crop_for(position, count);
                let image = frame.to_image().map_err(|source| StitchError::InvalidFrame {
                    index: frame.index,
                    source,
                })?;
                let height = crop.content_height(frame.height);
                let part = image::imageops::crop_imm(&image, 0, crop.top, frame.width, height)
                    .to_image();
                Ok((crop, part))
            })
            .collect::<Result<_, StitchError>>()?;

        let width = cropped
            .iter()
            .filter(|(_, img)| img.height() > 0)
            .map(|(_, img)| img.width())
            .max()
            .ok_or(StitchError::EmptyCanvas)?;
        let height = cropped
            .iter()
            .try_fold(0u32, |acc, (_, img)| acc.checked_add(img.height()))
            .ok_or(StitchError::TooLarge)?;

        let mut canvas = RgbaImage::from_pixel(width, height, self.background);
        let mut placements = Vec::with_capacity(count);
        let mut y_offset = 0u32;

        for (frame, (crop, part)) in frames.iter().zip(cropped.iter()) {
            let x_offset = width.saturating_sub(part.width()) / 2;
            if let Err(e) = crop.validate(frame.height) {
                warn!("⚠️ Frame {} elided: {}", frame.index, e);
            }
            if part.height() > 0 {
                image::imageops::replace(&mut canvas, part, x_offset as i64, y_offset as i64);
            }
            debug!(
                "Frame {} -> canvas ({}, {}) size {}x{}",
                frame.index,
                x_offset,
                y_offset,
                part.width(),
                part.height()
            );

            placements.push(Placement {
                frame_index: frame.index,
                crop: *crop,
                x_offset,
                y_offset,
                width: part.width(),
                height: part.height(),
            });
            y_offset += part.height();
        }

        info!(
            "🧵 Stitched {} frames into {}x{} canvas",
            count, width, height
        );
        Ok(Canvas { image: canvas, placements })
    }
}
