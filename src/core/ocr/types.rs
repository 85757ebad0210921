/// 像素坐标框（左上角原点）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }
}

/// 单个识别结果，坐标位于来源帧的像素空间
#[derive(Debug, Clone, PartialEq)]
pub struct OcrToken {
    pub text: String,
    pub bbox: PixelBox,
    /// 0-100
    pub confidence: f32,
}

impl OcrToken {
    pub fn new(text: impl Into<String>, bbox: PixelBox, confidence: f32) -> Self {
        Self {
            text: text.into(),
            bbox,
            confidence,
        }
    }
}

/// 一帧的 OCR 结果，`position` 为该帧在本次构建中的序号
#[derive(Debug, Clone)]
pub struct FrameOcr {
    pub position: usize,
    pub frame_index: u64,
    pub tokens: Vec<OcrToken>,
    pub error: Option<String>,
}
