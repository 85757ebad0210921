use super::comparator::{FrameComparator, Thumbnail, DEFAULT_SIMILARITY_THRESHOLD};
use super::frame::Frame;
use log::{debug, info};

/// 安全上限
pub const DEFAULT_MAX_FRAMES: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// 与上一帧几乎相同，滚动已到底
    NoNewContent,
    /// 达到最大截图数
    FrameLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureDecision {
    Keep,
    Stop(StopReason),
}

/// 滚动截图终止检测：新帧与上一张保留帧相似即停止
pub struct ScrollEndDetector {
    comparator: FrameComparator,
    threshold: f32,
    max_frames: usize,
    last_thumbnail: Option<Thumbnail>,
    accepted: usize,
}

impl ScrollEndDetector {
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_SIMILARITY_THRESHOLD, DEFAULT_MAX_FRAMES)
    }

    pub fn with_threshold(threshold: f32, max_frames: usize) -> Self {
        Self {
            comparator: FrameComparator::new(),
            threshold,
            max_frames,
            last_thumbnail: None,
            accepted: 0,
        }
    }

    pub fn push(&mut self, frame: &Frame) -> CaptureDecision {
        if self.accepted >= self.max_frames {
            info!("🛑 Frame limit reached after {} captures", self.accepted);
            return CaptureDecision::Stop(StopReason::FrameLimit);
        }

        let current = self.comparator.thumbnail(frame);

        if let (Some(prev), Some(cur)) = (&self.last_thumbnail, &current) {
            let score = prev.score(cur);
            debug!("Capture {}: similarity to previous {:.4}", frame.index, score.value());
            if score.meets(self.threshold) {
                info!("🛑 Reached end of content after {} captures", self.accepted);
                return CaptureDecision::Stop(StopReason::NoNewContent);
            }
        }

        if current.is_some() {
            self.last_thumbnail = current;
        }
        self.accepted += 1;
        CaptureDecision::Keep
    }

    pub fn accepted(&self) -> usize {
        self.accepted
    }

    pub fn reset(&mut self) {
        self.last_thumbnail = None;
        self.accepted = 0;
    }
}

impl Default for ScrollEndDetector {
    fn default() -> Self {
        Self::new()
    }
}
