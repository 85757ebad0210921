//! 采集循环辅助：外部负责翻页截图，这里判断何时停止

use crate::core::capture::{
    similar, CaptureDecision, Frame, ScrollEndDetector, StopReason,
};
use crate::core::config::BuildConfig;
use log::info;

/// 滚动截图监视器
///
/// 每截一张调用 `push`，返回 `Stop` 时结束采集；保留的帧按顺序交给
/// `DocumentBuilder`。
pub struct CaptureMonitor {
    detector: ScrollEndDetector,
    frames: Vec<Frame>,
    stopped: Option<StopReason>,
}

impl CaptureMonitor {
    pub fn create(threshold: f32, max_frames: usize) -> Self {
        info!(
            "🎬 CaptureMonitor: created (threshold {:.2}, max {} frames)",
            threshold, max_frames
        );
        Self {
            detector: ScrollEndDetector::with_threshold(threshold, max_frames),
            frames: Vec::new(),
            stopped: None,
        }
    }

    pub fn from_config(config: &BuildConfig) -> Self {
        Self::create(config.similarity_threshold, config.max_frames)
    }

    /// 停止后再 push 的帧直接丢弃
    pub fn push(&mut self, frame: Frame) -> CaptureDecision {
        if let Some(reason) = self.stopped {
            return CaptureDecision::Stop(reason);
        }
        let decision = self.detector.push(&frame);
        match decision {
            CaptureDecision::Keep => self.frames.push(frame),
            CaptureDecision::Stop(reason) => self.stopped = Some(reason),
        }
        decision
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stopped
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// 取走已保留的帧并重置状态
    pub fn take_frames(&mut self) -> Vec<Frame> {
        self.detector.reset();
        self.stopped = None;
        std::mem::take(&mut self.frames)
    }
}

impl Default for CaptureMonitor {
    fn default() -> Self {
        Self::from_config(&BuildConfig::default())
    }
}

impl Drop for CaptureMonitor {
    fn drop(&mut self) {
        info!("🗑️ CaptureMonitor: released");
    }
}

/// 两帧是否可视为相同画面
pub fn frames_similar(a: &Frame, b: &Frame, threshold: f32) -> bool {
    similar(a, b, threshold)
}
