use super::engine::OcrEngine;
use super::error::OcrError;
use super::types::{FrameOcr, OcrToken};
use crate::core::cancel::CancelToken;
use crate::core::capture::Frame;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_MIN_CONFIDENCE: f32 = 30.0;

/// 规范化 OCR 结果：去空白、丢空串、丢低置信度，保持引擎顺序
pub fn normalize_tokens(raw: Vec<OcrToken>, min_confidence: f32) -> Vec<OcrToken> {
    raw.into_iter()
        .filter_map(|token| {
            let text = token.text.trim();
            if text.is_empty() || token.confidence <= min_confidence {
                return None;
            }
            Some(OcrToken {
                text: text.to_string(),
                bbox: token.bbox,
                confidence: token.confidence,
            })
        })
        .collect()
}

pub struct OcrExtractor {
    engine: Arc<dyn OcrEngine>,
    min_confidence: f32,
    timeout: Option<Duration>,
    jobs: usize,
    cancel: CancelToken,
}

impl OcrExtractor {
    pub fn new(engine: Arc<dyn OcrEngine>) -> Self {
        Self {
            engine,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            timeout: None,
            jobs: num_cpus::get().min(4),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// 取消后剩余帧不再送入引擎
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    pub fn is_available(&self) -> bool {
        self.engine.is_available()
    }

    pub fn try_extract(&self, frame: &Frame) -> Result<Vec<OcrToken>, OcrError> {
        let raw = self.engine.recognize(frame, self.timeout)?;
        let raw_len = raw.len();
        let tokens = normalize_tokens(raw, self.min_confidence);
        debug!(
            "OCR frame {}: {} raw -> {} kept",
            frame.index,
            raw_len,
            tokens.len()
        );
        Ok(tokens)
    }

    /// 失败时返回空列表，页面仅缺少文字层
    pub fn extract(&self, frame: &Frame) -> Vec<OcrToken> {
        match self.try_extract(frame) {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!("⚠️ OCR failed for frame {}: {} (no text layer)", frame.index, e);
                Vec::new()
            }
        }
    }

    /// 并行提取，结果按输入顺序返回
    pub fn extract_all(&self, frames: &[Frame]) -> Vec<FrameOcr> {
        let start = Instant::now();
        let run = |frames: &[Frame]| -> Vec<FrameOcr> {
            frames
                .par_iter()
                .enumerate()
                .map(|(position, frame)| {
                    if self.cancel.is_cancelled() {
                        debug!("OCR frame {} skipped: cancelled", frame.index);
                        return FrameOcr {
                            position,
                            frame_index: frame.index,
                            tokens: Vec::new(),
                            error: Some("cancelled".to_string()),
                        };
                    }
                    match self.try_extract(frame) {
                        Ok(tokens) => FrameOcr {
                            position,
                            frame_index: frame.index,
                            tokens,
                            error: None,
                        },
                        Err(e) => {
                            warn!("⚠️ OCR failed for frame {}: {}", frame.index, e);
                            FrameOcr {
                                position,
                                frame_index: frame.index,
                                tokens: Vec::new(),
                                error: Some(e.to_string()),
                            }
                        }
                    }
                })
                .collect()
        };

        let results = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
        {
            Ok(pool) => pool.install(|| run(frames)),
            Err(e) => {
                warn!("OCR thread pool unavailable ({}), using global pool", e);
                run(frames)
            }
        };

        let total: usize = results.iter().map(|r| r.tokens.len()).sum();
        info!(
            "🔍 OCR ({}) done: {} frames, {} tokens in {:.2}s",
            self.engine.name(),
            frames.len(),
            total,
            start.elapsed().as_secs_f64()
        );
        results
    }
}
