//! 构建流水线：帧 → (去重) → OCR → 拼接/分页 → 文字层 → PDF

use crate::core::capture::{suppress_duplicates, Frame, FrameError};
pub use crate::core::cancel::CancelToken;
use crate::core::config::{BuildConfig, BuildMode, ConfigError};
use crate::core::document::{AssembleError, DocumentAssembler, Page, PdfWriter};
use crate::core::layer::{px_to_pt, Point, TextLayerCompositor};
use crate::core::ocr::{OcrEngine, OcrExtractor, OcrToken, TesseractEngine};
use crate::core::stitch::{SeamStitcher, StitchError};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("No usable frames")]
    NoUsableFrames,
    #[error("Build cancelled")]
    Cancelled,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Stitch(#[from] StitchError),
    #[error(transparent)]
    Assemble(#[from] AssembleError),
}

/// 可恢复的问题，构建继续
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuildWarning {
    DuplicateSkipped { frame_index: u64 },
    OcrFailed { frame_index: u64, reason: String },
    SearchLayerUnavailable { engine: String },
    FrameElided { frame_index: u64 },
    FrameInvalid { frame_index: u64, reason: String },
}

impl fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateSkipped { frame_index } => {
                write!(f, "frame {} skipped as duplicate", frame_index)
            }
            Self::OcrFailed { frame_index, reason } => {
                write!(f, "OCR failed for frame {}: {}", frame_index, reason)
            }
            Self::SearchLayerUnavailable { engine } => {
                write!(f, "OCR engine '{}' unavailable; raster-only output", engine)
            }
            Self::FrameElided { frame_index } => {
                write!(f, "frame {} contributes no rows after cropping", frame_index)
            }
            Self::FrameInvalid { frame_index, reason } => {
                write!(f, "frame {} is unusable: {}", frame_index, reason)
            }
        }
    }
}

fn checkpoint(cancel: &CancelToken, stage: &str) -> Result<(), BuildError> {
    if cancel.is_cancelled() {
        warn!("⏹️ Build cancelled before {}", stage);
        return Err(BuildError::Cancelled);
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub output: PathBuf,
    pub page_count: usize,
    pub frames_in: usize,
    pub frames_used: usize,
    pub search_layer: bool,
    pub warnings: Vec<BuildWarning>,
    pub bytes_written: u64,
    pub elapsed: Duration,
}

#[derive(Clone)]
pub struct BuildPipeline {
    config: BuildConfig,
    engine: Arc<dyn OcrEngine>,
    cancel: CancelToken,
}

impl BuildPipeline {
    pub fn new(config: BuildConfig) -> Result<Self, BuildError> {
        config.validate()?;
        let engine = Arc::new(TesseractEngine::new(
            config.ocr.tesseract_path.clone(),
            &config.ocr.language,
            config.ocr.page_segmentation_mode,
        ));
        Ok(Self {
            config,
            engine,
            cancel: CancelToken::new(),
        })
    }

    pub fn with_engine(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn run(&self, frames: Vec<Frame>, destination: &Path) -> Result<BuildReport, BuildError> {
        let frames_in = frames.len();
        self.run_with_warnings(frames, frames_in, Vec::new(), destination)
    }

    /// `warnings` 带入上游（如解码阶段）已产生的警告
    pub fn run_with_warnings(
        &self,
        frames: Vec<Frame>,
        frames_in: usize,
        mut warnings: Vec<BuildWarning>,
        destination: &Path,
    ) -> Result<BuildReport, BuildError> {
        let start = Instant::now();
        info!(
            "🚀 Build started: {} frames, mode {:?} -> {}",
            frames.len(),
            self.config.mode,
            destination.display()
        );
        checkpoint(&self.cancel, "frame validation")?;

        let mut frames: Vec<Frame> = frames
            .into_iter()
            .filter(|frame| match frame.validate() {
                Ok(()) => true,
                Err(e) => {
                    warn!("⚠️ Frame {} skipped: {}", frame.index, e);
                    warnings.push(BuildWarning::FrameInvalid {
                        frame_index: frame.index,
                        reason: e.to_string(),
                    });
                    false
                }
            })
            .collect();

        if self.config.suppress_duplicates {
            let (kept, dropped) = suppress_duplicates(frames, self.config.similarity_threshold);
            if !dropped.is_empty() {
                info!("🧹 Suppressed {} duplicate frames", dropped.len());
            }
            warnings.extend(
                dropped
                    .into_iter()
                    .map(|frame_index| BuildWarning::DuplicateSkipped { frame_index }),
            );
            frames = kept;
        }

        if frames.is_empty() {
            error!("❌ No usable frames out of {}", frames_in);
            return Err(BuildError::NoUsableFrames);
        }
        checkpoint(&self.cancel, "OCR")?;

        let (tokens, search_layer) = self.recognize(&frames, &mut warnings);
        checkpoint(&self.cancel, "layout")?;

        let pages = match self.config.mode {
            BuildMode::Seamless => vec![self.seamless_page(&frames, &tokens, &mut warnings)?],
            BuildMode::PerFrame => self.per_frame_pages(&frames, &tokens)?,
        };

        let writer = PdfWriter::new(&self.config.layout.encoding, self.config.layout.raster_dpi);
        let assembler = DocumentAssembler::new(Box::new(writer));
        let metadata = self.config.resolve_metadata(&frames);
        let document = assembler.assemble(pages, metadata, search_layer)?;
        checkpoint(&self.cancel, "write")?;

        let bytes_written = assembler.write(&document, destination).map_err(|e| {
            error!("❌ Failed to write {}: {}", destination.display(), e);
            e
        })?;

        let report = BuildReport {
            output: destination.to_path_buf(),
            page_count: document.page_count(),
            frames_in,
            frames_used: frames.len(),
            search_layer,
            warnings,
            bytes_written,
            elapsed: start.elapsed(),
        };
        info!(
            "✅ Build done: {} pages from {}/{} frames, search layer {}, {} warnings in {:.2}s",
            report.page_count,
            report.frames_used,
            report.frames_in,
            report.search_layer,
            report.warnings.len(),
            report.elapsed.as_secs_f64()
        );
        Ok(report)
    }

    fn recognize(
        &self,
        frames: &[Frame],
        warnings: &mut Vec<BuildWarning>,
    ) -> (Vec<Vec<OcrToken>>, bool) {
        let empty = || vec![Vec::new(); frames.len()];
        if !self.config.ocr.enabled {
            debug!("OCR disabled, raster-only build");
            return (empty(), false);
        }

        let extractor = OcrExtractor::new(self.engine.clone())
            .with_min_confidence(self.config.ocr.min_confidence)
            .with_timeout(self.config.ocr.timeout())
            .with_jobs(self.config.ocr.jobs)
            .with_cancel_token(self.cancel.clone());

        if !extractor.is_available() {
            warn!(
                "⚠️ OCR engine '{}' unavailable, building without search layer",
                extractor.engine_name()
            );
            warnings.push(BuildWarning::SearchLayerUnavailable {
                engine: extractor.engine_name().to_string(),
            });
            return (empty(), false);
        }

        let results = extractor.extract_all(frames);
        // 引擎可启动但每帧都失败（如缺少语言包）时同样视为无文字层
        let search_layer = results.iter().any(|r| r.error.is_none());
        if !search_layer {
            warn!(
                "⚠️ OCR engine '{}' failed on every frame, building without search layer",
                extractor.engine_name()
            );
            warnings.push(BuildWarning::SearchLayerUnavailable {
                engine: extractor.engine_name().to_string(),
            });
        }

        let tokens = results
            .into_iter()
            .map(|result| {
                if let Some(reason) = result.error {
                    warnings.push(BuildWarning::OcrFailed {
                        frame_index: result.frame_index,
                        reason,
                    });
                }
                result.tokens
            })
            .collect();
        (tokens, search_layer)
    }

    fn seamless_page(
        &self,
        frames: &[Frame],
        tokens: &[Vec<OcrToken>],
        warnings: &mut Vec<BuildWarning>,
    ) -> Result<Page, BuildError> {
        let stitch = &self.config.stitch;
        let canvas = SeamStitcher::new(stitch.crop_top, stitch.crop_bottom)
            .with_background(stitch.background)
            .stitch(frames)
            .map_err(|e| {
                error!("❌ Stitching failed: {}", e);
                e
            })?;

        warnings.extend(canvas.elided().map(|p| BuildWarning::FrameElided {
            frame_index: p.frame_index,
        }));

        let dpi = self.config.layout.dpi;
        let runs = TextLayerCompositor::new().compose_canvas(&canvas, frames, tokens, dpi);
        Ok(Page::from_raster(canvas.image, dpi, runs))
    }

    fn per_frame_pages(
        &self,
        frames: &[Frame],
        tokens: &[Vec<OcrToken>],
    ) -> Result<Vec<Page>, BuildError> {
        let dpi = self.config.layout.dpi;
        let scale = px_to_pt(1.0, dpi);
        let compositor = TextLayerCompositor::new();

        frames
            .iter()
            .zip(tokens)
            .map(|(frame, frame_tokens)| -> Result<Page, BuildError> {
                let runs = compositor.compose(frame, frame_tokens, Point::default(), scale, scale);
                Ok(Page::from_raster(frame.to_image()?, dpi, runs))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::document::inspect_pdf;
    use crate::core::ocr::{MockOcrEngine, PixelBox};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn create_test_frame(width: u32, height: u32, fill: u8, index: u64) -> Frame {
        Frame::new(width, height, vec![fill; (width * height * 4) as usize], index)
    }

    fn labelled_engine() -> Arc<MockOcrEngine> {
        Arc::new(MockOcrEngine::with_pattern(|frame| {
            vec![OcrToken::new(
                format!("frame{}", frame.index),
                PixelBox::new(50, 400.min(frame.height / 2), 80, 20),
                90.0,
            )]
        }))
    }

    #[test]
    fn test_seamless_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("book.pdf");
        let frames: Vec<Frame> = (0..3).map(|i| create_test_frame(600, 800, 200, i)).collect();

        let pipeline = BuildPipeline::new(BuildConfig::seamless(100, 120))
            .unwrap()
            .with_engine(labelled_engine());
        let report = pipeline.run(frames, &dest).unwrap();

        assert_eq!(report.page_count, 1);
        assert!(report.search_layer);
        assert!(report.warnings.is_empty());

        let summary = inspect_pdf(&dest).unwrap();
        assert_eq!(summary.page_count(), 1);
        // 2060 rows at 96 dpi
        assert!((summary.pages[0].height_pt - 1545.0).abs() < 0.01);
        assert_eq!(summary.pages[0].texts, vec!["frame0", "frame1", "frame2"]);
        assert!(summary.pages[0].invisible_text);
    }

    #[test]
    fn test_per_frame_pages_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("pages.pdf");
        let frames: Vec<Frame> = (0..4).map(|i| create_test_frame(96, 96 + i as u32 * 24, 128, i)).collect();

        let pipeline = BuildPipeline::new(BuildConfig::default())
            .unwrap()
            .with_engine(labelled_engine());
        let report = pipeline.run(frames, &dest).unwrap();
        assert_eq!(report.page_count, 4);
        assert_eq!(report.frames_used, 4);

        let summary = inspect_pdf(&dest).unwrap();
        for (i, page) in summary.pages.iter().enumerate() {
            assert_eq!(page.texts, vec![format!("frame{}", i)]);
            assert!((page.height_pt - (72.0 + i as f32 * 18.0)).abs() < 0.01);
        }
    }

    #[test]
    fn test_degraded_without_engine() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("raster.pdf");
        let frames = vec![create_test_frame(50, 50, 10, 0)];

        let pipeline = BuildPipeline::new(BuildConfig::default())
            .unwrap()
            .with_engine(Arc::new(MockOcrEngine::unavailable()));
        let report = pipeline.run(frames, &dest).unwrap();

        assert!(!report.search_layer);
        assert!(matches!(
            report.warnings.as_slice(),
            [BuildWarning::SearchLayerUnavailable { .. }]
        ));
        assert!(inspect_pdf(&dest).unwrap().pages[0].texts.is_empty());
    }

    #[test]
    fn test_ocr_failure_is_warning() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("partial.pdf");
        let frames: Vec<Frame> = (0..3).map(|i| create_test_frame(40, 40, 0, i)).collect();
        let token = OcrToken::new("ok", PixelBox::new(1, 1, 10, 10), 90.0);

        let pipeline = BuildPipeline::new(BuildConfig::default())
            .unwrap()
            .with_engine(Arc::new(MockOcrEngine::failing_on(vec![1], vec![token])));
        let report = pipeline.run(frames, &dest).unwrap();

        assert!(report.search_layer);
        assert!(matches!(
            report.warnings.as_slice(),
            [BuildWarning::OcrFailed { frame_index: 1, .. }]
        ));
        let summary = inspect_pdf(&dest).unwrap();
        assert!(summary.pages[1].texts.is_empty());
        assert_eq!(summary.pages[2].texts, vec!["ok"]);
    }

    #[test]
    fn test_ocr_failing_everywhere_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("no-text.pdf");
        let frames: Vec<Frame> = (0..3).map(|i| create_test_frame(40, 40, 0, i)).collect();
        let token = OcrToken::new("never", PixelBox::new(1, 1, 10, 10), 90.0);

        let pipeline = BuildPipeline::new(BuildConfig::default())
            .unwrap()
            .with_engine(Arc::new(MockOcrEngine::failing_on(vec![0, 1, 2], vec![token])));
        let report = pipeline.run(frames, &dest).unwrap();

        assert!(!report.search_layer);
        assert!(report
            .warnings
            .iter()
            .any(|w| matches!(w, BuildWarning::SearchLayerUnavailable { .. })));
        let failed = report
            .warnings
            .iter()
            .filter(|w| matches!(w, BuildWarning::OcrFailed { .. }))
            .count();
        assert_eq!(failed, 3);
        assert_eq!(inspect_pdf(&dest).unwrap().page_count(), 3);
    }

    #[test]
    fn test_cancel_during_ocr_stops_remaining_frames() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("cancelled-ocr.pdf");
        let frames: Vec<Frame> = (0..6).map(|i| create_test_frame(20, 20, 0, i)).collect();
        let token = CancelToken::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let engine = {
            let token = token.clone();
            let calls = calls.clone();
            MockOcrEngine::with_pattern(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                token.cancel();
                Vec::new()
            })
        };
        let mut config = BuildConfig::default();
        config.ocr.jobs = 1;

        let result = BuildPipeline::new(config)
            .unwrap()
            .with_engine(Arc::new(engine))
            .with_cancel_token(token)
            .run(frames, &dest);

        assert!(matches!(result, Err(BuildError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!dest.exists());
    }

    #[test]
    fn test_invalid_and_duplicate_frames() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("dedup.pdf");
        let frames = vec![
            create_test_frame(30, 30, 0, 0),
            create_test_frame(30, 30, 0, 1),
            Frame::new(30, 30, vec![0; 10], 2),
            create_test_frame(30, 30, 255, 3),
        ];
        let mut config = BuildConfig::raster_only();
        config.suppress_duplicates = true;

        let report = BuildPipeline::new(config).unwrap().run(frames, &dest).unwrap();
        assert_eq!(report.frames_in, 4);
        assert_eq!(report.frames_used, 2);
        assert_eq!(report.page_count, 2);
        assert!(report
            .warnings
            .contains(&BuildWarning::DuplicateSkipped { frame_index: 1 }));
        assert!(report
            .warnings
            .iter()
            .any(|w| matches!(w, BuildWarning::FrameInvalid { frame_index: 2, .. })));
    }

    #[test]
    fn test_no_usable_frames() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("none.pdf");
        let pipeline = BuildPipeline::new(BuildConfig::raster_only()).unwrap();

        assert!(matches!(pipeline.run(Vec::new(), &dest), Err(BuildError::NoUsableFrames)));
        assert!(!dest.exists());
    }

    #[test]
    fn test_cancelled_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("cancelled.pdf");
        let token = CancelToken::new();
        token.cancel();

        let pipeline = BuildPipeline::new(BuildConfig::raster_only())
            .unwrap()
            .with_cancel_token(token);
        let result = pipeline.run(vec![create_test_frame(10, 10, 0, 0)], &dest);

        assert!(matches!(result, Err(BuildError::Cancelled)));
        assert!(!dest.exists());
    }

    #[test]
    fn test_unwritable_destination() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("no").join("such").join("dir.pdf");
        let pipeline = BuildPipeline::new(BuildConfig::raster_only()).unwrap();

        let result = pipeline.run(vec![create_test_frame(10, 10, 0, 0)], &dest);
        assert!(matches!(
            result,
            Err(BuildError::Assemble(AssembleError::InvalidDestination(_)))
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = BuildConfig::default();
        config.layout.dpi = -1.0;
        assert!(matches!(BuildPipeline::new(config), Err(BuildError::Config(_))));
    }
}
