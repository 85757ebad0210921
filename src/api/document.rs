//! 可搜索 PDF 构建器

use crate::core::capture::Frame;
use crate::core::config::BuildConfig;
use crate::core::ocr::OcrEngine;
use crate::core::pipeline::{BuildError, BuildPipeline, BuildReport, BuildWarning, CancelToken};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 截图序列 → 可搜索 PDF
///
/// ```no_run
/// use capture_book::api::document::DocumentBuilder;
/// use capture_book::core::config::BuildConfig;
///
/// let builder = DocumentBuilder::create(BuildConfig::seamless(80, 60))?;
/// let report = builder.build_from_paths(&["shot_000.png", "shot_001.png"], "book.pdf")?;
/// println!("{} pages, search layer: {}", report.page_count, report.search_layer);
/// # Ok::<(), capture_book::core::pipeline::BuildError>(())
/// ```
pub struct DocumentBuilder {
    pipeline: BuildPipeline,
}

impl DocumentBuilder {
    pub fn create(config: BuildConfig) -> Result<Self, BuildError> {
        let pipeline = BuildPipeline::new(config)?;
        info!("📚 DocumentBuilder: created ({:?})", pipeline.config().mode);
        Ok(Self { pipeline })
    }

    /// 替换 OCR 引擎（默认 tesseract）
    pub fn with_engine(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.pipeline = self.pipeline.clone().with_engine(engine);
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.pipeline = self.pipeline.clone().with_cancel_token(cancel);
        self
    }

    pub fn config(&self) -> &BuildConfig {
        self.pipeline.config()
    }

    pub fn build<P: AsRef<Path>>(
        &self,
        frames: Vec<Frame>,
        destination: P,
    ) -> Result<BuildReport, BuildError> {
        self.pipeline.run(frames, destination.as_ref())
    }

    /// 按顺序解码文件；无法读取的文件记为警告
    pub fn build_from_paths<I, P, D>(&self, paths: I, destination: D) -> Result<BuildReport, BuildError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
        D: AsRef<Path>,
    {
        let paths: Vec<PathBuf> = paths.into_iter().map(|p| p.as_ref().to_path_buf()).collect();
        let mut frames = Vec::with_capacity(paths.len());
        let mut warnings = Vec::new();

        for (i, path) in paths.iter().enumerate() {
            match Frame::open(path, i as u64) {
                Ok(frame) => frames.push(frame),
                Err(e) => {
                    warn!("⚠️ Cannot load {}: {}", path.display(), e);
                    warnings.push(BuildWarning::FrameInvalid {
                        frame_index: i as u64,
                        reason: format!("{}: {}", path.display(), e),
                    });
                }
            }
        }

        self.pipeline
            .run_with_warnings(frames, paths.len(), warnings, destination.as_ref())
    }
}

impl Drop for DocumentBuilder {
    fn drop(&mut self) {
        info!("🗑️ DocumentBuilder: released");
    }
}
