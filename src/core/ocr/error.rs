use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR engine not available: {0}")]
    EngineUnavailable(String),
    #[error("OCR timed out after {0:?}")]
    Timeout(Duration),
    #[error("OCR processing failed: {0}")]
    Processing(String),
    #[error("Failed to parse OCR output: {0}")]
    Parse(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Frame error: {0}")]
    Frame(#[from] crate::core::capture::FrameError),
}
