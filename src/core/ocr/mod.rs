//! OCR 接入层
//!
//! 识别交给外部引擎（tesseract 或测试用 mock），这里只负责调用、超时、
//! 结果规范化与并行调度。

pub mod engine;
pub mod error;
pub mod extractor;
pub mod types;

pub use engine::{parse_tsv, MockOcrEngine, OcrEngine, TesseractEngine};
pub use error::OcrError;
pub use extractor::{normalize_tokens, OcrExtractor, DEFAULT_MIN_CONFIDENCE};
pub use types::{FrameOcr, OcrToken, PixelBox};
