pub mod cancel;
pub mod capture;
pub mod config;
pub mod document;
pub mod layer;
pub mod ocr;
pub mod pipeline;
pub mod stitch;

pub use config::{BuildConfig, BuildMode, ConfigError, RasterEncoding};
pub use pipeline::{BuildError, BuildPipeline, BuildReport, BuildWarning, CancelToken};
