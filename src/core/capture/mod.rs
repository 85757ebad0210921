pub mod comparator;
pub mod end_detector;
pub mod frame;

pub use comparator::{
    similar, suppress_duplicates, FrameComparator, SimilarityScore, Thumbnail,
    DEFAULT_SIMILARITY_THRESHOLD,
};
pub use end_detector::{CaptureDecision, ScrollEndDetector, StopReason};
pub use frame::{CropSpec, Frame, FrameError};
