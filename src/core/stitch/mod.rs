pub mod stitcher;

pub use stitcher::{Canvas, Placement, SeamStitcher, StitchError};
