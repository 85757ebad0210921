pub mod compositor;

pub use compositor::{
    px_to_pt, Point, TextLayerCompositor, TextRun, DEFAULT_DPI, MAX_FONT_SIZE, MIN_FONT_SIZE,
    POINTS_PER_INCH,
};
