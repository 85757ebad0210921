use super::frame::Frame;
use log::debug;

pub const THUMBNAIL_SIZE: u32 = 100;
pub const LUMA_TOLERANCE: u8 = 10;
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.98;

/// 相似度 [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct SimilarityScore(f32);

impl SimilarityScore {
    pub const NONE: SimilarityScore = SimilarityScore(0.0);

    pub fn value(self) -> f32 {
        self.0
    }

    pub fn meets(self, threshold: f32) -> bool {
        self.0 >= threshold
    }
}

/// 缩略图亮度平面，可复用于多次比较
#[derive(Debug, Clone)]
pub struct Thumbnail {
    luma: Vec<u8>,
    tolerance: u8,
}

impl Thumbnail {
    pub fn score(&self, other: &Thumbnail) -> SimilarityScore {
        if self.luma.len() != other.luma.len() || self.luma.is_empty() {
            return SimilarityScore::NONE;
        }

        let tolerance = self.tolerance.min(other.tolerance) as i16;
        let matches = self
            .luma
            .iter()
            .zip(other.luma.iter())
            .filter(|(&a, &b)| (a as i16 - b as i16).abs() < tolerance)
            .count();

        SimilarityScore(matches as f32 / self.luma.len() as f32)
    }
}

/// 缩略图亮度比较，容忍滚动截图的亚像素抖动
#[derive(Debug, Clone)]
pub struct FrameComparator {
    sample_size: (u32, u32),
    tolerance: u8,
}

impl FrameComparator {
    pub fn new() -> Self {
        Self {
            sample_size: (THUMBNAIL_SIZE, THUMBNAIL_SIZE),
            tolerance: LUMA_TOLERANCE,
        }
    }

    pub fn with_tolerance(tolerance: u8) -> Self {
        Self {
            tolerance,
            ..Self::new()
        }
    }

    pub fn thumbnail(&self, frame: &Frame) -> Option<Thumbnail> {
        match frame.resize_to(self.sample_size.0, self.sample_size.1) {
            Ok(small) => Some(Thumbnail {
                luma: small.luminance(),
                tolerance: self.tolerance,
            }),
            Err(e) => {
                debug!("Frame {} cannot be thumbnailed: {}", frame.index, e);
                None
            }
        }
    }

    pub fn score(&self, a: &Frame, b: &Frame) -> SimilarityScore {
        match (self.thumbnail(a), self.thumbnail(b)) {
            (Some(ta), Some(tb)) => ta.score(&tb),
            _ => SimilarityScore::NONE,
        }
    }

    pub fn similar(&self, a: &Frame, b: &Frame, threshold: f32) -> bool {
        let score = self.score(a, b);
        debug!(
            "Similarity frame {} vs {}: {:.4} (threshold {:.2})",
            a.index,
            b.index,
            score.value(),
            threshold
        );
        score.meets(threshold)
    }
}

impl Default for FrameComparator {
    fn default() -> Self {
        Self::new()
    }
}

pub fn similar(a: &Frame, b: &Frame, threshold: f32) -> bool {
    FrameComparator::new().similar(a, b, threshold)
}

/// Drops every frame that is similar to the last kept one.
/// Returns the kept frames and the sequence indices that were dropped.
pub fn suppress_duplicates(frames: Vec<Frame>, threshold: f32) -> (Vec<Frame>, Vec<u64>) {
    let comparator = FrameComparator::new();
    let mut kept: Vec<Frame> = Vec::with_capacity(frames.len());
    let mut dropped = Vec::new();
    let mut last: Option<Thumbnail> = None;

    for frame in frames {
        let thumb = comparator.thumbnail(&frame);
        let duplicate = match (&last, &thumb) {
            (Some(prev), Some(cur)) => prev.score(cur).meets(threshold),
            _ => false,
        };

        if duplicate {
            dropped.push(frame.index);
        } else {
            if thumb.is_some() {
                last = thumb;
            }
            kept.push(frame);
        }
    }

    (kept, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_frame(width: u32, height: u32, fill: u8, index: u64) -> Frame {
        let data = vec![fill; (width * height * 4) as usize];
        Frame::new(width, height, data, index)
    }

    fn create_gradient_frame(width: u32, height: u32, shift: u8, index: u64) -> Frame {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                let v = (((x + y) * 200) / (width + height)) as u8 + shift;
                data.extend_from_slice(&[v, v, v, 255]);
            }
        }
        Frame::new(width, height, data, index)
    }

    #[test]
    fn test_reflexive() {
        let frame = create_gradient_frame(320, 240, 0, 0);
        for t in [0.01, 0.5, 0.98, 1.0] {
            assert!(similar(&frame, &frame, t));
        }
        assert_eq!(FrameComparator::new().score(&frame, &frame).value(), 1.0);
    }

    #[test]
    fn test_symmetric() {
        let a = create_gradient_frame(300, 200, 0, 0);
        let b = create_gradient_frame(180, 260, 30, 1);
        let cmp = FrameComparator::new();
        assert_eq!(cmp.score(&a, &b), cmp.score(&b, &a));
        for t in [0.1, 0.5, 0.98] {
            assert_eq!(similar(&a, &b, t), similar(&b, &a, t));
        }
    }

    #[test]
    fn test_small_luminance_shift_is_similar() {
        let a = create_gradient_frame(400, 300, 0, 0);
        let b = create_gradient_frame(400, 300, 5, 1);
        assert!(similar(&a, &b, DEFAULT_SIMILARITY_THRESHOLD));
    }

    #[test]
    fn test_tolerance_controls_shift() {
        let a = create_gradient_frame(200, 200, 0, 0);
        let b = create_gradient_frame(200, 200, 5, 1);
        assert!(FrameComparator::with_tolerance(LUMA_TOLERANCE).similar(&a, &b, 0.98));
        assert!(!FrameComparator::with_tolerance(3).similar(&a, &b, 0.5));
    }

    #[test]
    fn test_black_vs_white() {
        let black = create_test_frame(100, 100, 0, 0);
        let white = create_test_frame(100, 100, 255, 1);
        assert_eq!(FrameComparator::new().score(&black, &white).value(), 0.0);
        for t in [0.001, 0.5, 1.0] {
            assert!(!similar(&black, &white, t));
        }
    }

    #[test]
    fn test_different_resolutions_compare() {
        let a = create_test_frame(1920, 1080, 128, 0);
        let b = create_test_frame(960, 540, 128, 1);
        assert!(similar(&a, &b, 0.98));
    }

    #[test]
    fn test_invalid_frame_not_similar() {
        let good = create_test_frame(50, 50, 128, 0);
        let broken = Frame::new(50, 50, vec![0u8; 10], 1);
        assert!(!similar(&good, &broken, 0.5));
        assert!(!similar(&broken, &broken, 0.5));
    }

    #[test]
    fn test_suppress_duplicates() {
        let frames = vec![
            create_test_frame(64, 64, 10, 0),
            create_test_frame(64, 64, 12, 1),
            create_test_frame(64, 64, 200, 2),
            create_test_frame(64, 64, 200, 3),
            create_test_frame(64, 64, 90, 4),
        ];

        let (kept, dropped) = suppress_duplicates(frames, 0.98);
        let kept_idx: Vec<u64> = kept.iter().map(|f| f.index).collect();
        assert_eq!(kept_idx, vec![0, 2, 4]);
        assert_eq!(dropped, vec![1, 3]);
    }
}
