use crate::core::capture::Frame;
use crate::core::ocr::OcrToken;
use crate::core::stitch::Canvas;
use log::debug;

pub const POINTS_PER_INCH: f32 = 72.0;
pub const DEFAULT_DPI: f32 = 96.0;
/// OCR 框以左上角为原点，文字按基线绘制
pub const BASELINE_RATIO: f32 = 0.8;
pub const FONT_HEIGHT_RATIO: f32 = 0.9;
pub const MIN_FONT_SIZE: f32 = 6.0;
pub const MAX_FONT_SIZE: f32 = 14.0;

pub fn px_to_pt(px: f32, dpi: f32) -> f32 {
    px * POINTS_PER_INCH / dpi
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// 点坐标系下的不可见文字（左上角原点，y 向下）
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub x: f32,
    pub top: f32,
    pub baseline: f32,
    pub width: f32,
    pub height: f32,
    pub font_size: f32,
}

/// 把帧像素坐标的 OCR 结果映射到页面点坐标
pub struct TextLayerCompositor {
    min_font_size: f32,
    max_font_size: f32,
}

impl TextLayerCompositor {
    pub fn new() -> Self {
        Self {
            min_font_size: MIN_FONT_SIZE,
            max_font_size: MAX_FONT_SIZE,
        }
    }

    pub fn font_size_for(&self, height_pt: f32) -> f32 {
        (height_pt * FONT_HEIGHT_RATIO).clamp(self.min_font_size, self.max_font_size)
    }

    pub fn compose(
        &self,
        frame: &Frame,
        tokens: &[OcrToken],
        origin: Point,
        scale_x: f32,
        scale_y: f32,
    ) -> Vec<TextRun> {
        tokens
            .iter()
            .filter(|token| {
                let inside = token.bbox.x < frame.width && token.bbox.y < frame.height;
                if !inside {
                    debug!(
                        "Token {:?} outside frame {} ({}x{}), skipped",
                        token.text, frame.index, frame.width, frame.height
                    );
                }
                inside
            })
            .map(|token| self.map_token(token, origin, scale_x, scale_y))
            .collect()
    }

    fn map_token(&self, token: &OcrToken, origin: Point, scale_x: f32, scale_y: f32) -> TextRun {
        let x = token.bbox.x as f32 * scale_x + origin.x;
        let top = token.bbox.y as f32 * scale_y + origin.y;
        let width = token.bbox.width as f32 * scale_x;
        let height = token.bbox.height as f32 * scale_y;

        TextRun {
            text: token.text.clone(),
            x,
            top,
            baseline: top + height * BASELINE_RATIO,
            width,
            height,
            font_size: self.font_size_for(height),
        }
    }

    /// 拼接模式：每帧按其在画布上的偏移映射，比例按整张画布计算。
    /// `frames` 与 `tokens` 与 `canvas.placements` 一一对应。
    pub fn compose_canvas(
        &self,
        canvas: &Canvas,
        frames: &[Frame],
        tokens: &[Vec<OcrToken>],
        dpi: f32,
    ) -> Vec<TextRun> {
        let scale_x = px_to_pt(canvas.width() as f32, dpi) / canvas.width().max(1) as f32;
        let scale_y = px_to_pt(canvas.height() as f32, dpi) / canvas.height().max(1) as f32;

        let mut runs = Vec::new();
        for ((placement, frame), frame_tokens) in
            canvas.placements.iter().zip(frames).zip(tokens)
        {
            if placement.is_elided() {
                continue;
            }

            let crop = placement.crop;
            let visible: Vec<OcrToken> = frame_tokens
                .iter()
                .filter(|t| crop.keeps_span(t.bbox.y, t.bbox.bottom(), frame.height))
                .cloned()
                .collect();
            if visible.len() < frame_tokens.len() {
                debug!(
                    "Frame {}: {} tokens fall in cropped chrome",
                    frame.index,
                    frame_tokens.len() - visible.len()
                );
            }

            let origin = Point::new(
                placement.x_offset as f32 * scale_x,
                (placement.y_offset as f32 - crop.top as f32) * scale_y,
            );
            runs.extend(self.compose(frame, &visible, origin, scale_x, scale_y));
        }
        runs
    }
}

impl Default for TextLayerCompositor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ocr::PixelBox;
    use crate::core::stitch::SeamStitcher;

    fn create_test_frame(width: u32, height: u32, index: u64) -> Frame {
        Frame::new(width, height, vec![255; (width * height * 4) as usize], index)
    }

    fn token(text: &str, x: u32, y: u32, w: u32, h: u32) -> OcrToken {
        OcrToken::new(text, PixelBox::new(x, y, w, h), 90.0)
    }

    #[test]
    fn test_baseline_anchor() {
        let compositor = TextLayerCompositor::new();
        let frame = create_test_frame(200, 100, 0);
        let runs = compositor.compose(
            &frame,
            &[token("Hello", 0, 0, 100, 20)],
            Point::default(),
            0.75,
            0.75,
        );

        assert_eq!(runs.len(), 1);
        assert!((runs[0].x - 0.0).abs() < 1e-4);
        assert!((runs[0].baseline - 12.0).abs() < 1e-4);
        assert!((runs[0].width - 75.0).abs() < 1e-4);
        assert!(runs[0].font_size >= MIN_FONT_SIZE && runs[0].font_size <= MAX_FONT_SIZE);
    }

    #[test]
    fn test_origin_offset() {
        let compositor = TextLayerCompositor::new();
        let frame = create_test_frame(200, 100, 0);
        let runs = compositor.compose(
            &frame,
            &[token("a", 10, 20, 30, 10)],
            Point::new(5.0, 100.0),
            0.5,
            0.5,
        );

        assert!((runs[0].x - 10.0).abs() < 1e-4);
        assert!((runs[0].top - 110.0).abs() < 1e-4);
    }

    #[test]
    fn test_font_size_clamped() {
        let compositor = TextLayerCompositor::new();
        assert_eq!(compositor.font_size_for(0.0), MIN_FONT_SIZE);
        assert_eq!(compositor.font_size_for(200.0), MAX_FONT_SIZE);
        assert!((compositor.font_size_for(10.0) - 9.0).abs() < 1e-4);
    }

    #[test]
    fn test_tokens_outside_frame_dropped() {
        let compositor = TextLayerCompositor::new();
        let frame = create_test_frame(100, 100, 0);
        let runs = compositor.compose(
            &frame,
            &[token("in", 10, 10, 5, 5), token("out", 150, 10, 5, 5)],
            Point::default(),
            1.0,
            1.0,
        );
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].text, "in");
    }

    #[test]
    fn test_canvas_runs_monotonic() {
        let frames: Vec<Frame> = (0..3).map(|i| create_test_frame(600, 800, i)).collect();
        let canvas = SeamStitcher::new(100, 120).stitch(&frames).unwrap();
        let tokens: Vec<Vec<OcrToken>> = (0..3)
            .map(|i| vec![token(&format!("t{}", i), 50, 400, 80, 20)])
            .collect();

        let runs = TextLayerCompositor::new().compose_canvas(&canvas, &frames, &tokens, DEFAULT_DPI);

        assert_eq!(runs.len(), 3);
        assert!(runs[0].top < runs[1].top && runs[1].top < runs[2].top);
        // frame 1 placed at canvas row 800 with 100 rows cut from its top
        assert!((runs[1].top - px_to_pt(800.0 + 400.0 - 100.0, DEFAULT_DPI)).abs() < 1e-3);
        let texts: Vec<&str> = runs.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["t0", "t1", "t2"]);
    }

    #[test]
    fn test_canvas_drops_chrome_tokens() {
        let frames: Vec<Frame> = (0..3).map(|i| create_test_frame(300, 400, i)).collect();
        let canvas = SeamStitcher::new(50, 60).stitch(&frames).unwrap();
        // the header at y=10 and footer at y=360 are cut from the middle frame
        let tokens = vec![
            vec![token("top-header", 0, 10, 50, 20)],
            vec![
                token("header", 0, 10, 50, 20),
                token("body", 0, 200, 50, 20),
                token("footer", 0, 360, 50, 20),
            ],
            vec![],
        ];

        let runs = TextLayerCompositor::new().compose_canvas(&canvas, &frames, &tokens, DEFAULT_DPI);
        let texts: Vec<&str> = runs.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["top-header", "body"]);
    }

    #[test]
    fn test_canvas_centering_offset() {
        let frames = vec![create_test_frame(400, 100, 0), create_test_frame(200, 100, 1)];
        let canvas = SeamStitcher::new(0, 0).stitch(&frames).unwrap();
        let tokens = vec![vec![], vec![token("c", 0, 0, 10, 10)]];

        let runs = TextLayerCompositor::new().compose_canvas(&canvas, &frames, &tokens, 72.0);
        assert!((runs[0].x - 100.0).abs() < 1e-4);
        assert!((runs[0].top - 100.0).abs() < 1e-4);
    }
}
