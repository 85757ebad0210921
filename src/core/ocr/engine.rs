use super::error::OcrError;
use super::types::{OcrToken, PixelBox};
use crate::core::capture::Frame;
use log::{debug, warn};
use std::fs::File;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// OCR 引擎接口，识别本身由外部完成
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    /// Raw, unfiltered tokens in engine reading order.
    fn recognize(&self, frame: &Frame, timeout: Option<Duration>)
        -> Result<Vec<OcrToken>, OcrError>;
}

/// 调用本地 tesseract 可执行文件（TSV 输出）
pub struct TesseractEngine {
    binary: PathBuf,
    language: String,
    page_segmentation_mode: u8,
}

impl TesseractEngine {
    pub fn new(binary: Option<PathBuf>, language: &str, page_segmentation_mode: u8) -> Self {
        Self {
            binary: binary.unwrap_or_else(|| PathBuf::from("tesseract")),
            language: language.to_string(),
            page_segmentation_mode,
        }
    }

    /// Language codes are passed as a process argument; keep them to `eng`, `chi_sim`, `eng+deu` shapes.
    fn validate_language(lang: &str) -> Result<(), OcrError> {
        if lang.is_empty() || lang.len() > 20 {
            return Err(OcrError::Processing(
                "Invalid language code length".to_string(),
            ));
        }
        if let Some(c) = lang
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && *c != '+' && *c != '_')
        {
            return Err(OcrError::Processing(format!(
                "Invalid character in language code: {}",
                c
            )));
        }
        Ok(())
    }

    fn wait_with_timeout(
        child: &mut Child,
        timeout: Option<Duration>,
    ) -> Result<ExitStatus, OcrError> {
        let Some(timeout) = timeout else {
            return Ok(child.wait()?);
        };

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(OcrError::Timeout(timeout));
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new(None, "eng", 3)
    }
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn is_available(&self) -> bool {
        let result = Command::new(&self.binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        matches!(result, Ok(status) if status.success())
    }

    fn recognize(
        &self,
        frame: &Frame,
        timeout: Option<Duration>,
    ) -> Result<Vec<OcrToken>, OcrError> {
        Self::validate_language(&self.language)?;

        let work_dir = tempfile::Builder::new()
            .prefix("capture_book_ocr")
            .tempdir()?;
        let input_path = work_dir.path().join("frame.png");
        let output_base = work_dir.path().join("out");
        let stderr_path = work_dir.path().join("stderr.log");

        frame.to_image()?.save(&input_path)?;

        let mut child = Command::new(&self.binary)
            .arg(&input_path)
            .arg(&output_base)
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg(self.page_segmentation_mode.to_string())
            .arg("tsv")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(File::create(&stderr_path)?))
            .spawn()
            .map_err(|e| OcrError::EngineUnavailable(format!("Failed to run tesseract: {}", e)))?;

        let status = Self::wait_with_timeout(&mut child, timeout)?;
        if !status.success() {
            let stderr = std::fs::read_to_string(&stderr_path).unwrap_or_default();
            return Err(OcrError::Processing(format!(
                "Tesseract failed ({}): {}",
                status,
                stderr.trim()
            )));
        }

        let tsv = std::fs::read_to_string(output_base.with_extension("tsv"))?;
        let tokens = parse_tsv(&tsv)?;
        debug!("tesseract: frame {} -> {} raw words", frame.index, tokens.len());
        Ok(tokens)
    }
}

/// 解析 tesseract TSV，只保留 level 5（单词）行
pub fn parse_tsv(tsv: &str) -> Result<Vec<OcrToken>, OcrError> {
    let mut lines = tsv.lines();
    let header = lines
        .next()
        .ok_or_else(|| OcrError::Parse("empty TSV output".to_string()))?;
    if !header.starts_with("level") {
        return Err(OcrError::Parse(format!("unexpected TSV header: {}", header)));
    }

    let mut tokens = Vec::new();
    for (line_no, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let cols: Vec<&str> = line.splitn(12, '\t').collect();
        if cols.len() < 11 {
            return Err(OcrError::Parse(format!(
                "row {} has {} columns",
                line_no + 2,
                cols.len()
            )));
        }
        if cols[0] != "5" {
            continue;
        }

        let num = |i: usize| -> Result<u32, OcrError> {
            cols[i].trim().parse::<i64>().map(|v| v.max(0) as u32).map_err(|_| {
                OcrError::Parse(format!("row {} column {}: {:?}", line_no + 2, i, cols[i]))
            })
        };
        let confidence = cols[10].trim().parse::<f32>().map_err(|_| {
            OcrError::Parse(format!("row {} confidence: {:?}", line_no + 2, cols[10]))
        })?;
        let text = cols.get(11).copied().unwrap_or("");

        tokens.push(OcrToken::new(
            text,
            PixelBox::new(num(6)?, num(7)?, num(8)?, num(9)?),
            confidence,
        ));
    }
    Ok(tokens)
}

type Responder = dyn Fn(&Frame) -> Result<Vec<OcrToken>, OcrError> + Send + Sync;

/// 测试/离线用的确定性引擎
pub struct MockOcrEngine {
    available: bool,
    responder: Box<Responder>,
}

impl MockOcrEngine {
    pub fn new() -> Self {
        Self::with_tokens(Vec::new())
    }

    /// Every frame yields the same tokens.
    pub fn with_tokens(tokens: Vec<OcrToken>) -> Self {
        Self {
            available: true,
            responder: Box::new(move |_| Ok(tokens.clone())),
        }
    }

    pub fn with_pattern<F>(pattern: F) -> Self
    where
        F: Fn(&Frame) -> Vec<OcrToken> + Send + Sync + 'static,
    {
        Self {
            available: true,
            responder: Box::new(move |frame| Ok(pattern(frame))),
        }
    }

    /// Frames whose sequence index is listed fail; the rest yield `tokens`.
    pub fn failing_on(indices: Vec<u64>, tokens: Vec<OcrToken>) -> Self {
        Self {
            available: true,
            responder: Box::new(move |frame| {
                if indices.contains(&frame.index) {
                    Err(OcrError::Processing(format!(
                        "mock failure on frame {}",
                        frame.index
                    )))
                } else {
                    Ok(tokens.clone())
                }
            }),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            responder: Box::new(|_| {
                Err(OcrError::EngineUnavailable("mock engine offline".to_string()))
            }),
        }
    }
}

impl Default for MockOcrEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrEngine for MockOcrEngine {
    fn name(&self) -> &str {
        "mock"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn recognize(
        &self,
        frame: &Frame,
        _timeout: Option<Duration>,
    ) -> Result<Vec<OcrToken>, OcrError> {
        if !self.available {
            warn!("mock OCR engine called while unavailable");
        }
        (self.responder)(frame)
    }
}
