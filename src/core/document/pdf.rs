use super::codec::{encoder_for, prepare_raster, EncodedRaster, LosslessEncoder, RasterEncoder};
use super::encoding::{decode_pdf_text_string, decode_win_ansi, encode_win_ansi, escape_literal, pdf_text_string};
use super::error::AssembleError;
use super::page::{Document, Page};
use crate::core::config::RasterEncoding;
use crate::core::layer::TextRun;
use log::warn;
use lopdf::content::Content;
use lopdf::{dictionary, Object, ObjectId, Stream, StringFormat};
use rayon::prelude::*;
use std::fs;
use std::io::Write;
use std::path::Path;

const FONT_NAME: &str = "F1";
const IMAGE_NAME: &str = "Im0";
/// Helvetica 平均字宽约 0.5em，用于估算水平缩放
const AVG_GLYPH_WIDTH: f32 = 0.5;
const MIN_HORIZONTAL_SCALE: f32 = 10.0;
const MAX_HORIZONTAL_SCALE: f32 = 400.0;

/// 分页文档写出接口
pub trait DocumentWriter: Send + Sync {
    fn write(&self, document: &Document, out: &mut dyn Write) -> Result<u64, AssembleError>;
}

pub struct PdfWriter {
    encoder: Box<dyn RasterEncoder>,
    raster_dpi: Option<f32>,
}

impl PdfWriter {
    pub fn new(encoding: &RasterEncoding, raster_dpi: Option<f32>) -> Self {
        Self {
            encoder: encoder_for(encoding),
            raster_dpi,
        }
    }

    pub fn with_encoder(encoder: Box<dyn RasterEncoder>) -> Self {
        Self {
            encoder,
            raster_dpi: None,
        }
    }

    fn build(&self, document: &Document) -> Result<lopdf::Document, AssembleError> {
        let rasters: Vec<EncodedRaster> = document
            .pages()
            .par_iter()
            .map(|page| {
                let rgb = prepare_raster(&page.image, page.width_pt, page.height_pt, self.raster_dpi);
                match self.encoder.max_dimension() {
                    Some(limit) if rgb.width() > limit || rgb.height() > limit => {
                        warn!(
                            "⚠️ Page raster {}x{} exceeds {} limit {}, embedding lossless",
                            rgb.width(),
                            rgb.height(),
                            self.encoder.name(),
                            limit
                        );
                        LosslessEncoder.encode(&rgb)
                    }
                    _ => self.encoder.encode(&rgb),
                }
            })
            .collect::<Result<_, AssembleError>>()?;

        let mut pdf = lopdf::Document::with_version("1.5");
        let pages_id = pdf.new_object_id();
        let font_id = pdf.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });

        let mut kids = Vec::with_capacity(document.page_count());
        for (page, raster) in document.pages().iter().zip(rasters) {
            let image_id = pdf.add_object(image_stream(raster)?);
            let content_id = pdf.add_object(Stream::new(dictionary! {}, page_content(page)));
            let page_id = pdf.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => Object::Reference(pages_id),
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(page.width_pt),
                    Object::Real(page.height_pt),
                ],
                "Contents" => Object::Reference(content_id),
                "Resources" => dictionary! {
                    "Font" => dictionary! { FONT_NAME => Object::Reference(font_id) },
                    "XObject" => dictionary! { IMAGE_NAME => Object::Reference(image_id) },
                },
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        pdf.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => Object::Integer(count),
            }),
        );

        let catalog_id = pdf.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        let info_id = pdf.add_object(info_dictionary(document));
        pdf.trailer.set("Root", Object::Reference(catalog_id));
        pdf.trailer.set("Info", Object::Reference(info_id));
        Ok(pdf)
    }
}

impl DocumentWriter for PdfWriter {
    fn write(&self, document: &Document, out: &mut dyn Write) -> Result<u64, AssembleError> {
        let mut pdf = self.build(document)?;
        let mut buf = Vec::new();
        pdf.save_to(&mut buf)?;
        out.write_all(&buf)?;
        Ok(buf.len() as u64)
    }
}

fn text_string(text: &str) -> Object {
    Object::String(pdf_text_string(text), StringFormat::Literal)
}

fn info_dictionary(document: &Document) -> lopdf::Dictionary {
    let metadata = document.metadata();
    let mut info = dictionary! {
        "Title" => text_string(&metadata.title),
        "Author" => text_string(&metadata.author),
        "Creator" => text_string(&metadata.creator),
        "Producer" => text_string(&metadata.creator),
        "CreationDate" => Object::string_literal(metadata.pdf_date()),
    };
    if let Some(subject) = &metadata.subject {
        info.set("Subject", text_string(subject));
    }
    info
}

fn image_stream(raster: EncodedRaster) -> Result<Stream, AssembleError> {
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => Object::Integer(raster.width as i64),
        "Height" => Object::Integer(raster.height as i64),
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => Object::Integer(8),
    };
    if let Some(filter) = raster.filter {
        dict.set("Filter", Object::Name(filter.as_bytes().to_vec()));
    }

    let raw = raster.is_raw();
    let mut stream = Stream::new(dict, raster.bytes);
    if raw {
        stream.compress()?;
    }
    Ok(stream)
}

/// 估算 Tz，让可选中的文字宽度大致覆盖 OCR 框
fn horizontal_scale(run: &TextRun) -> f32 {
    let chars = run.text.chars().count().max(1) as f32;
    let natural = chars * run.font_size * AVG_GLYPH_WIDTH;
    if natural <= 0.0 || run.width <= 0.0 {
        return 100.0;
    }
    (run.width / natural * 100.0).clamp(MIN_HORIZONTAL_SCALE, MAX_HORIZONTAL_SCALE)
}

/// 位图铺满页面，文字用渲染模式 3（不可见但可选中）叠加
fn page_content(page: &Page) -> Vec<u8> {
    let mut ops = format!(
        "q\n{:.3} 0 0 {:.3} 0 0 cm\n/{} Do\nQ\n",
        page.width_pt, page.height_pt, IMAGE_NAME
    )
    .into_bytes();

    if page.runs.is_empty() {
        return ops;
    }

    ops.extend_from_slice(b"BT\n3 Tr\n");
    for run in &page.runs {
        // PDF 原点在左下
        let y = page.height_pt - run.baseline;
        ops.extend_from_slice(
            format!(
                "/{} {:.2} Tf\n{:.2} Tz\n1 0 0 1 {:.3} {:.3} Tm\n(",
                FONT_NAME,
                run.font_size,
                horizontal_scale(run),
                run.x,
                y
            )
            .as_bytes(),
        );
        ops.extend_from_slice(&escape_literal(&encode_win_ansi(&run.text)));
        ops.extend_from_slice(b") Tj\n");
    }
    ops.extend_from_slice(b"ET\n");
    ops
}

/// 读回的单页信息
#[derive(Debug, Clone, PartialEq)]
pub struct PageSummary {
    pub width_pt: f32,
    pub height_pt: f32,
    pub texts: Vec<String>,
    /// 所有文字都以渲染模式 3 绘制
    pub invisible_text: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PdfSummary {
    pub title: Option<String>,
    pub pages: Vec<PageSummary>,
}

impl PdfSummary {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

pub fn inspect_pdf<P: AsRef<Path>>(path: P) -> Result<PdfSummary, AssembleError> {
    let bytes = fs::read(path)?;
    inspect_pdf_bytes(&bytes)
}

pub fn inspect_pdf_bytes(bytes: &[u8]) -> Result<PdfSummary, AssembleError> {
    let pdf = lopdf::Document::load_mem(bytes)?;

    let pages = pdf
        .get_pages()
        .into_values()
        .map(|page_id| summarize_page(&pdf, page_id))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PdfSummary {
        title: read_title(&pdf),
        pages,
    })
}

fn read_title(pdf: &lopdf::Document) -> Option<String> {
    let info_id = pdf.trailer.get(b"Info").ok()?.as_reference().ok()?;
    match pdf.get_dictionary(info_id).ok()?.get(b"Title").ok()? {
        Object::String(bytes, _) => Some(decode_pdf_text_string(bytes)),
        _ => None,
    }
}

fn number(object: &Object) -> f32 {
    match object {
        Object::Integer(i) => *i as f32,
        Object::Real(f) => *f,
        _ => 0.0,
    }
}

fn summarize_page(pdf: &lopdf::Document, page_id: ObjectId) -> Result<PageSummary, AssembleError> {
    let dict = pdf.get_dictionary(page_id)?;
    let media_box = dict.get(b"MediaBox")?.as_array()?;
    let (width_pt, height_pt) = match media_box.as_slice() {
        [x0, y0, x1, y1] => (number(x1) - number(x0), number(y1) - number(y0)),
        _ => (0.0, 0.0),
    };

    let content_id = dict.get(b"Contents")?.as_reference()?;
    let stream = pdf.get_object(content_id)?.as_stream()?;
    let raw = if stream.dict.get(b"Filter").is_ok() {
        stream.decompressed_content()?
    } else {
        stream.content.clone()
    };
    let content = Content::decode(&raw)?;

    let mut texts = Vec::new();
    let mut render_mode = 0;
    let mut invisible_text = true;
    for op in &content.operations {
        match (op.operator.as_str(), op.operands.as_slice()) {
            ("Tr", [mode]) => render_mode = number(mode) as i64,
            ("Tj", [Object::String(bytes, _)]) => {
                invisible_text &= render_mode == 3;
                texts.push(decode_win_ansi(bytes));
            }
            _ => {}
        }
    }

    Ok(PageSummary {
        width_pt,
        height_pt,
        texts,
        invisible_text,
    })
}

/// 先写到目标目录下的临时文件，成功后再改名；失败时临时文件随之删除
pub fn write_atomic(
    writer: &dyn DocumentWriter,
    document: &Document,
    destination: &Path,
) -> Result<u64, AssembleError> {
    let parent = match destination.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !parent.is_dir() {
        return Err(AssembleError::InvalidDestination(format!(
            "{} is not a directory",
            parent.display()
        )));
    }
    if destination.is_dir() {
        return Err(AssembleError::InvalidDestination(format!(
            "{} is a directory",
            destination.display()
        )));
    }

    let mut tmp = tempfile::Builder::new()
        .prefix(".capture_book-")
        .suffix(".pdf.tmp")
        .tempfile_in(parent)?;
    let bytes = writer.write(document, tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(destination)?;
    Ok(bytes)
}
