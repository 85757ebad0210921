//! 文档组装：页面位图 + 不可见文字层 → 可搜索 PDF（lopdf）

pub mod assembler;
pub mod codec;
pub mod encoding;
pub mod error;
pub mod page;
pub mod pdf;

pub use assembler::{assemble, DocumentAssembler};
pub use codec::{encoder_for, prepare_raster, EncodedRaster, JpegEncoder, LosslessEncoder, RasterEncoder};
pub use error::AssembleError;
pub use page::{Document, DocumentMetadata, Page};
pub use pdf::{inspect_pdf, inspect_pdf_bytes, write_atomic, DocumentWriter, PageSummary, PdfSummary, PdfWriter};
