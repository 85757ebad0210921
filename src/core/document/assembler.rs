use super::error::AssembleError;
use super::page::{Document, DocumentMetadata, Page};
use super::pdf::{write_atomic, DocumentWriter};
use log::{debug, info};
use std::path::Path;

/// 页面 + 元数据 → 文档；写出委托给 `DocumentWriter`
pub struct DocumentAssembler {
    writer: Box<dyn DocumentWriter>,
}

impl DocumentAssembler {
    pub fn new(writer: Box<dyn DocumentWriter>) -> Self {
        Self { writer }
    }

    pub fn assemble(
        &self,
        pages: Vec<Page>,
        metadata: DocumentMetadata,
        search_layer: bool,
    ) -> Result<Document, AssembleError> {
        assemble(pages, metadata, search_layer)
    }

    pub fn write(&self, document: &Document, destination: &Path) -> Result<u64, AssembleError> {
        let bytes = write_atomic(self.writer.as_ref(), document, destination)?;
        info!(
            "📄 Wrote {} ({} pages, {} bytes)",
            destination.display(),
            document.page_count(),
            bytes
        );
        Ok(bytes)
    }
}

pub fn assemble(
    pages: Vec<Page>,
    metadata: DocumentMetadata,
    search_layer: bool,
) -> Result<Document, AssembleError> {
    if pages.is_empty() {
        return Err(AssembleError::NoPages);
    }
    for (i, page) in pages.iter().enumerate() {
        debug!(
            "Page {}: {:.1}x{:.1} pt, {} runs",
            i,
            page.width_pt,
            page.height_pt,
            page.runs.len()
        );
    }
    Ok(Document::new(pages, metadata, search_layer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::RasterEncoding;
    use crate::core::document::pdf::{inspect_pdf, PdfWriter};
    use image::RgbaImage;

    #[test]
    fn test_zero_pages_is_fatal() {
        assert!(matches!(
            assemble(Vec::new(), DocumentMetadata::default(), true),
            Err(AssembleError::NoPages)
        ));
    }

    #[test]
    fn test_assemble_and_write() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.pdf");
        let assembler =
            DocumentAssembler::new(Box::new(PdfWriter::new(&RasterEncoding::default(), None)));
        let pages = (0..3)
            .map(|_| Page::from_raster(RgbaImage::new(48, 48), 96.0, Vec::new()))
            .collect();

        let document = assembler
            .assemble(pages, DocumentMetadata::new("Three"), false)
            .unwrap();
        assert!(!document.search_layer());
        let bytes = assembler.write(&document, &dest).unwrap();

        assert!(bytes > 0);
        assert_eq!(inspect_pdf(&dest).unwrap().page_count(), 3);
    }
}
