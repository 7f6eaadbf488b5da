use lopdf::Document;
use tracing::debug;

use crate::error::IngestError;

/// Text extracted from a single page, keyed by the page's zero-based index
/// in the source document.
#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    pub index: u32,
    pub text: String,
}

pub trait PdfExtractor {
    fn extract(&self, bytes: &[u8], filename: &str) -> Result<Vec<PageText>, IngestError>;
}

/// lopdf-backed extractor with a hard page ceiling counted from the first
/// page. Pages past the ceiling are ignored rather than rejected; pages
/// whose text trims to nothing are dropped without renumbering the rest.
#[derive(Debug, Clone, Copy)]
pub struct LopdfExtractor {
    max_pages: usize,
}

impl LopdfExtractor {
    pub fn new(max_pages: usize) -> Self {
        Self {
            max_pages: max_pages.max(1),
        }
    }
}

impl Default for LopdfExtractor {
    fn default() -> Self {
        Self::new(20)
    }
}

impl PdfExtractor for LopdfExtractor {
    fn extract(&self, bytes: &[u8], filename: &str) -> Result<Vec<PageText>, IngestError> {
        let document = Document::load_mem(bytes)
            .map_err(|error| IngestError::PdfParse(format!("{filename}: {error}")))?;

        let mut pages = Vec::new();
        for (index, (page_no, _object_id)) in document.get_pages().into_iter().enumerate() {
            if index >= self.max_pages {
                break;
            }

            let text = document.extract_text(&[page_no]).map_err(|error| {
                IngestError::PdfParse(format!("{filename} page {page_no}: {error}"))
            })?;

            let trimmed = text.trim();
            if trimmed.is_empty() {
                continue;
            }

            pages.push(PageText {
                index: index as u32,
                text: trimmed.to_string(),
            });
        }

        if pages.is_empty() {
            return Err(IngestError::EmptyPdf(filename.to_string()));
        }

        debug!(filename, pages = pages.len(), "extracted page text");
        Ok(pages)
    }
}
