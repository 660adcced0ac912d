//! PDF text layer.
//!
//! The primary extractor is `pdf-extract`, which follows layout and font
//! encodings. It can fail (or panic) on malformed files, in which case the
//! simpler per-page content-stream extractor from `lopdf` is used instead.
//! Page-level access (counts, single pages, ranges) always goes through
//! `lopdf`.

use lopdf::Document;
use tracing::{debug, warn};

use crate::error::ExtractError;

/// Whole-document text: layout-aware extractor first, page-stream fallback.
pub fn extract_text(bytes: &[u8]) -> Result<String, ExtractError> {
    match extract_layout_text(bytes) {
        Ok(text) => Ok(text),
        Err(e) => {
            warn!(error = %e, "Layout-aware PDF extraction failed, using page streams");
            Ok(extract_pages(bytes)?.join("\n"))
        }
    }
}

fn extract_layout_text(bytes: &[u8]) -> Result<String, ExtractError> {
    // pdf-extract panics on some malformed inputs
    match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(result) => result.map_err(|e| ExtractError::Pdf(e.to_string())),
        Err(_) => Err(ExtractError::Pdf("pdf-extract panicked".to_string())),
    }
}

fn load(bytes: &[u8]) -> Result<Document, ExtractError> {
    Document::load_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

/// Number of pages in the document.
pub fn page_count(bytes: &[u8]) -> Result<u32, ExtractError> {
    Ok(load(bytes)?.get_pages().len() as u32)
}

/// Text of every page in order. A page whose stream cannot be decoded
/// contributes an empty string.
pub fn extract_pages(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    let doc = load(bytes)?;
    let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
    debug!(pages = pages.len(), "Extracting PDF page streams");

    Ok(pages
        .into_iter()
        .map(|page| {
            doc.extract_text(&[page]).unwrap_or_else(|e| {
                warn!(page, error = %e, "Page text extraction failed");
                String::new()
            })
        })
        .collect())
}

/// Text of pages `start..=end` (zero-based, clamped to the document).
/// An empty range yields an empty string.
pub fn extract_page_range(bytes: &[u8], start: u32, end: u32) -> Result<String, ExtractError> {
    let pages = extract_pages(bytes)?;
    let Some(last) = pages.len().checked_sub(1) else {
        return Ok(String::new());
    };
    let end = (end as usize).min(last);
    let start = start as usize;
    if start > end {
        return Ok(String::new());
    }

    let mut text = String::new();
    for page in &pages[start..=end] {
        text.push_str(page);
        text.push('\n');
    }
    Ok(text)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_pages() {
        let pdf = test_pdf::with_pages(&["one", "two", "three"]);
        assert_eq!(page_count(&pdf).unwrap(), 3);
    }

    #[test]
    fn extracts_text_layer() {
        let pdf = test_pdf::with_pages(&["valve maintenance schedule"]);
        let text = extract_text(&pdf).unwrap();
        assert!(text.contains("valve maintenance schedule"), "got: {:?}", text);
    }

    #[test]
    fn pages_are_separate() {
        let pdf = test_pdf::with_pages(&["first page", "second page"]);
        let pages = extract_pages(&pdf).unwrap();
        assert_eq!(pages.len(), 2);
        assert!(pages[0].contains("first page"));
        assert!(pages[1].contains("second page"));
    }

    #[test]
    fn page_range_is_clamped() {
        let pdf = test_pdf::with_pages(&["alpha", "beta", "gamma"]);
        let text = extract_page_range(&pdf, 1, 99).unwrap();
        assert!(!text.contains("alpha"));
        assert!(text.contains("beta"));
        assert!(text.contains("gamma"));
        assert_eq!(extract_page_range(&pdf, 5, 9).unwrap(), "");
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(extract_text(b"not a pdf at all").is_err());
        assert!(page_count(b"not a pdf at all").is_err());
    }
}
