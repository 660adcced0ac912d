//! Extraction engine: source file → plain text.
//!
//! Digital PDFs are read through their text layer ([`pdf`]). When the text
//! layer is too thin the document is assumed to be scanned and each page is
//! run through an [`OcrEngine`] instead. Which path wins is decided by two
//! named heuristics, [`is_likely_scanned`] and [`prefer_ocr_text`].
//!
//! # Modes
//!
//! | Mode | Behaviour |
//! |------|-----------|
//! | `auto` | Whole-document text layer; OCR every page if below `min_text_length`, keep the longer result |
//! | `hybrid` | Per page: text layer, OCR only the pages below `min_text_length` |
//! | `text_only` | Never OCR |
//!
//! Extraction never fails outright: unreadable input yields an empty string
//! and callers reject it via [`Extractor::extract_checked`]. Plain-text files
//! (`.txt`, `.md`) are decoded lossily as a single page.

pub mod ocr;
pub mod pdf;

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{ExtractionConfig, ExtractionMode};
use crate::error::ExtractError;
use crate::store::decode_lossy;

pub use ocr::{OcrEngine, TesseractOcr};

/// Which path produced the final text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    /// PDF text layer only.
    TextLayer,
    /// OCR of every page replaced the text layer.
    Ocr,
    /// Text layer with some pages replaced by OCR.
    Hybrid,
    /// Plain-text file.
    PlainText,
    /// Nothing could be read.
    Failed,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::TextLayer => "text_layer",
            ExtractionMethod::Ocr => "ocr",
            ExtractionMethod::Hybrid => "hybrid",
            ExtractionMethod::PlainText => "plain_text",
            ExtractionMethod::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub text: String,
    pub method: ExtractionMethod,
    pub page_count: Option<u32>,
    /// Characters of document content, excluding page markers and the
    /// separators between pages.
    content_chars: usize,
}

impl Extraction {
    fn failed() -> Self {
        Self {
            text: String::new(),
            method: ExtractionMethod::Failed,
            page_count: None,
            content_chars: 0,
        }
    }

    /// A single unbroken text, counted as-is.
    fn whole(text: String, method: ExtractionMethod, page_count: Option<u32>) -> Self {
        let content_chars = text.trim().chars().count();
        Self {
            text,
            method,
            page_count,
            content_chars,
        }
    }

    /// Pages joined under page markers; only the page texts count.
    fn paged(pages: &[String], method: ExtractionMethod) -> Self {
        Self {
            text: join_pages(pages),
            method,
            page_count: Some(pages.len() as u32),
            content_chars: pages.iter().map(|p| p.trim().chars().count()).sum(),
        }
    }

    /// Number of content characters. This is what the sufficiency check
    /// compares against `min_text_length`.
    pub fn char_count(&self) -> usize {
        self.content_chars
    }
}

/// Scan heuristic: text shorter than `min_text_length` characters (ignoring
/// surrounding whitespace) is assumed to come from an image-only document.
pub fn is_likely_scanned(text: &str, min_text_length: usize) -> bool {
    text.trim().chars().count() < min_text_length
}

/// Selection heuristic: OCR output replaces the original only when it is
/// strictly longer. Length is the sole quality signal, so noisy OCR can beat
/// sparse but correct text.
pub fn prefer_ocr_text(original: &str, ocr: &str) -> bool {
    ocr.trim().chars().count() > original.trim().chars().count()
}

/// Heading placed before each page's text when pages are joined.
pub fn page_marker(page: u32) -> String {
    format!("--- Page {} ---", page)
}

fn join_pages(pages: &[String]) -> String {
    pages
        .iter()
        .enumerate()
        .map(|(i, text)| format!("{}\n\n{}", page_marker(i as u32 + 1), text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn is_plain_text(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            ["txt", "md", "markdown"]
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

fn require_pdf(path: &Path) -> Result<(), ExtractError> {
    if is_plain_text(path) {
        return Err(ExtractError::UnsupportedFormat(format!(
            "{} has no pages",
            path.display()
        )));
    }
    Ok(())
}

pub struct Extractor {
    config: ExtractionConfig,
    ocr: Option<Arc<dyn OcrEngine>>,
}

impl Extractor {
    /// Extractor using the configured command-line OCR (if enabled).
    pub fn new(config: &ExtractionConfig) -> Self {
        let ocr: Option<Arc<dyn OcrEngine>> = if config.ocr_enabled {
            Some(Arc::new(TesseractOcr::new(config)))
        } else {
            None
        };
        Self {
            config: config.clone(),
            ocr,
        }
    }

    /// Extractor with a caller-supplied OCR engine.
    pub fn with_ocr_engine(config: &ExtractionConfig, engine: Arc<dyn OcrEngine>) -> Self {
        Self {
            config: config.clone(),
            ocr: Some(engine),
        }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Plain text of the document at `path`; empty when nothing is readable.
    pub fn extract(&self, path: &Path) -> String {
        self.extract_detailed(path).text
    }

    /// Like [`extract`](Self::extract) but fails with
    /// [`ExtractError::InsufficientContent`] when the result is below
    /// `min_text_length`.
    pub fn extract_checked(&self, path: &Path) -> Result<Extraction, ExtractError> {
        let extraction = self.extract_detailed(path);
        let chars = extraction.char_count();
        if chars < self.config.min_text_length {
            return Err(ExtractError::InsufficientContent {
                chars,
                threshold: self.config.min_text_length,
            });
        }
        Ok(extraction)
    }

    /// Text plus the method that produced it and the page count.
    pub fn extract_detailed(&self, path: &Path) -> Extraction {
        debug!(path = %path.display(), "Extracting document");

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read document");
                return Extraction::failed();
            }
        };

        if is_plain_text(path) {
            return Extraction::whole(decode_lossy(&bytes), ExtractionMethod::PlainText, Some(1));
        }

        let extraction = match self.config.mode {
            ExtractionMode::TextOnly => self.extract_text_layer(&bytes),
            ExtractionMode::Auto => self.extract_auto(path, &bytes),
            ExtractionMode::Hybrid => self.extract_hybrid(path, &bytes),
        };
        info!(
            path = %path.display(),
            method = extraction.method.as_str(),
            chars = extraction.char_count(),
            "Extraction finished"
        );
        extraction
    }

    /// Page count of a PDF. Plain-text inputs have no pages and fail with
    /// [`ExtractError::UnsupportedFormat`].
    pub fn page_count(&self, path: &Path) -> Result<u32, ExtractError> {
        require_pdf(path)?;
        pdf::page_count(&std::fs::read(path)?)
    }

    /// Text layer of pages `start..=end` (zero-based, clamped).
    pub fn extract_page_range(
        &self,
        path: &Path,
        start: u32,
        end: u32,
    ) -> Result<String, ExtractError> {
        require_pdf(path)?;
        pdf::extract_page_range(&std::fs::read(path)?, start, end)
    }

    fn extract_text_layer(&self, bytes: &[u8]) -> Extraction {
        let page_count = pdf::page_count(bytes).ok();
        match pdf::extract_text(bytes) {
            Ok(text) => Extraction::whole(text, ExtractionMethod::TextLayer, page_count),
            Err(e) => {
                warn!(error = %e, "No text layer could be extracted");
                Extraction {
                    page_count,
                    ..Extraction::failed()
                }
            }
        }
    }

    /// The OCR engine, if configured and runnable. Logs once per call when
    /// OCR was wanted but is missing.
    fn available_ocr(&self) -> Option<&dyn OcrEngine> {
        let engine = self.ocr.as_deref()?;
        if engine.is_available() {
            Some(engine)
        } else {
            warn!(
                engine = engine.name(),
                "OCR engine not available, continuing with text layer only"
            );
            None
        }
    }

    fn ocr_page(&self, engine: &dyn OcrEngine, path: &Path, page: u32) -> String {
        match engine.recognize_page(path, page, self.config.ocr_dpi) {
            Ok(text) => text,
            Err(e) => {
                warn!(page, error = %e, "OCR failed for page, skipping");
                String::new()
            }
        }
    }

    fn extract_auto(&self, path: &Path, bytes: &[u8]) -> Extraction {
        let original = self.extract_text_layer(bytes);
        if !is_likely_scanned(&original.text, self.config.min_text_length) {
            return original;
        }
        let Some(page_count) = original.page_count else {
            return original;
        };
        let Some(engine) = self.available_ocr() else {
            return original;
        };

        info!(
            chars = original.char_count(),
            threshold = self.config.min_text_length,
            pages = page_count,
            "Text layer below threshold, running OCR"
        );
        let pages: Vec<String> = (1..=page_count)
            .map(|page| self.ocr_page(engine, path, page))
            .collect();

        // Compare recognised text only; page markers would inflate the OCR side.
        if prefer_ocr_text(&original.text, &pages.concat()) {
            Extraction::paged(&pages, ExtractionMethod::Ocr)
        } else {
            original
        }
    }

    fn extract_hybrid(&self, path: &Path, bytes: &[u8]) -> Extraction {
        let pages = match pdf::extract_pages(bytes) {
            Ok(pages) => pages,
            Err(e) => {
                warn!(error = %e, "Per-page extraction unavailable, using whole-document mode");
                return self.extract_auto(path, bytes);
            }
        };
        let needs_ocr = pages
            .iter()
            .any(|text| is_likely_scanned(text, self.config.min_text_length));
        let engine = if needs_ocr { self.available_ocr() } else { None };

        let mut replaced = 0usize;
        let pages: Vec<String> = pages
            .into_iter()
            .enumerate()
            .map(|(i, text)| {
                let Some(engine) = engine else {
                    return text;
                };
                if !is_likely_scanned(&text, self.config.min_text_length) {
                    return text;
                }
                let ocr_text = self.ocr_page(engine, path, i as u32 + 1);
                if prefer_ocr_text(&text, &ocr_text) {
                    replaced += 1;
                    ocr_text
                } else {
                    text
                }
            })
            .collect();

        debug!(pages = pages.len(), replaced, "Hybrid extraction finished");
        let method = if replaced > 0 {
            ExtractionMethod::Hybrid
        } else {
            ExtractionMethod::TextLayer
        };
        Extraction::paged(&pages, method)
    }
}
