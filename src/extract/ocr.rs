//! Optical character recognition for image-only pages.
//!
//! [`OcrEngine`] is the seam the extraction engine talks to. The shipped
//! implementation, [`TesseractOcr`], rasterises one page with `pdftoppm`
//! (poppler) into a temporary PNG and runs `tesseract` on it. Both tools are
//! optional system dependencies; when either is missing the engine reports
//! itself unavailable and extraction degrades to the text layer.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::ExtractionConfig;
use crate::error::ExtractError;

/// Recognises the text of a single rendered PDF page.
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the engine can run at all on this host.
    fn is_available(&self) -> bool;

    /// Text of page `page` (1-based) rendered at `dpi`.
    fn recognize_page(&self, pdf_path: &Path, page: u32, dpi: u32)
        -> Result<String, ExtractError>;
}

/// `pdftoppm` + `tesseract` command-line OCR.
pub struct TesseractOcr {
    tesseract_bin: String,
    pdftoppm_bin: String,
    language: String,
}

impl TesseractOcr {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            tesseract_bin: config.tesseract_bin.clone(),
            pdftoppm_bin: config.pdftoppm_bin.clone(),
            language: config.ocr_language.clone(),
        }
    }

    fn render_page(
        &self,
        pdf_path: &Path,
        page: u32,
        dpi: u32,
        out_dir: &Path,
    ) -> Result<PathBuf, ExtractError> {
        let prefix = out_dir.join("page");
        let page_arg = page.to_string();
        let output = Command::new(&self.pdftoppm_bin)
            .args(["-r", &dpi.to_string()])
            .args(["-f", &page_arg, "-l", &page_arg])
            .args(["-png", "-singlefile"])
            .arg(pdf_path)
            .arg(&prefix)
            .output()
            .map_err(|e| {
                ExtractError::OcrUnavailable(format!(
                    "failed to execute '{}': {}",
                    self.pdftoppm_bin, e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractError::Ocr(format!(
                "pdftoppm failed on page {}: {}",
                page,
                stderr.trim()
            )));
        }

        Ok(prefix.with_extension("png"))
    }
}

fn command_runs(bin: &str, flag: &str) -> bool {
    Command::new(bin)
        .arg(flag)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

impl OcrEngine for TesseractOcr {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn is_available(&self) -> bool {
        command_runs(&self.tesseract_bin, "--version") && command_runs(&self.pdftoppm_bin, "-v")
    }

    fn recognize_page(&self, pdf_path: &Path, page: u32, dpi: u32) -> Result<String, ExtractError> {
        let scratch = tempfile::TempDir::new()?;
        let image = self.render_page(pdf_path, page, dpi, scratch.path())?;

        let output = Command::new(&self.tesseract_bin)
            .arg(&image)
            .arg("stdout")
            .args(["-l", &self.language])
            .output()
            .map_err(|e| {
                ExtractError::OcrUnavailable(format!(
                    "failed to execute '{}': {}",
                    self.tesseract_bin, e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractError::Ocr(format!(
                "tesseract failed on page {}: {}",
                page,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
