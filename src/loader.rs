//! PDF text extraction.
//!
//! Pages are read one at a time with `lopdf` so chunks can carry a page
//! number. Some PDFs (unusual font encodings, text in form XObjects) yield
//! nothing that way; for those the whole document goes through
//! `pdf-extract` and is returned as a single page.

use std::path::Path;
use thiserror::Error;

/// Cleaned text of one PDF page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    /// 1-based page number
    pub page: u32,
    pub text: String,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read PDF {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse PDF: {0}")]
    Parse(String),
}

/// Extract per-page text from the PDF at `path`.
///
/// Blocking; call from `spawn_blocking` in async code.
pub fn load_pdf(path: &Path) -> Result<Vec<PageText>, LoadError> {
    let data = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    load_pdf_bytes(&data)
}

pub fn load_pdf_bytes(data: &[u8]) -> Result<Vec<PageText>, LoadError> {
    let doc = lopdf::Document::load_mem(data).map_err(|e| LoadError::Parse(e.to_string()))?;

    let mut pages = Vec::new();
    for page_num in doc.get_pages().keys().copied() {
        match doc.extract_text(&[page_num]) {
            Ok(raw) => {
                let text = clean_text(&raw);
                if !text.is_empty() {
                    pages.push(PageText {
                        page: page_num,
                        text,
                    });
                }
            }
            Err(e) => {
                tracing::debug!("Could not extract text from page {page_num}: {e}");
            }
        }
    }

    if pages.is_empty() {
        tracing::debug!("Per-page extraction found no text, trying pdf-extract");
        match pdf_extract::extract_text_from_mem(data) {
            Ok(raw) => {
                let text = clean_text(&raw);
                if !text.is_empty() {
                    pages.push(PageText { page: 1, text });
                }
            }
            Err(e) => {
                tracing::warn!("pdf-extract failed: {e}");
            }
        }
    }

    if pages.is_empty() {
        tracing::warn!("No text could be extracted; the PDF may be image-only");
    }

    Ok(pages)
}

/// Strip NULs, trim each line and drop blank ones.
fn clean_text(raw: &str) -> String {
    raw.replace('\0', "")
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
