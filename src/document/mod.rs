// Document parsing module
// Turns files on disk into ordered, page-numbered text

#[cfg(test)]
mod tests;

use std::path::Path;

use async_trait::async_trait;
use tokio::task;
use tracing::{debug, warn};

use crate::{Result, SynapseError};

/// A page of extracted text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number
    pub number: usize,
    pub text: String,
}

/// Extracts pages from a document on disk
#[async_trait]
pub trait DocumentParser: Send + Sync {
    /// Parse `path` into pages. Failures are reported as
    /// [`SynapseError::UnreadableDocument`].
    async fn parse(&self, path: &Path) -> Result<Vec<Page>>;
}

/// PDF text extraction via `pdf-extract`
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfParser;

/// UTF-8 text files, returned as a single page
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextParser;

/// Picks a parser from the file extension
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionParser;

#[async_trait]
impl DocumentParser for PdfParser {
    async fn parse(&self, path: &Path) -> Result<Vec<Page>> {
        let bytes = read_document(path).await?;
        let display = path.display().to_string();

        task::spawn_blocking(move || extract_pdf_pages(&bytes))
            .await
            .map_err(|e| unreadable(path, format!("extraction task failed: {}", e)))?
            .map_err(|reason| SynapseError::UnreadableDocument {
                path: display,
                reason,
            })
    }
}

#[async_trait]
impl DocumentParser for PlainTextParser {
    async fn parse(&self, path: &Path) -> Result<Vec<Page>> {
        let bytes = read_document(path).await?;
        let text =
            String::from_utf8(bytes).map_err(|e| unreadable(path, format!("not UTF-8: {}", e)))?;

        Ok(vec![Page { number: 1, text }])
    }
}

#[async_trait]
impl DocumentParser for ExtensionParser {
    async fn parse(&self, path: &Path) -> Result<Vec<Page>> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => PdfParser.parse(path).await,
            "txt" | "text" | "md" | "markdown" => PlainTextParser.parse(path).await,
            other => Err(unreadable(
                path,
                format!("unsupported file type '{}'", other),
            )),
        }
    }
}

/// Extract the text of each PDF page.
///
/// Page numbers follow the page order in the file, so blank pages leave gaps
/// rather than shifting later pages.
#[inline]
pub fn extract_pdf_pages(bytes: &[u8]) -> std::result::Result<Vec<Page>, String> {
    let texts = pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| e.to_string())?;
    let pages = number_pages(texts);

    if pages.is_empty() {
        warn!("PDF contained no extractable text (scanned or image-only?)");
    } else {
        debug!("Extracted {} pages of text from PDF", pages.len());
    }

    Ok(pages)
}

/// Number page texts from 1, dropping blank pages
#[inline]
pub fn number_pages<I, S>(texts: I) -> Vec<Page>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    texts
        .into_iter()
        .enumerate()
        .filter_map(|(i, text)| {
            let text = text.as_ref().trim();
            (!text.is_empty()).then(|| Page {
                number: i + 1,
                text: text.to_string(),
            })
        })
        .collect()
}

async fn read_document(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|e| unreadable(path, e.to_string()))
}

fn unreadable(path: &Path, reason: String) -> SynapseError {
    SynapseError::UnreadableDocument {
        path: path.display().to_string(),
        reason,
    }
}
