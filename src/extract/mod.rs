//! Multi-format text extraction.
//!
//! Dispatch is by file-name suffix (case-insensitive) through an
//! [`ExtractorRegistry`]. Each handler implements [`Extractor`] and returns
//! plain UTF-8 text or an [`ExtractError`]; it never panics and keeps its file
//! handles inside the call.
//!
//! | Suffix | Handler |
//! |--------|---------|
//! | `txt`, `md` | [`PlainTextExtractor`] |
//! | `pdf` | [`PdfExtractor`] |
//! | `docx` | [`ooxml::DocxExtractor`] |
//! | `pptx` | [`ooxml::PptxExtractor`] |
//! | `xlsx` | [`ooxml::XlsxExtractor`] |
//! | `csv` | [`tabular::CsvExtractor`] |
//! | `doc` | [`legacy::LegacyExtractor::word`] |
//! | `ppt` | [`legacy::LegacyExtractor::powerpoint`] |
//!
//! Callers that only need "text or nothing" use [`extract`] (or
//! [`ExtractorRegistry::extract`]); failures are logged and collapse to
//! `None` so one bad file never stops a batch.

pub mod legacy;
pub mod ooxml;
pub mod tabular;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use thiserror::Error;

/// Extraction failure for a single file.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("file is {size} bytes, over the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
    #[error("tabular extraction failed: {0}")]
    Tabular(String),
    #[error("legacy document extraction failed: {0}")]
    Legacy(String),
}

/// A handler that turns one file into plain text.
pub trait Extractor: Send + Sync {
    /// Short handler name used in logs.
    fn name(&self) -> &'static str;

    fn extract(&self, path: &Path) -> Result<String, ExtractError>;
}

pub(crate) fn read_bytes(path: &Path) -> Result<Vec<u8>, ExtractError> {
    std::fs::read(path).map_err(|source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// `.txt` / `.md`: the file's bytes decoded as UTF-8, invalid sequences replaced.
pub struct PlainTextExtractor;

impl Extractor for PlainTextExtractor {
    fn name(&self) -> &'static str {
        "text"
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let bytes = read_bytes(path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// `.pdf`: text of every page, pages separated by a newline.
pub struct PdfExtractor;

impl Extractor for PdfExtractor {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let bytes = read_bytes(path)?;
        pdf_text(&bytes)
    }
}

/// Extracts text from PDF bytes.
///
/// The underlying parser can panic on some malformed inputs; a panic is
/// reported as [`ExtractError::Pdf`].
pub fn pdf_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let result = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes));
    match result {
        Ok(Ok(pages)) => Ok(pages
            .iter()
            .map(|page| page.trim_end_matches('\n'))
            .collect::<Vec<_>>()
            .join("\n")),
        Ok(Err(e)) => Err(ExtractError::Pdf(e.to_string())),
        Err(panic) => {
            let msg = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "parser panicked".to_string());
            Err(ExtractError::Pdf(msg))
        }
    }
}

/// Lowercased suffix of the file name, without the dot.
///
/// Dot-files without a further dot (`.env`) have no suffix.
pub fn suffix_of(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Suffix → handler table.
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    handlers: HashMap<String, Arc<dyn Extractor>>,
    max_file_bytes: Option<u64>,
}

impl ExtractorRegistry {
    /// An empty registry. Every file is unsupported until handlers are registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard table covering every supported document format.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let text: Arc<dyn Extractor> = Arc::new(PlainTextExtractor);
        registry.register_shared("txt", text.clone());
        registry.register_shared("md", text);
        registry.register("pdf", PdfExtractor);
        registry.register("docx", ooxml::DocxExtractor);
        registry.register("pptx", ooxml::PptxExtractor);
        registry.register("xlsx", ooxml::XlsxExtractor);
        registry.register("csv", tabular::CsvExtractor);
        registry.register("doc", legacy::LegacyExtractor::word());
        registry.register("ppt", legacy::LegacyExtractor::powerpoint());
        registry
    }

    /// Files larger than `limit` bytes fail with [`ExtractError::TooLarge`].
    pub fn with_max_file_bytes(mut self, limit: Option<u64>) -> Self {
        self.max_file_bytes = limit;
        self
    }

    /// Registers (or replaces) the handler for `suffix`.
    pub fn register<E: Extractor + 'static>(&mut self, suffix: &str, handler: E) {
        self.register_shared(suffix, Arc::new(handler));
    }

    pub fn register_shared(&mut self, suffix: &str, handler: Arc<dyn Extractor>) {
        let key = suffix.trim_start_matches('.').to_ascii_lowercase();
        self.handlers.insert(key, handler);
    }

    /// Registered suffixes, sorted.
    pub fn suffixes(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.handlers.keys().map(|s| s.as_str()).collect();
        out.sort_unstable();
        out
    }

    pub fn handler_for(&self, path: &Path) -> Option<&dyn Extractor> {
        let suffix = suffix_of(path)?;
        self.handlers.get(&suffix).map(|h| h.as_ref())
    }

    pub fn supports(&self, path: &Path) -> bool {
        self.handler_for(path).is_some()
    }

    /// Runs the matching handler. `Ok(None)` means no handler is registered
    /// for the file's suffix.
    pub fn extract_file(&self, path: &Path) -> Result<Option<String>, ExtractError> {
        let Some(handler) = self.handler_for(path) else {
            return Ok(None);
        };
        if let Some(limit) = self.max_file_bytes {
            let size = std::fs::metadata(path)
                .map_err(|source| ExtractError::Io {
                    path: path.to_path_buf(),
                    source,
                })?
                .len();
            if size > limit {
                return Err(ExtractError::TooLarge { size, limit });
            }
        }
        handler.extract(path).map(Some)
    }

    /// Text of the file, or `None` when the suffix is unsupported, the handler
    /// failed, or the text is blank.
    pub fn extract(&self, path: &Path) -> Option<String> {
        match self.extract_file(path) {
            Ok(Some(text)) if !text.trim().is_empty() => Some(text),
            Ok(Some(_)) => {
                tracing::info!(path = %path.display(), "no text extracted");
                None
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "extraction failed");
                None
            }
        }
    }
}

fn default_registry() -> &'static ExtractorRegistry {
    static DEFAULT: OnceLock<ExtractorRegistry> = OnceLock::new();
    DEFAULT.get_or_init(ExtractorRegistry::with_defaults)
}

/// Extracts text from `path` with the default handler table.
pub fn extract(path: &Path) -> Option<String> {
    default_registry().extract(path)
}
