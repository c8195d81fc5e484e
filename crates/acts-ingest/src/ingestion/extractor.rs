//! Document text extraction with the alphabet-marker quality gate
//!
//! Every genuine document of the target locale contains the marker
//! character, so its absence means the extraction produced garbage: a
//! scanned PDF without a text layer, a broken font encoding, or the wrong
//! decoder. PDFs get one OCR retry; every other route fails loudly.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::ExtractionConfig;
use crate::error::{Error, Result};

use super::engine::{TextEngine, ToolEngine};
use super::sniff::{sniff, ContentKind};

/// Turns stored document files into plain text
#[derive(Clone)]
pub struct Extractor {
    engine: Arc<dyn TextEngine>,
    marker: char,
    data_dir: PathBuf,
}

impl Extractor {
    /// Extractor backed by the external-tool engine
    pub fn new(config: &ExtractionConfig) -> Self {
        Self::with_engine(Arc::new(ToolEngine::new(config)), config)
    }

    pub fn with_engine(engine: Arc<dyn TextEngine>, config: &ExtractionConfig) -> Self {
        Self {
            engine,
            marker: config.quality_marker,
            data_dir: config.data_dir.clone(),
        }
    }

    /// Absolute path of a store file reference
    pub fn resolve(&self, file_ref: &str) -> PathBuf {
        self.data_dir.join(file_ref.trim_start_matches('/'))
    }

    /// Extract a stored file's text on the blocking pool
    pub async fn extract(&self, file_ref: &str) -> Result<String> {
        let extractor = self.clone();
        let path = self.resolve(file_ref);
        tokio::task::spawn_blocking(move || extractor.extract_path(&path))
            .await
            .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?
    }

    /// Extract the text of a file, dispatching on its sniffed content kind
    pub fn extract_path(&self, path: &Path) -> Result<String> {
        let data = std::fs::read(path).map_err(|e| {
            Error::extraction(path.display().to_string(), format!("Cannot read file: {}", e))
        })?;
        let kind = sniff(&data);
        tracing::debug!("{} sniffed as {}", path.display(), kind);

        let text = match kind {
            ContentKind::PlainText => String::from_utf8_lossy(&data).into_owned(),
            ContentKind::LegacyWord => match self.engine.legacy_word(path) {
                Ok(text) => text,
                Err(Error::Decode { message, .. }) => {
                    tracing::warn!(
                        "Undecodable legacy document {}, using empty text: {}",
                        path.display(),
                        message
                    );
                    return Ok(String::new());
                }
                Err(e) => return Err(e),
            },
            ContentKind::ModernWord => self.engine.modern_word(path, &data)?,
            ContentKind::Pdf => self.extract_pdf(path, &data)?,
            ContentKind::Rtf => self.engine.rtf(path)?,
            ContentKind::LegacySpreadsheet | ContentKind::ModernSpreadsheet => {
                tracing::debug!("Skipping spreadsheet {}", path.display());
                return Ok(String::new());
            }
            ContentKind::Unsupported(kind) => {
                return Err(Error::UnsupportedContent {
                    path: path.display().to_string(),
                    kind,
                });
            }
        };

        if !text.contains(self.marker) {
            return Err(Error::ExtractionQuality {
                path: path.display().to_string(),
            });
        }
        Ok(text)
    }

    /// Direct extraction, then a single OCR pass if the text lacks the marker
    fn extract_pdf(&self, path: &Path, data: &[u8]) -> Result<String> {
        let direct = match self.engine.pdf(path, data) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Direct extraction of {} failed: {}", path.display(), e);
                String::new()
            }
        };
        if direct.contains(self.marker) {
            return Ok(direct);
        }

        tracing::info!(
            "{} has no text layer in the expected script, running OCR",
            path.display()
        );
        self.engine.pdf_ocr(path, data)
    }
}
