//! Download of document files the record store does not have yet

use chrono::{DateTime, Utc};
use reqwest::header::LAST_MODIFIED;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use crate::config::FetchConfig;
use crate::error::{Error, Result};
use crate::providers::{DocumentFilter, DocumentPatch, FileUpload, RecordStore};
use crate::types::{Document, Issuer, Stage};

use super::progress::{ProgressSink, Reporter};

/// Outcome of one fetch pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    pub missing: usize,
    pub downloaded: usize,
    pub failed: usize,
}

/// A downloaded file with its metadata
#[derive(Debug, Clone)]
pub struct Download {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub last_modified: DateTime<Utc>,
}

/// Downloads missing document files and attaches them in the store
pub struct DocumentFetcher {
    store: Arc<dyn RecordStore>,
    sink: Arc<dyn ProgressSink>,
    client: Client,
    config: FetchConfig,
}

impl DocumentFetcher {
    pub fn new(
        store: Arc<dyn RecordStore>,
        sink: Arc<dyn ProgressSink>,
        config: &FetchConfig,
    ) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build download client: {}", e)))?;

        Ok(Self {
            store,
            sink,
            client,
            config: config.clone(),
        })
    }

    /// Download every file still missing for `issuer`.
    ///
    /// Downloads are sequential with a fixed pause after each one, to go
    /// easy on the municipal servers.
    pub async fn fetch_missing(&self, issuer: Issuer) -> Result<FetchStats> {
        let reporter = Reporter::new(self.sink.clone(), Stage::DocsLoader, Some(issuer));
        let timeout = self.config.timeout_for(issuer);
        let delay = self.config.delay();

        reporter.info("Download every missing document");
        let documents: Vec<Document> = self
            .store
            .fetch_documents(DocumentFilter::missing_files(issuer))
            .await?
            .into_iter()
            .filter(Document::needs_file)
            .collect();

        let total = documents.len();
        let mut stats = FetchStats {
            missing: total,
            ..Default::default()
        };
        reporter.info(format!("Missing documents: {}", total));

        for (i, document) in documents.iter().enumerate() {
            reporter.info(format!("Downloading {} document out of {}", i + 1, total));
            let id = document.id.ok_or_else(|| {
                Error::internal(format!("Document {} has no record ID", document.url))
            })?;

            match self.download(&document.url, timeout).await {
                Ok(download) => {
                    tracing::debug!(
                        "Downloaded {} ({} bytes, last modified {})",
                        document.url,
                        download.bytes.len(),
                        download.last_modified
                    );
                    self.store
                        .change_document(
                            id,
                            DocumentPatch {
                                last_modified: Some(download.last_modified),
                                file: Some(FileUpload {
                                    name: download.file_name,
                                    bytes: download.bytes,
                                }),
                            },
                        )
                        .await?;
                    stats.downloaded += 1;
                }
                Err(e) => {
                    stats.failed += 1;
                    tracing::warn!("{}: {}", issuer, e);
                    reporter.error(e.to_string());
                    if self.config.stop_on_error {
                        return Err(e);
                    }
                }
            }

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        if stats.failed == 0 {
            reporter.info(format!("{} documents downloaded", stats.downloaded));
        } else {
            reporter.info(format!(
                "{} documents downloaded, {} failed",
                stats.downloaded, stats.failed
            ));
        }
        Ok(stats)
    }

    /// GET a document with its metadata
    pub async fn download(&self, url: &str, timeout: Duration) -> Result<Download> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Error::download(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::download(url, format!("HTTP {}", status)));
        }

        let last_modified = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_last_modified)
            .unwrap_or_else(Utc::now);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::download(url, e.to_string()))?;

        Ok(Download {
            file_name: file_name_from_url(url),
            bytes: bytes.to_vec(),
            last_modified,
        })
    }
}

/// Parse an HTTP `Last-Modified` value (RFC 2822 date)
pub fn parse_last_modified(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// File name for a stored download: the URL's last `/` segment reduced to
/// a safe character set.
pub fn file_name_from_url(url: &str) -> String {
    let segment = url.rsplit('/').next().unwrap_or_default();
    let name: String = segment
        .trim()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('_'),
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') => Some(c),
            _ => None,
        })
        .collect();

    let name = name.trim_matches('.');
    if name.is_empty() {
        "document".to_string()
    } else {
        name.to_string()
    }
}
