//! Forwarding of extracted act text to the aggregation service
//!
//! Each act is an isolated unit: a failed extraction or submission is
//! reported and the batch moves on. Only a record store failure stops it.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::sync::Arc;

use crate::config::ForwardingConfig;
use crate::error::{Error, Result};
use crate::ingestion::Extractor;
use crate::providers::{ActPatch, ForwardTarget, RecordStore};
use crate::types::{ActToForward, ForwardPayload, Stage};

use super::progress::{ProgressSink, Reporter};

/// Joins the texts of an act's documents
pub const DOCUMENT_SEPARATOR: &str = ".\n\n\n";

/// Outcome of one forwarding pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardStats {
    /// Acts that were eligible and attempted
    pub total: usize,
    pub forwarded: usize,
    pub failed: usize,
}

/// Sends eligible acts downstream and marks them forwarded
pub struct Forwarder {
    store: Arc<dyn RecordStore>,
    target: Arc<dyn ForwardTarget>,
    extractor: Extractor,
    config: ForwardingConfig,
    sink: Arc<dyn ProgressSink>,
}

impl Forwarder {
    pub fn new(
        store: Arc<dyn RecordStore>,
        target: Arc<dyn ForwardTarget>,
        extractor: Extractor,
        config: &ForwardingConfig,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            store,
            target,
            extractor,
            config: config.clone(),
            sink,
        }
    }

    /// Forward every act the store reports as ready
    pub async fn forward_all(&self) -> Result<ForwardStats> {
        let reporter = Reporter::new(self.sink.clone(), Stage::ActsProcessor, None);

        let acts = self.store.fetch_acts_to_forward().await?;
        let mut stats = ForwardStats {
            total: acts.len(),
            ..Default::default()
        };
        reporter.info(format!("{} acts to forward", stats.total));
        tracing::info!("Forwarding {} acts via {}", stats.total, self.target.name());

        for (i, act) in acts.iter().enumerate() {
            reporter.info(format!("Forwarding {} out of {}", i + 1, stats.total));

            match self.forward_one(act).await {
                Ok(()) => {
                    self.store.change_act(act.id, &ActPatch::forwarded()).await?;
                    stats.forwarded += 1;
                }
                Err(e) => {
                    stats.failed += 1;
                    tracing::error!("Error forwarding act #{}: {}", act.id, e);
                    reporter.error(format!(
                        "Error forwarding act: {}: {}: {}",
                        act.title, act.link, e
                    ));
                }
            }
        }

        reporter.info(format!(
            "{} acts processed, {} forwarded",
            stats.total, stats.forwarded
        ));
        Ok(stats)
    }

    async fn forward_one(&self, act: &ActToForward) -> Result<()> {
        let credential = self.config.api_key(act.issuer).ok_or_else(|| {
            Error::Config(format!("No forwarding credential for {}", act.issuer))
        })?;
        let text = self.concatenated_text(act).await?;
        let payload = self.payload(act, &text);
        self.target.submit(credential, &payload).await
    }

    /// Extract every stored file in document order and join the texts
    pub async fn concatenated_text(&self, act: &ActToForward) -> Result<String> {
        let mut texts = Vec::with_capacity(act.files.len());
        for file in &act.files {
            texts.push(self.extractor.extract(file).await?);
        }
        Ok(texts.join(DOCUMENT_SEPARATOR))
    }

    pub fn payload(&self, act: &ActToForward, text: &str) -> ForwardPayload {
        ForwardPayload {
            title: act.title.clone(),
            link: act.link.clone(),
            file_name: format!("{}{}", act.file_name, self.config.file_name_suffix),
            file_content: BASE64.encode(text.as_bytes()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractionConfig;
    use crate::processing::progress::testing::RecordingSink;
    use crate::providers::{DocumentPatch, FileUpload, MemoryRecordStore};
    use crate::testing::RecordingTarget;
    use crate::types::{DocumentRef, Issuer, ParsedAct};

    struct Fixture {
        _dir: tempfile::TempDir,
        store: Arc<MemoryRecordStore>,
        sink: Arc<RecordingSink>,
        target: Arc<RecordingTarget>,
        forwarder: Forwarder,
    }

    fn fixture(rejected: &[&str], keys: &[(Issuer, &str)]) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryRecordStore::with_data_dir(dir.path()));
        let sink = Arc::new(RecordingSink::default());
        let target = Arc::new(RecordingTarget::rejecting(rejected));
        let extractor = Extractor::new(&ExtractionConfig {
            data_dir: dir.path().to_path_buf(),
            ..Default::default()
        });
        let mut config = ForwardingConfig::default();
        for (issuer, key) in keys {
            config
                .api_keys
                .insert(issuer.as_str().to_string(), key.to_string());
        }
        let forwarder = Forwarder::new(
            store.clone(),
            target.clone(),
            extractor,
            &config,
            sink.clone(),
        );
        Fixture {
            _dir: dir,
            store,
            sink,
            target,
            forwarder,
        }
    }

    /// Create an act whose documents are plain-text files already stored
    async fn stored_act(store: &MemoryRecordStore, issuer: Issuer, title: &str, texts: &[&str]) -> i64 {
        let parsed = ParsedAct::new(
            issuer,
            title,
            title,
            texts
                .iter()
                .enumerate()
                .map(|(i, _)| DocumentRef {
                    order: i as u16,
                    url: format!("https://x/{}-{}.txt", title, i),
                })
                .collect(),
        );
        let act = store.create_act(&parsed).await.unwrap();
        for (document, text) in act.documents.iter().zip(texts) {
            store
                .change_document(
                    document.id.unwrap(),
                    DocumentPatch {
                        last_modified: None,
                        file: Some(FileUpload {
                            name: format!("{}-{}.txt", title, document.order),
                            bytes: text.as_bytes().to_vec(),
                        }),
                    },
                )
                .await
                .unwrap();
        }
        act.id.unwrap()
    }

    #[tokio::test]
    async fn test_failed_submission_is_isolated() {
        let f = fixture(&["second"], &[(Issuer::Sumy, "Token sumy")]);
        let first = stored_act(&f.store, Issuer::Sumy, "first", &["Перше рішення про бюджет"]).await;
        let second = stored_act(&f.store, Issuer::Sumy, "second", &["Друге рішення про бюджет"]).await;
        let third = stored_act(&f.store, Issuer::Sumy, "third", &["Третє рішення про бюджет"]).await;

        let stats = f.forwarder.forward_all().await.unwrap();

        assert_eq!(
            stats,
            ForwardStats {
                total: 3,
                forwarded: 2,
                failed: 1
            }
        );
        let forwarded = |id: i64| {
            f.store
                .acts()
                .into_iter()
                .find(|a| a.id == Some(id))
                .unwrap()
                .forwarded
        };
        assert!(forwarded(first));
        assert!(!forwarded(second));
        assert!(forwarded(third));

        assert_eq!(f.target.submissions().len(), 3);
        assert_eq!(
            f.sink.messages().last().unwrap(),
            "3 acts processed, 2 forwarded"
        );
        assert_eq!(f.sink.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_payload_joins_documents_in_order() {
        let f = fixture(&[], &[(Issuer::Dnipro, "Token dnipro")]);
        stored_act(
            &f.store,
            Issuer::Dnipro,
            "multi",
            &["Основний текст", "Додаток один", "Додаток два"],
        )
        .await;

        f.forwarder.forward_all().await.unwrap();

        let submissions = f.target.submissions();
        let (credential, payload) = &submissions[0];
        assert_eq!(credential, "Token dnipro");
        assert_eq!(payload.link, "https://x/multi-0.txt");
        assert_eq!(payload.file_name, "multi-0.txt.txt");

        let decoded = String::from_utf8(BASE64.decode(&payload.file_content).unwrap()).unwrap();
        assert_eq!(
            decoded,
            "Основний текст.\n\n\nДодаток один.\n\n\nДодаток два"
        );
    }

    #[tokio::test]
    async fn test_missing_credential_and_bad_text_are_isolated() {
        let f = fixture(&[], &[(Issuer::Sumy, "Token sumy")]);
        stored_act(&f.store, Issuer::Dnipro, "no-key", &["Рішення про бюджет"]).await;
        // No marker letter, so the quality gate rejects it
        stored_act(&f.store, Issuer::Sumy, "garbled", &["l0rem 1psum"]).await;
        let good = stored_act(&f.store, Issuer::Sumy, "good", &["Добре рішення"]).await;

        let stats = f.forwarder.forward_all().await.unwrap();

        assert_eq!((stats.total, stats.forwarded, stats.failed), (3, 1, 2));
        assert_eq!(f.target.submissions().len(), 1);
        assert!(f.store.acts().iter().any(|a| a.id == Some(good) && a.forwarded));
        let errors = f.sink.errors();
        assert!(errors.iter().any(|e| e.message.contains("No forwarding credential")));
        assert!(errors.iter().any(|e| e.message.contains("Check extraction from")));
    }

    #[tokio::test]
    async fn test_store_failure_stops_forwarding() {
        let f = fixture(&[], &[(Issuer::Sumy, "Token sumy")]);
        stored_act(&f.store, Issuer::Sumy, "one", &["Рішення про бюджет"]).await;
        f.store.fail_on("change_act");

        let err = f.forwarder.forward_all().await.unwrap_err();
        assert!(err.is_store());
    }
}
