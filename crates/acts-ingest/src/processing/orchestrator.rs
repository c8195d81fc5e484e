//! Run orchestration
//!
//! One run is: every enabled issuer's pipeline (parse, reconcile, fetch)
//! concurrently, then a single forwarding pass, then the terminal `done`
//! event. Issuer pipelines fail independently; a record store failure in
//! any of them means the store is unhealthy and forwarding is skipped.

use futures::future::join_all;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::config::IngestConfig;
use crate::error::{Error, Result};
use crate::ingestion::Extractor;
use crate::providers::{
    ForwardTarget, HttpForwardTarget, HttpRecordStore, LogForwardTarget, MemoryRecordStore,
    RecordStore,
};
use crate::sources::{self, SourceParser};
use crate::types::{Issuer, RunEvent, Stage};

use super::cancel::CancelSignal;
use super::fetcher::{DocumentFetcher, FetchStats};
use super::forwarder::{ForwardStats, Forwarder};
use super::progress::{ChannelSink, ProgressSink, Reporter};
use super::reconciler::{ReconcileStats, Reconciler};

/// What happened to one issuer during a run
#[derive(Debug, Clone, PartialEq)]
pub struct IssuerSummary {
    pub issuer: Issuer,
    pub reconcile: Option<ReconcileStats>,
    pub fetch: Option<FetchStats>,
    /// Stage and message of the failure that ended the pipeline
    pub failure: Option<(Stage, String)>,
    pub store_failure: bool,
    pub cancelled: bool,
}

impl IssuerSummary {
    fn new(issuer: Issuer) -> Self {
        Self {
            issuer,
            reconcile: None,
            fetch: None,
            failure: None,
            store_failure: false,
            cancelled: false,
        }
    }

    /// Record `error` as the end of this pipeline and report it
    fn fail(mut self, reporter: &Reporter, stage: Stage, error: Error) -> Self {
        if matches!(error, Error::Cancelled) {
            tracing::info!("{}: pipeline cancelled during {:?}", self.issuer, stage);
            self.cancelled = true;
            return self;
        }

        tracing::error!("{}: pipeline failed during {:?}: {}", self.issuer, stage, error);
        reporter.error(error.to_string());
        self.store_failure = error.is_store();
        self.failure = Some((stage, error.to_string()));
        self
    }

    pub fn succeeded(&self) -> bool {
        self.failure.is_none() && !self.cancelled
    }
}

/// What happened during a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub issuers: Vec<IssuerSummary>,
    /// Absent when forwarding was skipped or failed
    pub forward: Option<ForwardStats>,
    pub forward_error: Option<String>,
    pub cancelled: bool,
}

impl RunSummary {
    /// Whether any pipeline hit a record store failure
    pub fn store_failed(&self) -> bool {
        self.issuers.iter().any(|i| i.store_failure)
    }

    pub fn succeeded(&self) -> bool {
        !self.cancelled
            && self.forward_error.is_none()
            && self.forward.is_some()
            && self.issuers.iter().all(IssuerSummary::succeeded)
    }
}

/// Runs the whole ingestion cycle
pub struct RunOrchestrator {
    config: Arc<IngestConfig>,
    store: Arc<dyn RecordStore>,
    target: Arc<dyn ForwardTarget>,
    extractor: Extractor,
    parsers: Vec<Arc<dyn SourceParser>>,
}

impl RunOrchestrator {
    pub fn new(
        config: Arc<IngestConfig>,
        store: Arc<dyn RecordStore>,
        target: Arc<dyn ForwardTarget>,
        extractor: Extractor,
        parsers: Vec<Arc<dyn SourceParser>>,
    ) -> Self {
        Self {
            config,
            store,
            target,
            extractor,
            parsers,
        }
    }

    /// Wire the HTTP record store, the HTTP forward target, the tool-backed
    /// extractor and the enabled parsers
    pub fn from_config(config: Arc<IngestConfig>) -> Result<Self> {
        let store: Arc<dyn RecordStore> = Arc::new(HttpRecordStore::new(&config.store)?);
        let target: Arc<dyn ForwardTarget> =
            Arc::new(HttpForwardTarget::new(&config.forwarding)?);
        let extractor = Extractor::new(&config.extraction);
        let parsers = sources::registry(&config.sources)?;

        tracing::info!(
            "Run orchestrator ready: store {}, target {}, {} parsers",
            store.name(),
            target.name(),
            parsers.len()
        );
        Ok(Self::new(config, store, target, extractor, parsers))
    }

    /// Wire an in-memory store that writes files below the data dir and a
    /// target that only logs. Source sites are still scraped and documents
    /// downloaded, but neither the record store nor the aggregation service
    /// is touched. The store starts empty, so every listed act is new.
    pub fn dry_run(config: Arc<IngestConfig>) -> Result<(Self, Arc<MemoryRecordStore>)> {
        let store = Arc::new(MemoryRecordStore::with_data_dir(
            config.extraction.data_dir.clone(),
        ));
        let extractor = Extractor::new(&config.extraction);
        let parsers = sources::registry(&config.sources)?;

        tracing::info!("Dry-run orchestrator ready: {} parsers", parsers.len());
        let orchestrator = Self::new(
            config,
            store.clone(),
            Arc::new(LogForwardTarget),
            extractor,
            parsers,
        );
        Ok((orchestrator, store))
    }

    /// Issuers taking part in a run
    pub fn issuers(&self) -> Vec<Issuer> {
        self.parsers.iter().map(|p| p.issuer()).collect()
    }

    /// Spawn a run, returning its event stream and the handle to its summary.
    ///
    /// The stream ends after the `done` event.
    pub fn start(
        self: Arc<Self>,
        cancel: CancelSignal,
    ) -> (UnboundedReceiverStream<RunEvent>, JoinHandle<RunSummary>) {
        let (sink, receiver) = ChannelSink::new();
        let handle = tokio::spawn(async move { self.run(Arc::new(sink), cancel).await });
        (UnboundedReceiverStream::new(receiver), handle)
    }

    /// Run every issuer pipeline, then forward, then emit `done`
    pub async fn run(&self, sink: Arc<dyn ProgressSink>, cancel: CancelSignal) -> RunSummary {
        tracing::info!("Starting run for {} issuers", self.parsers.len());

        let pipelines = self
            .parsers
            .iter()
            .map(|parser| self.run_issuer(parser.as_ref(), sink.clone(), cancel.clone()));
        let mut summary = RunSummary {
            issuers: join_all(pipelines).await,
            ..Default::default()
        };

        let reporter = Reporter::new(sink.clone(), Stage::ActsProcessor, None);
        if cancel.is_cancelled() {
            summary.cancelled = true;
            tracing::warn!("Run cancelled, forwarding skipped");
        } else if summary.store_failed() {
            tracing::error!("Record store failed during the run, forwarding skipped");
            reporter.error("Record store unavailable, forwarding skipped");
        } else {
            let forwarder = Forwarder::new(
                self.store.clone(),
                self.target.clone(),
                self.extractor.clone(),
                &self.config.forwarding,
                sink.clone(),
            );
            match cancel.guard(forwarder.forward_all()).await {
                Ok(stats) => summary.forward = Some(stats),
                Err(Error::Cancelled) => {
                    summary.cancelled = true;
                    tracing::warn!("Run cancelled during forwarding");
                }
                Err(e) => {
                    tracing::error!("Forwarding failed: {}", e);
                    reporter.error(format!("Forwarding failed: {}", e));
                    summary.forward_error = Some(e.to_string());
                }
            }
        }

        sink.emit(RunEvent::done());
        tracing::info!(
            "Run finished: {} of {} issuers succeeded",
            summary.issuers.iter().filter(|i| i.succeeded()).count(),
            summary.issuers.len()
        );
        summary
    }

    /// Parse, reconcile and fetch for one issuer, strictly in that order
    async fn run_issuer(
        &self,
        parser: &dyn SourceParser,
        sink: Arc<dyn ProgressSink>,
        cancel: CancelSignal,
    ) -> IssuerSummary {
        let issuer = parser.issuer();
        let mut summary = IssuerSummary::new(issuer);

        let media_dir = self
            .config
            .extraction
            .data_dir
            .join("acts")
            .join(issuer.as_str());
        if let Err(e) = tokio::fs::create_dir_all(&media_dir).await {
            tracing::warn!("Cannot create {}: {}", media_dir.display(), e);
        }

        let parsing = Reporter::new(sink.clone(), Stage::Parser, Some(issuer));
        parsing.info("Collecting main acts data");
        let parsed = match cancel.guard(parser.parse(&parsing)).await {
            Ok(parsed) => parsed,
            Err(e) => return summary.fail(&parsing, Stage::Parser, e),
        };

        let reconciler = Reconciler::new(self.store.clone(), sink.clone());
        match cancel.guard(reconciler.reconcile(issuer, &parsed)).await {
            Ok(stats) => summary.reconcile = Some(stats),
            Err(e) => {
                let storing = Reporter::new(sink.clone(), Stage::Storing, Some(issuer));
                return summary.fail(&storing, Stage::Storing, e);
            }
        }

        let loading = Reporter::new(sink.clone(), Stage::DocsLoader, Some(issuer));
        let fetcher = DocumentFetcher::new(self.store.clone(), sink.clone(), &self.config.fetch);
        let fetched = match fetcher {
            Ok(fetcher) => cancel.guard(fetcher.fetch_missing(issuer)).await,
            Err(e) => Err(e),
        };
        match fetched {
            Ok(stats) => summary.fetch = Some(stats),
            Err(e) => return summary.fail(&loading, Stage::DocsLoader, e),
        }

        summary
    }
}
