//! Pipeline stages and the run that ties them together

pub mod cancel;
mod fetcher;
mod forwarder;
mod orchestrator;
pub mod progress;
mod reconciler;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use fetcher::{file_name_from_url, parse_last_modified, DocumentFetcher, Download, FetchStats};
pub use forwarder::{ForwardStats, Forwarder, DOCUMENT_SEPARATOR};
pub use orchestrator::{IssuerSummary, RunOrchestrator, RunSummary};
pub use progress::{ChannelSink, LogSink, ProgressSink, Reporter};
pub use reconciler::{ReconcileStats, Reconciler};
