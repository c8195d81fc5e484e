//! acts-ingest: municipal acts ingestion pipeline
//!
//! Scrapes the acts published by city councils, reconciles them with a
//! central record store, downloads their documents, extracts the text and
//! forwards it to an aggregation service. Runs are triggered and observed
//! over a WebSocket that streams progress events.

pub mod config;
pub mod error;
pub mod ingestion;
pub mod processing;
pub mod providers;
pub mod server;
pub mod sources;
pub mod types;

#[cfg(test)]
mod testing;

pub use config::IngestConfig;
pub use error::{Error, Result};
pub use processing::{RunOrchestrator, RunSummary};
pub use types::{Act, Document, Issuer, ParsedAct, ParsedActs, RunEvent};
