//! Per-site source parsers
//!
//! Every supported issuer has exactly one parser. A parser fetches the
//! issuer's public listing and normalizes it into `ParsedActs`; it never
//! touches the record store.

mod dnipro;
mod sumy;

pub use dnipro::DniproParser;
pub use sumy::SumyParser;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Selector};
use std::sync::Arc;
use std::time::Duration;

use crate::config::SourcesConfig;
use crate::error::{Error, Result};
use crate::processing::Reporter;
use crate::types::{Issuer, ParsedActs};

/// Trait for issuer listing parsers
#[async_trait]
pub trait SourceParser: Send + Sync {
    /// The issuer this parser reads
    fn issuer(&self) -> Issuer;

    /// Fetch and parse the full current listing.
    ///
    /// A failure aborts only this issuer's pipeline.
    async fn parse(&self, progress: &Reporter) -> Result<ParsedActs>;
}

type Constructor = fn(&SourcesConfig) -> Result<Arc<dyn SourceParser>>;

/// Issuers with a parser, and how to build it
const PARSERS: &[(Issuer, Constructor)] = &[
    (Issuer::Dnipro, build_dnipro),
    (Issuer::Sumy, build_sumy),
];

fn build_dnipro(config: &SourcesConfig) -> Result<Arc<dyn SourceParser>> {
    Ok(Arc::new(DniproParser::new(&config.dnipro)?))
}

fn build_sumy(config: &SourcesConfig) -> Result<Arc<dyn SourceParser>> {
    Ok(Arc::new(SumyParser::new(&config.sumy)?))
}

/// Issuers that have a parser
pub fn supported_issuers() -> Vec<Issuer> {
    PARSERS.iter().map(|(issuer, _)| *issuer).collect()
}

/// Build the parsers of every enabled issuer, in configuration order
pub fn registry(config: &SourcesConfig) -> Result<Vec<Arc<dyn SourceParser>>> {
    let mut parsers: Vec<Arc<dyn SourceParser>> = Vec::with_capacity(config.enabled.len());
    for issuer in &config.enabled {
        if parsers.iter().any(|p| p.issuer() == *issuer) {
            tracing::warn!("{} is enabled twice, ignoring the duplicate", issuer);
            continue;
        }
        let (_, build) = PARSERS
            .iter()
            .find(|(candidate, _)| candidate == issuer)
            .ok_or_else(|| Error::Config(format!("No parser for issuer {}", issuer)))?;
        parsers.push(build(config)?);
    }
    Ok(parsers)
}

/// HTTP client for listing requests
fn listing_client(issuer: Issuer, timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Error::Config(format!("Failed to build {} listing client: {}", issuer, e)))
}

/// Read a listing response body, treating non-2xx as a source failure
async fn listing_body(issuer: Issuer, response: reqwest::Response) -> Result<String> {
    let status = response.status();
    if !status.is_success() {
        return Err(Error::source_failure(
            issuer,
            format!("Listing request returned {}", status),
        ));
    }
    response
        .text()
        .await
        .map_err(|e| Error::source_failure(issuer, format!("Failed to read listing: {}", e)))
}

/// Concatenate a base URL and a path with exactly one slash between them
fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| Error::Internal(format!("Invalid selector '{}': {:?}", css, e)))
}

/// Child elements of `element` with the given tag name
fn child_elements<'a>(element: ElementRef<'a>, name: &str) -> Vec<ElementRef<'a>> {
    element
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == name)
        .collect()
}

/// First text node directly inside `element`, trimmed
fn own_text(element: ElementRef<'_>) -> Option<String> {
    element
        .children()
        .find_map(|node| node.value().as_text().map(|t| t.trim().to_string()))
}

/// First non-blank text anywhere below `element`, trimmed
fn first_text(element: ElementRef<'_>) -> Option<String> {
    element
        .text()
        .map(str::trim)
        .find(|t| !t.is_empty())
        .map(str::to_string)
}
