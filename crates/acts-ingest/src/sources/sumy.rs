//! Sumy city council: yearly decisions page with one table row per act

use async_trait::async_trait;
use reqwest::{Client, Url};
use scraper::{ElementRef, Html};

use crate::config::SumyConfig;
use crate::error::{Error, Result};
use crate::processing::Reporter;
use crate::types::{DocumentRef, Issuer, ParsedAct, ParsedActs};

use super::{
    child_elements, first_text, join_url, listing_body, listing_client, own_text, selector,
    SourceParser,
};

/// Rows of the decisions table inside the page's content column
const ROWS: &str = "body > div:nth-of-type(3) > div > div:nth-of-type(2) > div:nth-of-type(1) \
     > div > div:nth-of-type(2) > div > div > div > div:nth-of-type(4) \
     > div:nth-of-type(2) > div > table > tbody > tr";

/// Parser for the Sumy council decisions page
pub struct SumyParser {
    client: Client,
    config: SumyConfig,
    base: Url,
}

impl SumyParser {
    pub fn new(config: &SumyConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url).map_err(|e| {
            Error::Config(format!("Invalid Sumy base URL '{}': {}", config.base_url, e))
        })?;
        Ok(Self {
            client: listing_client(Issuer::Sumy, config.timeout_secs)?,
            config: config.clone(),
            base,
        })
    }
}

#[async_trait]
impl SourceParser for SumyParser {
    fn issuer(&self) -> Issuer {
        Issuer::Sumy
    }

    async fn parse(&self, progress: &Reporter) -> Result<ParsedActs> {
        progress.info("Running `sumy` parser");
        progress.info(format!("Reading from {}", self.config.base_url));

        let url = join_url(&self.config.base_url, &self.config.page_path);
        let response = self.client.get(&url).send().await?;
        let html = listing_body(Issuer::Sumy, response).await?;
        progress.info(format!("Reading from {} finished", self.config.base_url));

        let acts = parse_listing(&html, &self.base)?;
        tracing::info!("Sumy listing has {} acts", acts.len());
        progress.info("Running `sumy` parser finished");
        Ok(acts)
    }
}

/// Parse the decisions table.
///
/// The first row is the header. Column 1 is the act number, column 2 the
/// title with one link per document, in document order.
pub fn parse_listing(html: &str, base: &Url) -> Result<ParsedActs> {
    let document = Html::parse_document(html);
    let rows = selector(ROWS)?;

    let mut acts = ParsedActs::new();
    for row in document.select(&rows).skip(1) {
        let cells = child_elements(row, "td");
        let (Some(number), Some(links)) = (cells.first(), cells.get(1)) else {
            continue;
        };

        let documents = document_refs(*links, base);
        if documents.is_empty() {
            continue;
        }

        let act_id = own_text(*number).filter(|t| !t.is_empty());
        let title = first_text(*links);
        let (Some(act_id), Some(title)) = (act_id, title) else {
            tracing::warn!("Skipping Sumy row without number or title");
            continue;
        };

        acts.insert(
            act_id.clone(),
            ParsedAct::new(Issuer::Sumy, act_id, title, documents),
        );
    }
    Ok(acts)
}

/// Every `href` in the cell, resolved against the site
fn document_refs(cell: ElementRef<'_>, base: &Url) -> Vec<DocumentRef> {
    let hrefs = cell
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter_map(|element| element.value().attr("href"));

    let mut documents = Vec::new();
    for href in hrefs {
        match base.join(href.trim()) {
            Ok(url) => documents.push(DocumentRef {
                order: documents.len() as u16,
                url: url.to_string(),
            }),
            Err(e) => tracing::warn!("Skipping unusable Sumy link '{}': {}", href, e),
        }
    }
    documents
}
