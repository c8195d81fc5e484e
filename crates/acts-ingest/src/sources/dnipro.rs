//! Dnipro city council: a JSON-requested HTML table of adopted acts

use async_trait::async_trait;
use chrono::Local;
use reqwest::Client;
use scraper::Html;

use crate::config::DniproConfig;
use crate::error::Result;
use crate::processing::Reporter;
use crate::types::{DocumentRef, Issuer, ParsedAct, ParsedActs};

use super::{
    child_elements, join_url, listing_body, listing_client, own_text, selector, SourceParser,
};

const ROWS: &str = "body > div:nth-of-type(2) > table > tbody > tr";

/// Parser for the Dnipro council documents widget
pub struct DniproParser {
    client: Client,
    config: DniproConfig,
}

impl DniproParser {
    pub fn new(config: &DniproConfig) -> Result<Self> {
        Ok(Self {
            client: listing_client(Issuer::Dnipro, config.timeout_secs)?,
            config: config.clone(),
        })
    }

    /// Prefix of every document download URL
    fn media_url(&self) -> String {
        join_url(&self.config.base_url, &self.config.media_path)
    }
}

#[async_trait]
impl SourceParser for DniproParser {
    fn issuer(&self) -> Issuer {
        Issuer::Dnipro
    }

    async fn parse(&self, progress: &Reporter) -> Result<ParsedActs> {
        progress.info("Running `dnipro` parser");
        progress.info(format!("Reading from {}", self.config.base_url));

        let url = join_url(&self.config.base_url, &self.config.page_path);
        let today = Local::now().format("%d.%m.%Y").to_string();
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "BegDocDate": self.config.since,
                "EndDocDate": today,
            }))
            .send()
            .await?;
        let html = listing_body(Issuer::Dnipro, response).await?;
        progress.info(format!("Reading from {} finished", self.config.base_url));

        let acts = parse_listing(&html, &self.media_url())?;
        tracing::info!("Dnipro listing has {} acts", acts.len());
        progress.info("Running `dnipro` parser finished");
        Ok(acts)
    }
}

/// Parse the widget's HTML table.
///
/// Columns: 2 is the act number, 5 the title, 6 and 7 hold download
/// buttons whose `onclick` carries the quoted document path. The column 7
/// document wins when both are present.
pub fn parse_listing(html: &str, media_url: &str) -> Result<ParsedActs> {
    let document = Html::parse_document(html);
    let rows = selector(ROWS)?;

    let mut acts = ParsedActs::new();
    for row in document.select(&rows) {
        let cells = child_elements(row, "td");
        let text_of = |index: usize| {
            cells
                .get(index)
                .and_then(|cell| own_text(*cell))
                .filter(|text| !text.is_empty())
        };
        let (Some(act_id), Some(title)) = (text_of(1), text_of(4)) else {
            tracing::warn!("Skipping Dnipro row without number or title");
            continue;
        };

        let document_path = [6, 5].iter().find_map(|&index| {
            let cell = cells.get(index)?;
            let onclick = child_elements(*cell, "button")
                .into_iter()
                .find_map(|button| button.value().attr("onclick"))?;
            onclick.split('\'').nth(1)
        });
        let Some(document_path) = document_path else {
            tracing::debug!("Dnipro act {} has no downloadable document", act_id);
            continue;
        };

        let act = ParsedAct::new(
            Issuer::Dnipro,
            act_id.clone(),
            title,
            vec![DocumentRef {
                order: 0,
                url: format!("{}{}", media_url, document_path),
            }],
        );
        acts.insert(act_id, act);
    }
    Ok(acts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::progress::testing::RecordingSink;
    use crate::testing::serve;
    use crate::types::Stage;
    use axum::routing::post;
    use axum::{Json, Router};
    use parking_lot::Mutex;
    use std::sync::Arc;

    const MEDIA: &str = "https://dniprorada.gov.ua/uk/Widgets/GetWidgetContent?url=";

    fn row(number: &str, title: &str, pdf: Option<&str>, doc: Option<&str>) -> String {
        let button = |path: Option<&str>| {
            path.map(|p| format!(r#"<button onclick="openDoc('{}')">⬇</button>"#, p))
                .unwrap_or_default()
        };
        format!(
            "<tr><td>1</td><td> {} </td><td>01.02.2021</td><td>Рада</td><td>\n{}\n</td><td>{}</td><td>{}</td></tr>",
            number,
            title,
            button(pdf),
            button(doc)
        )
    }

    fn page(rows: &[String]) -> String {
        format!(
            "<html><body><div>header</div><div><table><thead><tr><th>#</th></tr></thead><tbody>{}</tbody></table></div></body></html>",
            rows.concat()
        )
    }

    #[test]
    fn test_parse_listing_prefers_second_button() {
        let html = page(&[
            row("101", "Про бюджет", Some("files/101.pdf"), None),
            row("102", "Про податки", Some("files/102.pdf"), Some("files/102.doc")),
            row("103", "Без файлів", None, None),
        ]);
        let acts = parse_listing(&html, MEDIA).unwrap();

        assert_eq!(acts.len(), 2);
        let first = &acts["101"];
        assert_eq!(first.issuer, Issuer::Dnipro);
        assert_eq!(first.title, "Про бюджет");
        assert_eq!(first.documents.len(), 1);
        assert_eq!(first.documents[0].order, 0);
        assert_eq!(
            first.documents[0].url,
            format!("{}files/101.pdf", MEDIA)
        );
        assert_eq!(acts["102"].documents[0].url, format!("{}files/102.doc", MEDIA));
        assert!(!acts.contains_key("103"));
    }

    #[test]
    fn test_parse_listing_ignores_other_tables() {
        let html = format!(
            "<html><body><div><table><tbody>{}</tbody></table></div>{}</body></html>",
            row("900", "Чужа таблиця", Some("x.pdf"), None),
            "<div><table><tbody></tbody></table></div>"
        );
        assert!(parse_listing(&html, MEDIA).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_parse_posts_date_window() {
        let seen = Arc::new(Mutex::new(None));
        let html = page(&[row("7", "Про рішення", Some("files/7.pdf"), None)]);
        let router = Router::new().route(
            "/uk/Widgets/GetAcceptCouncilDocuments",
            post({
                let seen = seen.clone();
                move |Json(body): Json<serde_json::Value>| {
                    let seen = seen.clone();
                    let html = html.clone();
                    async move {
                        *seen.lock() = Some(body);
                        html
                    }
                }
            }),
        );
        let base_url = format!("{}/", serve(router).await);

        let parser = DniproParser::new(&DniproConfig {
            base_url: base_url.clone(),
            ..Default::default()
        })
        .unwrap();
        let sink = Arc::new(RecordingSink::default());
        let reporter = Reporter::new(sink.clone(), Stage::Parser, Some(Issuer::Dnipro));

        let acts = parser.parse(&reporter).await.unwrap();

        assert_eq!(
            acts["7"].documents[0].url,
            format!("{}uk/Widgets/GetWidgetContent?url=files/7.pdf", base_url)
        );
        let body = seen.lock().clone().unwrap();
        assert_eq!(body["BegDocDate"], "01.01.2021");
        assert_eq!(body["EndDocDate"].as_str().unwrap().len(), 10);
        assert_eq!(
            sink.messages(),
            vec![
                "Running `dnipro` parser".to_string(),
                format!("Reading from {}", base_url),
                format!("Reading from {} finished", base_url),
                "Running `dnipro` parser finished".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_error_status_is_source_failure() {
        let router = Router::new().route(
            "/uk/Widgets/GetAcceptCouncilDocuments",
            post(|| async { (axum::http::StatusCode::BAD_GATEWAY, "down") }),
        );
        let parser = DniproParser::new(&DniproConfig {
            base_url: serve(router).await,
            ..Default::default()
        })
        .unwrap();
        let reporter = Reporter::new(
            Arc::new(RecordingSink::default()),
            Stage::Parser,
            Some(Issuer::Dnipro),
        );

        let err = parser.parse(&reporter).await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Source {
                issuer: Issuer::Dnipro,
                ..
            }
        ));
    }
}
