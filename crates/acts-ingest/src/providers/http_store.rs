//! Record store client for the store's REST API

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::config::StoreConfig;
use crate::error::{Error, Result, ServiceBody};
use crate::types::{Act, ActToForward, Document, ParsedAct};

use super::store::{ActFilter, ActPatch, DocumentFilter, DocumentPatch, RecordStore};

/// HTTP client for the record store
pub struct HttpRecordStore {
    client: Client,
    base_url: String,
    listing_timeout: Duration,
}

impl HttpRecordStore {
    /// Create a new store client
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build store client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            listing_timeout: Duration::from_secs(config.listing_timeout_secs),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }

    async fn send<T: DeserializeOwned>(&self, operation: &str, request: RequestBuilder) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::store_unreachable(operation, e.to_string()))?;
        decode_response(operation, response).await
    }
}

/// Turn a store response into a value or a `Store` error.
///
/// 4xx bodies are structured JSON, 5xx bodies opaque text.
async fn decode_response<T: DeserializeOwned>(operation: &str, response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return response.json::<T>().await.map_err(|e| Error::Store {
            operation: operation.to_string(),
            status: Some(status.as_u16()),
            body: ServiceBody::Text(format!("Unreadable response: {}", e)),
        });
    }

    let text = response.text().await.unwrap_or_default();
    let body = if status.is_client_error() {
        serde_json::from_str(&text)
            .map(ServiceBody::Json)
            .unwrap_or(ServiceBody::Text(text))
    } else {
        ServiceBody::Text(text)
    };

    tracing::error!("Store call {} failed with {}: {}", operation, status, body);
    Err(Error::Store {
        operation: operation.to_string(),
        status: Some(status.as_u16()),
        body,
    })
}

#[async_trait]
impl RecordStore for HttpRecordStore {
    async fn fetch_acts(&self, filter: ActFilter) -> Result<Vec<Act>> {
        let mut request = self.request(Method::GET, "acts/acts/");
        if let Some(issuer) = filter.issuer {
            request = request.query(&[("issuer", issuer.as_str())]);
        }
        if let Some(removed) = filter.removed_from_source {
            request = request.query(&[("removed_from_source", removed)]);
        }
        self.send("fetch_acts", request).await
    }

    async fn create_act(&self, act: &ParsedAct) -> Result<Act> {
        let request = self.request(Method::POST, "acts/acts/").json(act);
        self.send("create_act", request).await
    }

    async fn change_act(&self, id: i64, patch: &ActPatch) -> Result<Act> {
        let request = self
            .request(Method::PATCH, &format!("acts/acts/{}/", id))
            .json(patch);
        self.send("change_act", request).await
    }

    async fn fetch_documents(&self, filter: DocumentFilter) -> Result<Vec<Document>> {
        let mut request = self.request(Method::GET, "acts/documents/");
        if filter.needs_file {
            request = request.query(&[("needs_file", "1")]);
        }
        if let Some(issuer) = filter.issuer {
            request = request.query(&[("issuer", issuer.as_str())]);
        }
        self.send("fetch_documents", request).await
    }

    async fn change_document(&self, id: i64, patch: DocumentPatch) -> Result<Document> {
        let request = self.request(Method::PATCH, &format!("acts/documents/{}/", id));
        let last_modified = patch.last_modified.map(|t| t.to_rfc3339());

        let request = match patch.file {
            Some(file) => {
                let mut form = reqwest::multipart::Form::new();
                if let Some(last_modified) = last_modified {
                    form = form.text("last_modified", last_modified);
                }
                let part = reqwest::multipart::Part::bytes(file.bytes).file_name(file.name);
                request.multipart(form.part("file", part))
            }
            None => request.json(&serde_json::json!({ "last_modified": last_modified })),
        };
        self.send("change_document", request).await
    }

    async fn fetch_acts_to_forward(&self) -> Result<Vec<ActToForward>> {
        let request = self
            .request(Method::GET, "acts/acts-to-forward/")
            .timeout(self.listing_timeout);
        self.send("fetch_acts_to_forward", request).await
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::serve;
    use crate::types::Issuer;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};

    fn store_for(base_url: String) -> HttpRecordStore {
        HttpRecordStore::new(&StoreConfig {
            base_url,
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_acts_decodes_listing() {
        let router = Router::new().route(
            "/acts/acts/",
            get(|| async {
                Json(serde_json::json!([{
                    "id": 1,
                    "issuer": "Dnipro",
                    "act_id": "101",
                    "title": "Old Act",
                    "documents": [{"order": 0, "url": "https://x/a.pdf", "last_modified": null}],
                    "forwarded": false,
                    "removed_from_source": false,
                    "needs_inspection": false,
                    "comments": null
                }]))
            }),
        );
        let store = store_for(serve(router).await);

        let acts = store.fetch_acts(ActFilter::issuer(Issuer::Dnipro)).await.unwrap();
        assert_eq!(acts.len(), 1);
        assert_eq!(acts[0].act_id, "101");
        assert_eq!(acts[0].documents[0].url, "https://x/a.pdf");
    }

    #[tokio::test]
    async fn test_client_error_keeps_json_body() {
        let router = Router::new().route(
            "/acts/acts/",
            get(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({"issuer": ["invalid choice"]})),
                )
            }),
        );
        let store = store_for(serve(router).await);

        match store.fetch_acts(ActFilter::default()).await {
            Err(Error::Store { status, body, .. }) => {
                assert_eq!(status, Some(400));
                assert!(matches!(body, ServiceBody::Json(_)));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_server_error_keeps_text_body() {
        let router = Router::new().route(
            "/acts/acts-to-forward/",
            get(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
        );
        let store = store_for(serve(router).await);

        match store.fetch_acts_to_forward().await {
            Err(Error::Store { status, body, .. }) => {
                assert_eq!(status, Some(502));
                assert_eq!(body, ServiceBody::Text("upstream down".to_string()));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_store() {
        let store = store_for("http://127.0.0.1:1".to_string());
        let err = store.fetch_acts(ActFilter::default()).await.unwrap_err();
        assert!(err.is_store());
    }
}
