//! Downstream aggregation service

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::config::ForwardingConfig;
use crate::error::{Error, Result, ServiceBody};
use crate::types::ForwardPayload;

/// Trait for the service that receives extracted act text
#[async_trait]
pub trait ForwardTarget: Send + Sync {
    /// Submit one act, authenticated with the issuer's credential
    async fn submit(&self, credential: &str, payload: &ForwardPayload) -> Result<()>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

/// HTTP client for the aggregation service's push endpoint
pub struct HttpForwardTarget {
    client: Client,
    push_url: String,
}

impl HttpForwardTarget {
    pub fn new(config: &ForwardingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build forwarding client: {}", e)))?;

        Ok(Self {
            client,
            push_url: format!(
                "{}/{}",
                config.base_url.trim_end_matches('/'),
                config.push_path.trim_start_matches('/')
            ),
        })
    }
}

#[async_trait]
impl ForwardTarget for HttpForwardTarget {
    async fn submit(&self, credential: &str, payload: &ForwardPayload) -> Result<()> {
        let response = self
            .client
            .post(&self.push_url)
            .header(reqwest::header::AUTHORIZATION, credential)
            .json(payload)
            .send()
            .await
            .map_err(|e| Error::Forward {
                status: None,
                body: ServiceBody::Text(e.to_string()),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        let body = if status.is_client_error() {
            serde_json::from_str(&text)
                .map(ServiceBody::Json)
                .unwrap_or(ServiceBody::Text(text))
        } else {
            ServiceBody::Text(text)
        };
        Err(Error::Forward {
            status: Some(status.as_u16()),
            body,
        })
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Target that accepts everything and only logs what it would push
pub struct LogForwardTarget;

#[async_trait]
impl ForwardTarget for LogForwardTarget {
    async fn submit(&self, _credential: &str, payload: &ForwardPayload) -> Result<()> {
        tracing::info!(
            "Would forward `{}` as {} ({} bytes encoded)",
            payload.title,
            payload.file_name,
            payload.file_content.len()
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use crate::testing::serve;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn payload() -> ForwardPayload {
        ForwardPayload {
            title: "Про бюджет".to_string(),
            link: "https://x/y.pdf".to_string(),
            file_name: "y.pdf.txt".to_string(),
            file_content: "0L4=".to_string(),
        }
    }

    #[tokio::test]
    async fn test_submit_sends_credential_and_json() {
        let seen: Arc<Mutex<Option<(String, serde_json::Value)>>> = Arc::default();
        let captured = seen.clone();
        let router = Router::new().route(
            "/api/document/push",
            post(move |headers: HeaderMap, Json(body): Json<serde_json::Value>| {
                let captured = captured.clone();
                async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    *captured.lock() = Some((auth, body));
                    StatusCode::OK
                }
            }),
        );
        let base_url = serve(router).await;
        let target = HttpForwardTarget::new(&ForwardingConfig {
            base_url,
            ..Default::default()
        })
        .unwrap();

        target.submit("Token secret", &payload()).await.unwrap();

        let (auth, body) = seen.lock().clone().unwrap();
        assert_eq!(auth, "Token secret");
        assert_eq!(body["file_name"], "y.pdf.txt");
        assert_eq!(body["file_content"], "0L4=");
    }

    #[tokio::test]
    async fn test_log_target_accepts_without_credential() {
        assert!(LogForwardTarget.submit("", &payload()).await.is_ok());
        assert_eq!(LogForwardTarget.name(), "log");
    }

    #[tokio::test]
    async fn test_rejection_carries_status_and_body() {
        let router = Router::new().route(
            "/api/document/push",
            post(|| async {
                (
                    StatusCode::FORBIDDEN,
                    Json(serde_json::json!({"detail": "bad key"})),
                )
            }),
        );
        let base_url = serve(router).await;
        let target = HttpForwardTarget::new(&ForwardingConfig {
            base_url,
            ..Default::default()
        })
        .unwrap();

        match target.submit("nope", &payload()).await {
            Err(Error::Forward { status, body }) => {
                assert_eq!(status, Some(403));
                assert_eq!(body, ServiceBody::Json(serde_json::json!({"detail": "bad key"})));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
