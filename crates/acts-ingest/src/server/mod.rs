//! HTTP server for the acts pipeline

pub mod routes;
pub mod state;

use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::IngestConfig;
use crate::error::{Error, Result};
use state::AppState;

/// Acts HTTP server
pub struct ActsServer {
    config: Arc<IngestConfig>,
    state: AppState,
}

impl ActsServer {
    /// Create a new server with the orchestrator wired from `config`
    pub fn new(config: Arc<IngestConfig>) -> Result<Self> {
        let state = AppState::new(config.clone())?;
        Ok(Self { config, state })
    }

    pub fn with_state(config: Arc<IngestConfig>, state: AppState) -> Self {
        Self { config, state }
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        Router::new()
            .route("/health", get(health_check))
            .nest("/acts", routes::acts_routes())
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
    }

    /// Start the server
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;

        let router = self.build_router();

        tracing::info!("Starting acts server on http://{}", addr);
        tracing::info!("Run stream: ws://{}/acts/ws/", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| Error::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::Extractor;
    use crate::processing::RunOrchestrator;
    use crate::providers::MemoryRecordStore;
    use crate::sources::SourceParser;
    use crate::testing::{serve, RecordingTarget};
    use crate::types::{Issuer, ParsedActs, RunEvent, Stage};
    use async_trait::async_trait;
    use futures::{SinkExt, StreamExt};
    use std::time::Duration;
    use tokio_tungstenite::tungstenite::Message;

    /// Parser with an empty listing that takes `delay` to answer
    struct SlowParser {
        delay: Duration,
    }

    #[async_trait]
    impl SourceParser for SlowParser {
        fn issuer(&self) -> Issuer {
            Issuer::Sumy
        }

        async fn parse(&self, _progress: &crate::processing::Reporter) -> Result<ParsedActs> {
            tokio::time::sleep(self.delay).await;
            Ok(ParsedActs::new())
        }
    }

    async fn start_server(delay: Duration) -> (String, AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = IngestConfig::default();
        config.extraction.data_dir = dir.path().to_path_buf();
        let config = Arc::new(config);

        let orchestrator = RunOrchestrator::new(
            config.clone(),
            Arc::new(MemoryRecordStore::new()),
            Arc::new(RecordingTarget::default()),
            Extractor::new(&config.extraction),
            vec![Arc::new(SlowParser { delay })],
        );
        let state = AppState::with_orchestrator(Arc::new(orchestrator));
        let server = ActsServer::with_state(config, state.clone());
        let base = serve(server.build_router()).await;
        (base.replacen("http://", "ws://", 1), state, dir)
    }

    async fn read_events(
        socket: &mut tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
    ) -> Vec<RunEvent> {
        let mut events = Vec::new();
        while let Some(message) = socket.next().await {
            match message.unwrap() {
                Message::Text(text) => events.push(serde_json::from_str(&text).unwrap()),
                Message::Close(_) => break,
                _ => {}
            }
        }
        events
    }

    #[tokio::test]
    async fn test_health() {
        let (base, _state, _dir) = start_server(Duration::ZERO).await;
        let url = format!("{}/health", base.replacen("ws://", "http://", 1));
        let body = reqwest::get(url).await.unwrap().text().await.unwrap();
        assert_eq!(body, "OK");
    }

    #[tokio::test]
    async fn test_status_names_issuers() {
        let (base, _state, _dir) = start_server(Duration::ZERO).await;
        let url = format!("{}/acts/status", base.replacen("ws://", "http://", 1));
        let status: routes::acts::StatusResponse =
            reqwest::get(url).await.unwrap().json().await.unwrap();

        assert!(!status.running);
        assert_eq!(status.issuers.len(), 1);
        assert_eq!(status.issuers[0].issuer, Issuer::Sumy);
        assert_eq!(status.issuers[0].name, "Суми");
    }

    #[tokio::test]
    async fn test_socket_streams_run_until_done() {
        let (base, state, _dir) = start_server(Duration::ZERO).await;
        let (mut socket, _) = tokio_tungstenite::connect_async(format!("{}/acts/ws/", base))
            .await
            .unwrap();
        socket.send(Message::Text("start".to_string())).await.unwrap();

        let events = read_events(&mut socket).await;

        assert!(events.last().unwrap().is_done());
        let RunEvent::Progress(first) = &events[0] else {
            panic!("expected a progress event first");
        };
        assert_eq!(first.stage, Stage::Parser);
        assert_eq!(first.issuer, Some(Issuer::Sumy));
        assert_eq!(first.message, "Collecting main acts data");
        assert!(events.iter().any(|e| matches!(
            e,
            RunEvent::Progress(p) if p.message == "0 acts processed, 0 forwarded"
        )));

        // The slot is released once the handler finishes
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!state.is_running());
    }

    #[tokio::test]
    async fn test_second_client_is_turned_away() {
        let (base, state, _dir) = start_server(Duration::from_millis(500)).await;
        let url = format!("{}/acts/ws/", base);

        let (mut first, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
        first.send(Message::Text("start".to_string())).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(state.is_running());

        let (mut second, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
        second.send(Message::Text("start".to_string())).await.unwrap();
        let rejected = read_events(&mut second).await;
        assert_eq!(rejected.len(), 2);
        assert!(matches!(&rejected[0], RunEvent::Progress(p) if p.is_error()));
        assert!(rejected[1].is_done());

        let events = read_events(&mut first).await;
        assert!(events.last().unwrap().is_done());
    }

    #[tokio::test]
    async fn test_client_leaving_cancels_run() {
        let (base, state, _dir) = start_server(Duration::from_secs(3600)).await;
        let (mut socket, _) = tokio_tungstenite::connect_async(format!("{}/acts/ws/", base))
            .await
            .unwrap();
        socket.send(Message::Text("start".to_string())).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(state.is_running());

        socket.close(None).await.unwrap();
        drop(socket);

        let released = async {
            while state.is_running() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), released)
            .await
            .unwrap();
    }
}
