//! Helpers shared by the test modules

use async_trait::async_trait;
use axum::Router;
use parking_lot::Mutex;

use crate::error::{Error, Result, ServiceBody};
use crate::providers::ForwardTarget;
use crate::types::ForwardPayload;

/// Serve `router` on an ephemeral local port, returning its base URL
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Forward target that records submissions and rejects chosen titles
#[derive(Default)]
pub struct RecordingTarget {
    rejected_titles: Vec<String>,
    submissions: Mutex<Vec<(String, ForwardPayload)>>,
}

impl RecordingTarget {
    pub fn rejecting(titles: &[&str]) -> Self {
        Self {
            rejected_titles: titles.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    /// `(credential, payload)` pairs in submission order
    pub fn submissions(&self) -> Vec<(String, ForwardPayload)> {
        self.submissions.lock().clone()
    }
}

#[async_trait]
impl ForwardTarget for RecordingTarget {
    async fn submit(&self, credential: &str, payload: &ForwardPayload) -> Result<()> {
        self.submissions
            .lock()
            .push((credential.to_string(), payload.clone()));
        if self.rejected_titles.contains(&payload.title) {
            return Err(Error::Forward {
                status: Some(500),
                body: ServiceBody::Text("Internal Server Error".to_string()),
            });
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}
