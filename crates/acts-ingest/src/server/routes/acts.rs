//! Run endpoints: the WebSocket that starts a run and streams its events

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    Json,
};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use serde::{Deserialize, Serialize};

use crate::processing::cancel_pair;
use crate::server::state::AppState;
use crate::types::{Issuer, ProgressEvent, RunEvent, Stage};

/// GET /acts/ws/ - start a run on the first client message and stream its
/// progress until `{"done": true}`
pub async fn run_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    // Any text frame is the trigger; its content is ignored
    loop {
        match socket.recv().await {
            Some(Ok(Message::Text(_))) => break,
            Some(Ok(Message::Close(_))) | None => return,
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                tracing::debug!("WebSocket error before run start: {}", e);
                return;
            }
        }
    }

    let (mut sender, mut receiver) = socket.split();

    let Some(_guard) = state.try_begin_run() else {
        tracing::warn!("Run requested while another run is in progress");
        let busy = RunEvent::Progress(ProgressEvent::error(
            Stage::ActsProcessor,
            None,
            "A run is already in progress",
        ));
        for event in [busy, RunEvent::done()] {
            if !send_event(&mut sender, &event).await {
                return;
            }
        }
        close(&mut sender).await;
        return;
    };

    tracing::info!("Run started by WebSocket client");
    let (cancel, signal) = cancel_pair();
    let (mut events, run) = state.orchestrator().start(signal);

    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(event) => {
                    if !send_event(&mut sender, &event).await {
                        cancel.cancel();
                        break;
                    }
                }
                None => break,
            },
            message = receiver.next() => match message {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    tracing::info!("WebSocket client left, cancelling run");
                    cancel.cancel();
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    close(&mut sender).await;
    match run.await {
        Ok(summary) => tracing::info!(
            "Run ended: {} issuers, forwarded {:?}, cancelled {}",
            summary.issuers.len(),
            summary.forward.map(|f| f.forwarded),
            summary.cancelled
        ),
        Err(e) => tracing::error!("Run task failed: {}", e),
    }
}

/// Send one event as a JSON text frame; false once the client is gone
async fn send_event(sender: &mut SplitSink<WebSocket, Message>, event: &RunEvent) -> bool {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!("Failed to serialize run event: {}", e);
            return true;
        }
    };
    sender.send(Message::Text(text)).await.is_ok()
}

async fn close(sender: &mut SplitSink<WebSocket, Message>) {
    if let Err(e) = sender.send(Message::Close(None)).await {
        tracing::debug!("WebSocket already closed: {}", e);
    }
}

/// Run state
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub running: bool,
    pub issuers: Vec<IssuerStatus>,
}

/// An issuer the pipeline collects from
#[derive(Debug, Serialize, Deserialize)]
pub struct IssuerStatus {
    pub issuer: Issuer,
    /// Ukrainian city name
    pub name: String,
}

/// GET /acts/status - whether a run is in progress, and for which issuers
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        running: state.is_running(),
        issuers: state
            .orchestrator()
            .issuers()
            .into_iter()
            .map(|issuer| IssuerStatus {
                issuer,
                name: issuer.display_name().to_string(),
            })
            .collect(),
    })
}
