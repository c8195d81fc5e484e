//! Progress reporting
//!
//! Pipeline stages hold a `Reporter` bound to their stage and issuer and
//! push events into a shared `ProgressSink`. Sinks never block the producer.

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::types::{Issuer, ProgressEvent, RunEvent, Stage};

/// Destination of run events
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: RunEvent);

    fn report(&self, stage: Stage, issuer: Option<Issuer>, message: String) {
        self.emit(RunEvent::Progress(ProgressEvent::info(stage, issuer, message)));
    }

    fn report_error(&self, stage: Stage, issuer: Option<Issuer>, message: String) {
        self.emit(RunEvent::Progress(ProgressEvent::error(stage, issuer, message)));
    }
}

/// Sink feeding an unbounded channel, drained by the transport
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<RunEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RunEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ProgressSink for ChannelSink {
    fn emit(&self, event: RunEvent) {
        // A gone receiver means the observer left; the run carries on
        if self.sender.send(event).is_err() {
            tracing::debug!("Progress observer disconnected, event dropped");
        }
    }
}

/// Sink writing events to the log, for unattended runs
pub struct LogSink;

impl ProgressSink for LogSink {
    fn emit(&self, event: RunEvent) {
        match event {
            RunEvent::Progress(event) => {
                let issuer = event.issuer.map(|i| i.as_str()).unwrap_or("all");
                if event.is_error() {
                    tracing::error!("[{}] {}", issuer, event.message);
                } else {
                    tracing::info!("[{}] {}", issuer, event.message);
                }
            }
            RunEvent::Done { .. } => tracing::info!("Run finished"),
        }
    }
}

/// A sink bound to one stage and issuer
#[derive(Clone)]
pub struct Reporter {
    sink: Arc<dyn ProgressSink>,
    stage: Stage,
    issuer: Option<Issuer>,
}

impl Reporter {
    pub fn new(sink: Arc<dyn ProgressSink>, stage: Stage, issuer: Option<Issuer>) -> Self {
        Self {
            sink,
            stage,
            issuer,
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.sink.report(self.stage, self.issuer, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.sink.report_error(self.stage, self.issuer, message.into());
    }

    pub fn issuer(&self) -> Option<Issuer> {
        self.issuer
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Level;

    #[test]
    fn test_reporter_tags_stage_and_issuer() {
        let (sink, mut receiver) = ChannelSink::new();
        let reporter = Reporter::new(Arc::new(sink), Stage::Storing, Some(Issuer::Sumy));

        reporter.info("2 new acts stored");
        reporter.error("Store unavailable");

        let RunEvent::Progress(first) = receiver.try_recv().unwrap() else {
            panic!("expected a progress event");
        };
        assert_eq!(first.stage, Stage::Storing);
        assert_eq!(first.issuer, Some(Issuer::Sumy));
        assert_eq!(first.level, Level::Info);

        let RunEvent::Progress(second) = receiver.try_recv().unwrap() else {
            panic!("expected a progress event");
        };
        assert!(second.is_error());
    }

    #[test]
    fn test_closed_channel_does_not_panic() {
        let (sink, receiver) = ChannelSink::new();
        drop(receiver);
        sink.emit(RunEvent::done());
    }
}
