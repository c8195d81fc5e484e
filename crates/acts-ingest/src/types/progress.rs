//! Progress events streamed to run observers

use serde::{Deserialize, Serialize};

use super::Issuer;

/// Pipeline stage that produced an event; serialized as the event `type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    #[serde(rename = "parser-message")]
    Parser,
    #[serde(rename = "storing-message")]
    Storing,
    #[serde(rename = "docs-loader-message")]
    DocsLoader,
    #[serde(rename = "acts-processor-message")]
    ActsProcessor,
}

/// Severity of an event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    #[default]
    Info,
    Error,
}

impl Level {
    fn is_info(&self) -> bool {
        *self == Level::Info
    }
}

/// A single progress message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub stage: Stage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<Issuer>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Level::is_info")]
    pub level: Level,
}

impl ProgressEvent {
    pub fn info(stage: Stage, issuer: Option<Issuer>, message: impl Into<String>) -> Self {
        Self {
            stage,
            issuer,
            message: message.into(),
            level: Level::Info,
        }
    }

    pub fn error(stage: Stage, issuer: Option<Issuer>, message: impl Into<String>) -> Self {
        Self {
            stage,
            issuer,
            message: message.into(),
            level: Level::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == Level::Error
    }
}

/// Everything a run observer receives: progress messages, then one `{done: true}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunEvent {
    Progress(ProgressEvent),
    Done { done: bool },
}

impl RunEvent {
    pub fn done() -> Self {
        RunEvent::Done { done: true }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, RunEvent::Done { done: true })
    }
}
