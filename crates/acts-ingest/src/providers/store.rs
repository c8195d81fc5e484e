//! Record store provider trait
//!
//! The record store owns acts and documents. The pipeline never holds
//! state of its own between calls; every call is assumed atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::types::{Act, ActToForward, Document, Issuer, ParsedAct};

/// Filter for listing acts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActFilter {
    pub issuer: Option<Issuer>,
    pub removed_from_source: Option<bool>,
}

impl ActFilter {
    /// All acts of one issuer, removed or not
    pub fn issuer(issuer: Issuer) -> Self {
        Self {
            issuer: Some(issuer),
            removed_from_source: None,
        }
    }
}

/// Filter for listing documents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocumentFilter {
    pub issuer: Option<Issuer>,
    /// Only documents without a stored file whose act is still listed
    pub needs_file: bool,
}

impl DocumentFilter {
    /// Documents of one issuer still waiting for their file
    pub fn missing_files(issuer: Issuer) -> Self {
        Self {
            issuer: Some(issuer),
            needs_file: true,
        }
    }
}

/// Partial update of an act
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forwarded: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed_from_source: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub needs_inspection: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

impl ActPatch {
    pub fn forwarded() -> Self {
        Self {
            forwarded: Some(true),
            ..Default::default()
        }
    }

    pub fn removed_from_source() -> Self {
        Self {
            removed_from_source: Some(true),
            ..Default::default()
        }
    }
}

/// A downloaded file attached to a document update
#[derive(Debug, Clone, PartialEq)]
pub struct FileUpload {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Partial update of a document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentPatch {
    pub last_modified: Option<DateTime<Utc>>,
    pub file: Option<FileUpload>,
}

/// Trait for the record store
///
/// Implementations:
/// - `HttpRecordStore`: the store's REST API
/// - `MemoryRecordStore`: in-process store for tests and local runs
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// List acts
    async fn fetch_acts(&self, filter: ActFilter) -> Result<Vec<Act>>;

    /// Create an act together with its documents
    async fn create_act(&self, act: &ParsedAct) -> Result<Act>;

    /// Update fields of an act
    async fn change_act(&self, id: i64, patch: &ActPatch) -> Result<Act>;

    /// List documents
    async fn fetch_documents(&self, filter: DocumentFilter) -> Result<Vec<Document>>;

    /// Update a document, optionally attaching its file
    async fn change_document(&self, id: i64, patch: DocumentPatch) -> Result<Document>;

    /// Acts not yet forwarded, not removed, with every document's file stored
    async fn fetch_acts_to_forward(&self) -> Result<Vec<ActToForward>>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
