//! Acts, their documents, and the projections exchanged with the record store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Issuer;

/// A document attached to an act, as stored in the record store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Record ID (assigned by the store)
    #[serde(default)]
    pub id: Option<i64>,
    /// Owning act's record ID
    #[serde(default)]
    pub act: Option<i64>,
    /// Concatenation order within the act; 0 is the primary document
    pub order: u16,
    /// Source URL
    pub url: String,
    /// Stored file reference, relative to the shared data directory
    #[serde(default, deserialize_with = "empty_as_none")]
    pub file: Option<String>,
    /// Remote last-modified time, or the fetch time when the server sent none
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
}

impl Document {
    /// Whether the document still waits for its file
    pub fn needs_file(&self) -> bool {
        self.file.is_none()
    }
}

/// An act as stored in the record store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Act {
    #[serde(default)]
    pub id: Option<i64>,
    pub issuer: Issuer,
    /// Identifier assigned by the issuer, unique per issuer
    pub act_id: String,
    pub title: String,
    #[serde(default)]
    pub documents: Vec<Document>,
    /// Successfully submitted to the aggregation service
    #[serde(default)]
    pub forwarded: bool,
    /// No longer listed by the source
    #[serde(default)]
    pub removed_from_source: bool,
    #[serde(default)]
    pub needs_inspection: bool,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
}

impl Act {
    /// The document with `order == 0`
    pub fn primary_document(&self) -> Option<&Document> {
        self.documents.iter().find(|d| d.order == 0)
    }

    /// Reconciliation identity
    pub fn key(&self) -> (Issuer, &str) {
        (self.issuer, self.act_id.as_str())
    }
}

/// A document reference as reported by a source parser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub order: u16,
    pub url: String,
}

/// An act as reported by a source parser.
///
/// This is also the creation payload sent to the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedAct {
    pub issuer: Issuer,
    pub act_id: String,
    pub title: String,
    pub documents: Vec<DocumentRef>,
}

impl ParsedAct {
    pub fn new(
        issuer: Issuer,
        act_id: impl Into<String>,
        title: impl Into<String>,
        documents: Vec<DocumentRef>,
    ) -> Self {
        Self {
            issuer,
            act_id: act_id.into(),
            title: title.into(),
            documents,
        }
    }
}

/// Normalized output of one source parser, keyed by act identifier
pub type ParsedActs = BTreeMap<String, ParsedAct>;

/// Read-model of an act that is ready to be forwarded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActToForward {
    pub id: i64,
    pub issuer: Issuer,
    pub title: String,
    /// URL of the primary document
    pub link: String,
    /// File name of the primary document's stored file
    pub file_name: String,
    /// Stored file references for all documents, in document order
    pub files: Vec<String>,
}

/// Body submitted to the aggregation service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForwardPayload {
    pub title: String,
    pub link: String,
    pub file_name: String,
    /// Base64 of the concatenated extracted text
    pub file_content: String,
}

/// The store serializes "no file" as an empty string or null
fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}
