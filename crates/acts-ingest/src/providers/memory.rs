//! In-process record store
//!
//! Mirrors the REST store's filtering rules. Every mutation is appended to
//! a journal so callers can check exactly what a pipeline stage changed.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::path::PathBuf;

use crate::error::{Error, Result, ServiceBody};
use crate::types::{Act, ActToForward, Document, Issuer, ParsedAct};

use super::store::{ActFilter, ActPatch, DocumentFilter, DocumentPatch, RecordStore};

/// A mutation applied to the store
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    CreateAct { issuer: Issuer, act_id: String },
    ChangeAct { id: i64, patch: ActPatch },
    ChangeDocument { id: i64, with_file: bool },
}

#[derive(Default)]
struct Inner {
    acts: Vec<Act>,
    next_act_id: i64,
    next_document_id: i64,
    journal: Vec<StoreOp>,
    failing: Vec<String>,
}

impl Inner {
    fn assign_ids(&mut self, act: &mut Act) -> i64 {
        let id = match act.id {
            Some(id) => id,
            None => {
                self.next_act_id += 1;
                self.next_act_id
            }
        };
        self.next_act_id = self.next_act_id.max(id);
        act.id = Some(id);
        for document in &mut act.documents {
            if document.id.is_none() {
                self.next_document_id += 1;
                document.id = Some(self.next_document_id);
            }
            document.act = Some(id);
        }
        id
    }

    fn check(&self, operation: &str) -> Result<()> {
        if self.failing.iter().any(|op| op == operation) {
            return Err(Error::Store {
                operation: operation.to_string(),
                status: Some(500),
                body: ServiceBody::Text("Internal Server Error".to_string()),
            });
        }
        Ok(())
    }

    /// File reference for an upload, suffixed `_1`, `_2`, ... when another
    /// document of the issuer already holds the name
    fn available_ref(&self, id: i64, issuer: Issuer, name: &str) -> String {
        let taken = |file_ref: &str| {
            self.acts
                .iter()
                .filter(|a| a.issuer == issuer)
                .flat_map(|a| a.documents.iter())
                .any(|d| d.id != Some(id) && d.file.as_deref() == Some(file_ref))
        };

        let mut file_ref = format!("acts/{}/{}", issuer, name);
        let mut n = 0;
        while taken(&file_ref) {
            n += 1;
            let numbered = match name.rsplit_once('.') {
                Some((stem, ext)) if !stem.is_empty() => format!("{}_{}.{}", stem, n, ext),
                _ => format!("{}_{}", name, n),
            };
            file_ref = format!("acts/{}/{}", issuer, numbered);
        }
        file_ref
    }

    fn document_mut(&mut self, id: i64) -> Option<(Issuer, &mut Document)> {
        self.acts.iter_mut().find_map(|act| {
            let issuer = act.issuer;
            act.documents
                .iter_mut()
                .find(|d| d.id == Some(id))
                .map(|d| (issuer, d))
        })
    }
}

/// In-memory record store
#[derive(Default)]
pub struct MemoryRecordStore {
    inner: RwLock<Inner>,
    /// When set, attached files are written below this directory
    data_dir: Option<PathBuf>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that writes attached files to `data_dir/acts/<issuer>/<name>`
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            inner: RwLock::default(),
            data_dir: Some(data_dir.into()),
        }
    }

    /// Insert an act as pre-existing state, without journaling it.
    ///
    /// Missing record IDs are assigned. Returns the act's ID.
    pub fn insert(&self, mut act: Act) -> i64 {
        let mut inner = self.inner.write();
        let id = inner.assign_ids(&mut act);
        inner.acts.push(act);
        id
    }

    /// Snapshot of all stored acts
    pub fn acts(&self) -> Vec<Act> {
        self.inner.read().acts.clone()
    }

    pub fn act(&self, issuer: Issuer, act_id: &str) -> Option<Act> {
        self.inner
            .read()
            .acts
            .iter()
            .find(|a| a.key() == (issuer, act_id))
            .cloned()
    }

    /// Mutations applied since creation or the last `clear_journal`
    pub fn journal(&self) -> Vec<StoreOp> {
        self.inner.read().journal.clone()
    }

    #[cfg(test)]
    pub fn clear_journal(&self) {
        self.inner.write().journal.clear();
    }

    /// Make every later call of `operation` fail with a 500
    #[cfg(test)]
    pub fn fail_on(&self, operation: &str) {
        self.inner.write().failing.push(operation.to_string());
    }

    /// Build a stored act from parser output
    pub fn act_from_parsed(parsed: &ParsedAct) -> Act {
        let now = Utc::now();
        Act {
            id: None,
            issuer: parsed.issuer,
            act_id: parsed.act_id.clone(),
            title: parsed.title.clone(),
            documents: parsed
                .documents
                .iter()
                .map(|d| Document {
                    id: None,
                    act: None,
                    order: d.order,
                    url: d.url.clone(),
                    file: None,
                    last_modified: None,
                    created: Some(now),
                    updated: Some(now),
                })
                .collect(),
            forwarded: false,
            removed_from_source: false,
            needs_inspection: false,
            comments: None,
            created: Some(now),
            updated: Some(now),
        }
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn fetch_acts(&self, filter: ActFilter) -> Result<Vec<Act>> {
        let inner = self.inner.read();
        inner.check("fetch_acts")?;
        Ok(inner
            .acts
            .iter()
            .filter(|a| filter.issuer.map_or(true, |i| a.issuer == i))
            .filter(|a| {
                filter
                    .removed_from_source
                    .map_or(true, |r| a.removed_from_source == r)
            })
            .cloned()
            .collect())
    }

    async fn create_act(&self, act: &ParsedAct) -> Result<Act> {
        let mut inner = self.inner.write();
        inner.check("create_act")?;
        if inner.acts.iter().any(|a| a.key() == (act.issuer, act.act_id.as_str())) {
            return Err(Error::Store {
                operation: "create_act".to_string(),
                status: Some(400),
                body: ServiceBody::Json(serde_json::json!({
                    "non_field_errors": ["The fields issuer, act_id must make a unique set."]
                })),
            });
        }

        let mut stored = Self::act_from_parsed(act);
        inner.assign_ids(&mut stored);
        inner.journal.push(StoreOp::CreateAct {
            issuer: act.issuer,
            act_id: act.act_id.clone(),
        });
        inner.acts.push(stored.clone());
        Ok(stored)
    }

    async fn change_act(&self, id: i64, patch: &ActPatch) -> Result<Act> {
        let mut inner = self.inner.write();
        inner.check("change_act")?;
        let act = inner
            .acts
            .iter_mut()
            .find(|a| a.id == Some(id))
            .ok_or_else(|| Error::Store {
                operation: "change_act".to_string(),
                status: Some(404),
                body: ServiceBody::Json(serde_json::json!({"detail": "Not found."})),
            })?;

        if let Some(forwarded) = patch.forwarded {
            act.forwarded = forwarded;
        }
        if let Some(removed) = patch.removed_from_source {
            act.removed_from_source = removed;
        }
        if let Some(needs_inspection) = patch.needs_inspection {
            act.needs_inspection = needs_inspection;
        }
        if let Some(comments) = &patch.comments {
            act.comments = Some(comments.clone());
        }
        act.updated = Some(Utc::now());
        let updated = act.clone();

        inner.journal.push(StoreOp::ChangeAct {
            id,
            patch: patch.clone(),
        });
        Ok(updated)
    }

    async fn fetch_documents(&self, filter: DocumentFilter) -> Result<Vec<Document>> {
        let inner = self.inner.read();
        inner.check("fetch_documents")?;
        Ok(inner
            .acts
            .iter()
            .filter(|a| filter.issuer.map_or(true, |i| a.issuer == i))
            .filter(|a| !filter.needs_file || !a.removed_from_source)
            .flat_map(|a| a.documents.iter())
            .filter(|d| !filter.needs_file || d.needs_file())
            .cloned()
            .collect())
    }

    async fn change_document(&self, id: i64, patch: DocumentPatch) -> Result<Document> {
        let file_ref = {
            let mut inner = self.inner.write();
            inner.check("change_document")?;
            let issuer = match inner.document_mut(id) {
                Some((issuer, _)) => issuer,
                None => {
                    return Err(Error::Store {
                        operation: "change_document".to_string(),
                        status: Some(404),
                        body: ServiceBody::Json(serde_json::json!({"detail": "Not found."})),
                    })
                }
            };
            patch
                .file
                .as_ref()
                .map(|file| inner.available_ref(id, issuer, &file.name))
        };

        let file_ref = match (&patch.file, file_ref) {
            (Some(file), Some(file_ref)) => {
                if let Some(data_dir) = &self.data_dir {
                    let path = data_dir.join(&file_ref);
                    if let Some(parent) = path.parent() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                    tokio::fs::write(&path, &file.bytes).await?;
                }
                Some(file_ref)
            }
            _ => None,
        };

        let mut inner = self.inner.write();
        let (_, document) = inner.document_mut(id).ok_or_else(|| {
            Error::store_unreachable("change_document", format!("Document {} vanished", id))
        })?;
        if let Some(last_modified) = patch.last_modified {
            document.last_modified = Some(last_modified);
        }
        if file_ref.is_some() {
            document.file = file_ref;
        }
        document.updated = Some(Utc::now());
        let updated = document.clone();

        inner.journal.push(StoreOp::ChangeDocument {
            id,
            with_file: patch.file.is_some(),
        });
        Ok(updated)
    }

    async fn fetch_acts_to_forward(&self) -> Result<Vec<ActToForward>> {
        let inner = self.inner.read();
        inner.check("fetch_acts_to_forward")?;

        let mut result = Vec::new();
        for act in &inner.acts {
            if act.forwarded || act.removed_from_source || act.documents.is_empty() {
                continue;
            }
            if act.documents.iter().any(Document::needs_file) {
                continue;
            }
            let (Some(id), Some(primary)) = (act.id, act.primary_document()) else {
                continue;
            };

            let mut documents: Vec<&Document> = act.documents.iter().collect();
            documents.sort_by_key(|d| d.order);
            let primary_file = primary.file.clone().unwrap_or_default();

            result.push(ActToForward {
                id,
                issuer: act.issuer,
                title: act.title.clone(),
                link: primary.url.clone(),
                file_name: primary_file
                    .rsplit('/')
                    .next()
                    .unwrap_or_default()
                    .to_string(),
                files: documents.iter().filter_map(|d| d.file.clone()).collect(),
            });
        }
        Ok(result)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
