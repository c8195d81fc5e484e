//! Reconciliation of a parsed listing with the stored acts of one issuer
//!
//! Identity is `(issuer, act_id)`, never the store's record ID. New acts are
//! created with their documents, acts absent from the listing are flagged
//! `removed_from_source`, matching acts are left alone.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::{ActFilter, ActPatch, RecordStore};
use crate::types::{Act, Issuer, ParsedActs, Stage};

use super::progress::{ProgressSink, Reporter};

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Acts in the parser output
    pub parsed: usize,
    pub created: usize,
    /// Parsed acts already stored
    pub unchanged: usize,
    pub marked_removed: usize,
    /// Stored acts flagged removed that the source lists again
    pub reappeared: usize,
}

/// Diffs parser output against the record store
pub struct Reconciler {
    store: Arc<dyn RecordStore>,
    sink: Arc<dyn ProgressSink>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn RecordStore>, sink: Arc<dyn ProgressSink>) -> Self {
        Self { store, sink }
    }

    /// Reconcile `parsed` with the stored acts of `issuer`.
    ///
    /// The first store failure aborts the pass; acts created or flagged
    /// before it stay as they are.
    pub async fn reconcile(&self, issuer: Issuer, parsed: &ParsedActs) -> Result<ReconcileStats> {
        let reporter = Reporter::new(self.sink.clone(), Stage::Storing, Some(issuer));
        let mut stats = ReconcileStats {
            parsed: parsed.len(),
            ..Default::default()
        };

        reporter.info("Storing acts to the database");
        let mut stored: HashMap<String, Act> = self
            .store
            .fetch_acts(ActFilter::issuer(issuer))
            .await?
            .into_iter()
            .map(|act| (act.act_id.clone(), act))
            .collect();
        tracing::info!("{}: {} parsed acts, {} stored", issuer, parsed.len(), stored.len());

        reporter.info("Storing main acts data");
        for (act_id, act) in parsed {
            match stored.remove(act_id) {
                Some(existing) => {
                    stats.unchanged += 1;
                    // Removal is not undone here; the act needs a manual look
                    if existing.removed_from_source {
                        stats.reappeared += 1;
                        tracing::warn!(
                            "{}: act {} is listed again but stays marked removed",
                            issuer,
                            act_id
                        );
                    }
                }
                None => {
                    self.store.create_act(act).await?;
                    stats.created += 1;
                }
            }
        }

        if stats.created > 0 {
            reporter.info(format!("{} new acts stored", stats.created));
        } else {
            reporter.info("No new acts stored");
        }

        let mut vanished: Vec<&Act> = stored
            .values()
            .filter(|act| !act.removed_from_source)
            .collect();
        vanished.sort_by(|a, b| a.act_id.cmp(&b.act_id));

        if !vanished.is_empty() {
            reporter.info(format!("Marking {} acts as removed", vanished.len()));
            for act in vanished {
                let id = act.id.ok_or_else(|| {
                    Error::internal(format!("Stored act {} of {} has no record ID", act.act_id, issuer))
                })?;
                self.store
                    .change_act(id, &ActPatch::removed_from_source())
                    .await?;
                stats.marked_removed += 1;
            }
        }

        if stats.reappeared > 0 {
            tracing::warn!(
                "{}: {} removed acts reappeared at the source",
                issuer,
                stats.reappeared
            );
        }
        tracing::info!(
            "{}: reconciled, {} created, {} unchanged, {} marked removed",
            issuer,
            stats.created,
            stats.unchanged,
            stats.marked_removed
        );
        Ok(stats)
    }
}
