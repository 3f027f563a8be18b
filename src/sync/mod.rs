//! Reconciliation
//!
//! Brings a fragment's association list in line with the live children of the
//! folder it describes, then persists the fragment back into the store.
//!
//! A run is strictly sequential: list, removal pass, addition pass, persist.
//! Any failure aborts the rest of the run. Mutations already applied to the
//! document stay applied and nothing is retried.

pub mod plan;

pub use plan::{PlannedRemoval, SyncPlan};

use crate::config::SyncConfig;
use crate::error::FragmentError;
use crate::fragment::{CreateAssociation, FragmentDocument};
use crate::store::{is_staging_name, join_path, ItemStore, StoreEntry};
use crate::types::Guid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Association added for a store entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddedAssociation {
    pub guid: Guid,
    pub name: String,
    pub is_grouping_item: bool,
}

/// Outcome of a completed reconciliation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub folder: String,
    pub removed: Vec<PlannedRemoval>,
    pub added: Vec<AddedAssociation>,
    pub kept: Vec<Guid>,
    /// Store path the fragment was written to
    pub persisted_to: String,
    pub completed_at: DateTime<Utc>,
}

impl SyncReport {
    /// True when the run changed no associations
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }

    pub fn to_json(&self) -> Result<String, FragmentError> {
        serde_json::to_string_pretty(self).map_err(|e| FragmentError::Serialization(e.to_string()))
    }
}

/// One-shot reconciliation of a document against a store folder
#[derive(Debug, Clone, Default)]
pub struct ReconciliationEngine {
    config: SyncConfig,
}

impl ReconciliationEngine {
    pub fn new(config: SyncConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Drop entries that never take part in reconciliation: the fragment file
    /// itself, leftover staging files from interrupted writes, configured
    /// ignore names and, optionally, hidden entries.
    pub fn filter_listing(&self, entries: Vec<StoreEntry>, fragment_filename: &str) -> Vec<StoreEntry> {
        entries
            .into_iter()
            .filter(|entry| entry.name != fragment_filename)
            .filter(|entry| !is_staging_name(&entry.name))
            .filter(|entry| !self.config.ignore_names.iter().any(|n| n == &entry.name))
            .filter(|entry| !(self.config.ignore_hidden && entry.name.starts_with('.')))
            .collect()
    }

    /// Filtered listing of `folder`
    pub async fn listing<S: ItemStore + ?Sized>(
        &self,
        store: &S,
        folder: &str,
        fragment_filename: &str,
    ) -> Result<Vec<StoreEntry>, FragmentError> {
        let entries = store.list(folder).await?;
        Ok(self.filter_listing(entries, fragment_filename))
    }

    /// Compute what a run would do without touching the document or the store
    pub async fn preview<S: ItemStore + ?Sized>(
        &self,
        store: &S,
        folder: &str,
        document: &FragmentDocument,
    ) -> Result<SyncPlan, FragmentError> {
        let listing = self
            .listing(store, folder, document.fragment_filename())
            .await?;
        Ok(SyncPlan::compute(document, &listing))
    }

    /// Reconcile `document` with the children of `folder` and persist it.
    ///
    /// On error the document keeps whatever removals and additions were
    /// applied before the failing step.
    pub async fn run<S: ItemStore + ?Sized>(
        &self,
        store: &S,
        folder: &str,
        document: &mut FragmentDocument,
    ) -> Result<SyncReport, FragmentError> {
        let result = self.run_inner(store, folder, document).await;
        if let Err(err) = &result {
            warn!(folder, error = %err, "Reconciliation aborted");
        }
        result
    }

    async fn run_inner<S: ItemStore + ?Sized>(
        &self,
        store: &S,
        folder: &str,
        document: &mut FragmentDocument,
    ) -> Result<SyncReport, FragmentError> {
        let listing = self
            .listing(store, folder, document.fragment_filename())
            .await?;
        debug!(folder, entries = listing.len(), "Listed folder");

        let plan = SyncPlan::compute(document, &listing);

        for removal in &plan.removals {
            document.delete_association(removal.guid)?;
            debug!(guid = %removal.guid, item = %removal.local_item, "Removed stale association");
        }

        let mut added = Vec::with_capacity(plan.additions.len());
        for entry in &plan.additions {
            let request = if entry.is_container {
                CreateAssociation::NewGroupingItem {
                    display_text: entry.name.clone(),
                    item_name: entry.name.clone(),
                }
            } else {
                CreateAssociation::NewItem {
                    display_text: entry.name.clone(),
                    item_name: entry.name.clone(),
                }
            };
            let guid = document.create_association(request)?;
            debug!(guid = %guid, item = %entry.name, "Added association");
            added.push(AddedAssociation {
                guid,
                name: entry.name.clone(),
                is_grouping_item: entry.is_container,
            });
        }

        let persisted_to = join_path(folder, document.fragment_filename());
        let text = document.to_text()?;
        store.create_leaf(&persisted_to, text.as_bytes()).await?;

        info!(
            folder,
            removed = plan.removals.len(),
            added = added.len(),
            kept = plan.kept.len(),
            "Reconciled fragment"
        );

        Ok(SyncReport {
            folder: folder.to_string(),
            removed: plan.removals,
            added,
            kept: plan.kept,
            persisted_to,
            completed_at: Utc::now(),
        })
    }
}
