//! Pure diff between a document's associations and a store listing

use crate::fragment::FragmentDocument;
use crate::store::StoreEntry;
use crate::types::Guid;
use serde::{Deserialize, Serialize};

/// An association whose local item is gone from the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedRemoval {
    pub guid: Guid,
    pub local_item: String,
}

/// Result of diffing a document against a listing, without applying anything.
///
/// `additions` keeps listing order; `removals` and `kept` keep document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPlan {
    pub removals: Vec<PlannedRemoval>,
    pub additions: Vec<StoreEntry>,
    pub kept: Vec<Guid>,
}

impl SyncPlan {
    /// Diff `document` against an already filtered `listing`.
    ///
    /// Each association with a non-empty local item consumes the first
    /// unconsumed entry with the same name. Associations without a local item
    /// are left alone and reported as kept.
    pub fn compute(document: &FragmentDocument, listing: &[StoreEntry]) -> Self {
        let mut remaining: Vec<&StoreEntry> = listing.iter().collect();
        let mut plan = SyncPlan::default();

        for record in document.associations() {
            let local_item = match record.local_item() {
                Some(name) if !name.is_empty() => name,
                _ => {
                    plan.kept.push(record.guid());
                    continue;
                }
            };

            match remaining.iter().position(|entry| entry.name == local_item) {
                Some(index) => {
                    remaining.remove(index);
                    plan.kept.push(record.guid());
                }
                None => plan.removals.push(PlannedRemoval {
                    guid: record.guid(),
                    local_item: local_item.to_string(),
                }),
            }
        }

        plan.additions = remaining.into_iter().cloned().collect();
        plan
    }

    pub fn is_empty(&self) -> bool {
        self.removals.is_empty() && self.additions.is_empty()
    }
}
