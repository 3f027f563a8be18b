//! Fragsync: folder metadata fragments and reconciliation
//!
//! Each described folder carries one XML fragment listing associations to its
//! children, with per-application namespaced attributes. The reconciliation
//! engine keeps that list consistent with what an item store actually holds.

pub mod config;
pub mod error;
pub mod folder;
pub mod fragment;
pub mod logging;
pub mod store;
pub mod sync;
pub mod types;

pub use config::{ConfigLoader, FragsyncConfig};
pub use error::{FragmentError, StoreError};
pub use folder::FolderSession;
pub use fragment::{AssociationParams, CreateAssociation, FragmentDocument};
pub use store::{ItemStore, LocalItemStore, MemoryItemStore};
pub use sync::{ReconciliationEngine, SyncPlan, SyncReport};
pub use types::{Guid, Namespace, Scope};
