//! Folder sessions
//!
//! A [`FolderSession`] binds one fragment document to the store folder it
//! describes. It owns the document handle, loads and saves the fragment file,
//! and keeps physical items and their associations in step.

use crate::config::FragsyncConfig;
use crate::error::{FragmentError, StoreError};
use crate::fragment::create::validate_item_name;
use crate::fragment::{CreateAssociation, FragmentDocument};
use crate::store::{join_path, ItemStore};
use crate::sync::{ReconciliationEngine, SyncPlan, SyncReport};
use crate::types::Guid;
use std::sync::Arc;
use tracing::debug;

/// Document handle for one described folder
pub struct FolderSession<S: ItemStore + ?Sized> {
    store: Arc<S>,
    folder: String,
    document: FragmentDocument,
    engine: ReconciliationEngine,
}

impl<S: ItemStore + ?Sized> FolderSession<S> {
    /// Load the folder's fragment, or start a fresh one when it has none
    pub async fn open(
        store: Arc<S>,
        folder: impl Into<String>,
        config: &FragsyncConfig,
    ) -> Result<Self, FragmentError> {
        let folder = folder.into();
        let fragment_path = join_path(&folder, &config.fragment.filename);

        let document = if store.exists(&fragment_path).await? {
            let bytes = store.read_leaf(&fragment_path).await?;
            let text = String::from_utf8(bytes).map_err(|e| {
                FragmentError::Parse(format!("{} is not UTF-8: {}", fragment_path, e))
            })?;
            let mut document = FragmentDocument::from_text(&text)?;
            document.set_fragment_filename(config.fragment.filename.as_str());
            debug!(path = %fragment_path, associations = document.associations().len(), "Loaded fragment");
            document
        } else {
            debug!(path = %fragment_path, "No fragment found, starting a new one");
            FragmentDocument::new(&config.fragment)
        };

        Ok(Self {
            store,
            folder,
            document,
            engine: ReconciliationEngine::new(config.sync.clone()),
        })
    }

    pub fn folder(&self) -> &str {
        &self.folder
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn document(&self) -> &FragmentDocument {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut FragmentDocument {
        &mut self.document
    }

    pub fn into_document(self) -> FragmentDocument {
        self.document
    }

    /// Store path of this folder's fragment file
    pub fn fragment_path(&self) -> String {
        join_path(&self.folder, self.document.fragment_filename())
    }

    /// Write the document back to the fragment file
    pub async fn save(&self) -> Result<String, FragmentError> {
        let path = self.fragment_path();
        let text = self.document.to_text()?;
        self.store.create_leaf(&path, text.as_bytes()).await?;
        debug!(path = %path, "Saved fragment");
        Ok(path)
    }

    /// Reconcile against the live folder and persist
    pub async fn reconcile(&mut self) -> Result<SyncReport, FragmentError> {
        self.engine
            .run(self.store.as_ref(), &self.folder, &mut self.document)
            .await
    }

    /// What [`reconcile`](Self::reconcile) would change, without changing it
    pub async fn preview(&self) -> Result<SyncPlan, FragmentError> {
        self.engine
            .preview(self.store.as_ref(), &self.folder, &self.document)
            .await
    }

    /// Create a physical item in the folder and record it.
    ///
    /// The store item is created first; if that fails no association is added.
    pub async fn create_item(
        &mut self,
        display_text: &str,
        item_name: &str,
        is_grouping_item: bool,
    ) -> Result<Guid, FragmentError> {
        validate_item_name(item_name)?;
        if display_text.is_empty() {
            return Err(FragmentError::MissingParameter(
                "display_text is required".to_string(),
            ));
        }

        let path = join_path(&self.folder, item_name);
        if self.store.exists(&path).await? {
            return Err(StoreError::AlreadyExists(path).into());
        }

        let request = if is_grouping_item {
            self.store.create_container(&path).await?;
            CreateAssociation::NewGroupingItem {
                display_text: display_text.to_string(),
                item_name: item_name.to_string(),
            }
        } else {
            self.store.create_leaf(&path, &[]).await?;
            CreateAssociation::NewItem {
                display_text: display_text.to_string(),
                item_name: item_name.to_string(),
            }
        };
        self.document.create_association(request)
    }

    /// Delete the association's physical item, then the association.
    ///
    /// An item already missing from the store is not an error. Associations
    /// without a local item are simply dropped.
    pub async fn remove_item(&mut self, guid: Guid) -> Result<(), FragmentError> {
        let record = self.document.association(guid)?;
        if record.has_local_item() {
            let name = record.local_item().unwrap_or_default();
            let path = join_path(&self.folder, name);
            let outcome = if record.is_grouping_item()? {
                self.store.delete_container(&path).await
            } else {
                self.store.delete_leaf(&path).await
            };
            match outcome {
                Ok(()) => {}
                Err(StoreError::NotFound(_)) => {
                    debug!(path = %path, "Item already gone from store");
                }
                Err(err) => return Err(err.into()),
            }
        }
        self.document.delete_association(guid)
    }

    /// Store path of a grouping item's own fragment
    pub fn child_fragment_path(&self, guid: Guid) -> Result<Option<String>, FragmentError> {
        let record = self.document.association(guid)?;
        Ok(record
            .child_fragment_path()?
            .map(|relative| join_path(&self.folder, relative)))
    }

    /// Open a session for a grouping item's folder
    pub async fn open_child(
        &self,
        guid: Guid,
        config: &FragsyncConfig,
    ) -> Result<FolderSession<S>, FragmentError> {
        let record = self.document.association(guid)?;
        if !record.is_grouping_item()? || !record.has_local_item() {
            return Err(FragmentError::InvalidState(format!(
                "association {} is not a local grouping item",
                guid
            )));
        }
        let child = join_path(&self.folder, record.local_item().unwrap_or_default());
        FolderSession::open(Arc::clone(&self.store), child, config).await
    }
}
