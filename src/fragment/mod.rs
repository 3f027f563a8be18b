//! Fragment documents
//!
//! A fragment describes one folder: fragment-level common attributes and
//! namespace data, plus an ordered set of associations keyed by identity.
//! Every successful mutation regenerates the write generation; a failed call
//! leaves the document (including its write generation) untouched.

pub mod association;
pub mod attributes;
pub mod codec;
pub mod create;

pub use association::{AssociationFields, AssociationRecord};
pub use attributes::{AttributeStore, NamespacePartition};
pub use codec::{OpaqueElement, DEFAULT_FRAGMENT_FILENAME, FRAGMENT_NAMESPACE, SCHEMA_VERSION};
pub use create::{AssociationParams, CreateAssociation};

use crate::config::FragmentConfig;
use crate::error::FragmentError;
use crate::fragment::association::{format_bool, parse_bool};
use crate::fragment::codec::attr;
use crate::types::{Guid, Namespace, Scope};
use std::collections::BTreeMap;
use tracing::debug;

/// Common attributes only the document itself may write
const MANAGED_ATTRIBUTES: [&str; 2] = [attr::GUID, attr::WRITE_GENERATION];

/// Association attributes tied together by the grouping flag. They can be set
/// through the typed setters but never added or removed on their own.
const GROUPING_ATTRIBUTES: [&str; 2] = [attr::IS_GROUPING_ITEM, attr::ASSOCIATED_FRAGMENT];

/// Metadata document for one folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentDocument {
    attributes: AttributeStore,
    associations: Vec<AssociationRecord>,
    extensions: Vec<OpaqueElement>,
    declarations: BTreeMap<String, String>,
    fragment_filename: String,
}

impl Default for FragmentDocument {
    fn default() -> Self {
        Self::new(&FragmentConfig::default())
    }
}

impl FragmentDocument {
    /// Synthesize an empty fragment describing "this folder"
    pub fn new(config: &FragmentConfig) -> Self {
        let mut attributes = AttributeStore::new();
        attributes.set_common_value(attr::SCHEMA_VERSION, config.schema_version.as_str());
        attributes.set_common_value(attr::SCHEMA_LOCATION, config.schema_location.as_str());
        attributes.set_common_value(attr::ITEM_DESCRIBED, ".");
        attributes.set_common_value(attr::ITEM_DRIVER, config.item_driver.as_str());
        attributes.set_common_value(attr::SYNC_DRIVER, config.sync_driver.as_str());
        attributes.set_common_value(attr::STORAGE_DRIVER, config.storage_driver.as_str());

        let mut doc = Self::from_parts(attributes, Vec::new(), Vec::new(), BTreeMap::new());
        doc.fragment_filename = config.filename.clone();
        doc.touch();
        doc
    }

    pub(crate) fn from_parts(
        attributes: AttributeStore,
        associations: Vec<AssociationRecord>,
        extensions: Vec<OpaqueElement>,
        declarations: BTreeMap<String, String>,
    ) -> Self {
        Self {
            attributes,
            associations,
            extensions,
            declarations,
            fragment_filename: DEFAULT_FRAGMENT_FILENAME.to_string(),
        }
    }

    /// Parse a serialized fragment. Element order is not significant.
    pub fn from_text(text: &str) -> Result<Self, FragmentError> {
        codec::read_fragment(text)
    }

    /// Canonical serialized form
    pub fn to_text(&self) -> Result<String, FragmentError> {
        codec::write_fragment(self)
    }

    /// File name used for child fragments of grouping items
    pub fn fragment_filename(&self) -> &str {
        &self.fragment_filename
    }

    pub fn set_fragment_filename(&mut self, filename: impl Into<String>) {
        self.fragment_filename = filename.into();
    }

    /// Fragment-level attribute store
    pub fn attributes(&self) -> &AttributeStore {
        &self.attributes
    }

    /// Fragment-level elements carried through unchanged
    pub fn extensions(&self) -> &[OpaqueElement] {
        &self.extensions
    }

    pub(crate) fn declarations(&self) -> &BTreeMap<String, String> {
        &self.declarations
    }

    // Fragment common attributes

    pub fn schema_version(&self) -> Option<&str> {
        self.attributes.common_value(attr::SCHEMA_VERSION)
    }

    pub fn schema_location(&self) -> Option<&str> {
        self.attributes.common_value(attr::SCHEMA_LOCATION)
    }

    pub fn item_described(&self) -> Option<&str> {
        self.attributes.common_value(attr::ITEM_DESCRIBED)
    }

    pub fn item_driver(&self) -> Option<&str> {
        self.attributes.common_value(attr::ITEM_DRIVER)
    }

    pub fn sync_driver(&self) -> Option<&str> {
        self.attributes.common_value(attr::SYNC_DRIVER)
    }

    pub fn storage_driver(&self) -> Option<&str> {
        self.attributes.common_value(attr::STORAGE_DRIVER)
    }

    /// Freshness token, regenerated on every mutation
    pub fn write_generation(&self) -> Option<&str> {
        self.attributes.common_value(attr::WRITE_GENERATION)
    }

    pub fn set_schema_version(&mut self, value: &str) {
        self.set_fragment_common(attr::SCHEMA_VERSION, value);
    }

    pub fn set_schema_location(&mut self, value: &str) {
        self.set_fragment_common(attr::SCHEMA_LOCATION, value);
    }

    pub fn set_item_described(&mut self, value: &str) {
        self.set_fragment_common(attr::ITEM_DESCRIBED, value);
    }

    pub fn set_item_driver(&mut self, value: &str) {
        self.set_fragment_common(attr::ITEM_DRIVER, value);
    }

    pub fn set_sync_driver(&mut self, value: &str) {
        self.set_fragment_common(attr::SYNC_DRIVER, value);
    }

    pub fn set_storage_driver(&mut self, value: &str) {
        self.set_fragment_common(attr::STORAGE_DRIVER, value);
    }

    fn set_fragment_common(&mut self, name: &str, value: &str) {
        self.attributes.set_common_value(name, value);
        self.touch();
    }

    // Associations

    /// Create an association and return its fresh identity
    pub fn create_association(&mut self, request: CreateAssociation) -> Result<Guid, FragmentError> {
        request.validate()?;
        let kind = request.kind();
        let fields = match request {
            CreateAssociation::Phantom { display_text } => AssociationFields {
                display_text: Some(display_text),
                ..Default::default()
            },
            CreateAssociation::LinkItem {
                display_text,
                item_uri,
            } => AssociationFields {
                display_text: Some(display_text),
                associated_item: Some(item_uri),
                ..Default::default()
            },
            CreateAssociation::LinkItemWithLocalCopy { .. }
            | CreateAssociation::LinkGroupingItem { .. }
            | CreateAssociation::LinkGroupingItemWithLocalCopy { .. } => {
                return Err(FragmentError::NotImplemented(format!(
                    "association creation kind {}",
                    kind
                )));
            }
            CreateAssociation::NewItem {
                display_text,
                item_name,
            } => AssociationFields {
                display_text: Some(display_text),
                associated_item: Some(item_name.clone()),
                local_item: Some(item_name),
                is_grouping_item: Some(false),
                ..Default::default()
            },
            CreateAssociation::NewGroupingItem {
                display_text,
                item_name,
            } => AssociationFields {
                display_text: Some(display_text),
                associated_item: Some(item_name.clone()),
                associated_fragment: Some(self.child_fragment_path_for(&item_name)),
                local_item: Some(item_name),
                is_grouping_item: Some(true),
                ..Default::default()
            },
        };

        let record = AssociationRecord::from_fields(fields);
        let guid = record.guid();
        self.associations.push(record);
        self.touch();
        debug!(guid = %guid, kind, "Created association");
        Ok(guid)
    }

    /// Convenience wrapper selecting the creation kind from loose parameters
    pub fn create_association_from_params(
        &mut self,
        params: AssociationParams,
    ) -> Result<Guid, FragmentError> {
        self.create_association(CreateAssociation::from_params(params)?)
    }

    /// Remove the association with the given identity
    pub fn delete_association(&mut self, guid: Guid) -> Result<(), FragmentError> {
        let index = self.position(guid)?;
        self.associations.remove(index);
        self.touch();
        debug!(guid = %guid, "Deleted association");
        Ok(())
    }

    /// Identities in document order
    pub fn list_associations(&self) -> Vec<Guid> {
        self.associations.iter().map(AssociationRecord::guid).collect()
    }

    pub fn associations(&self) -> &[AssociationRecord] {
        &self.associations
    }

    pub fn association(&self, guid: Guid) -> Result<&AssociationRecord, FragmentError> {
        self.associations
            .iter()
            .find(|record| record.guid() == guid)
            .ok_or_else(|| unknown_association(guid))
    }

    /// First association whose local item has the given name
    pub fn find_by_local_item(&self, name: &str) -> Option<Guid> {
        self.associations
            .iter()
            .find(|record| record.local_item() == Some(name))
            .map(AssociationRecord::guid)
    }

    pub fn association_display_text(&self, guid: Guid) -> Result<Option<&str>, FragmentError> {
        Ok(self.association(guid)?.display_text())
    }

    pub fn association_local_item(&self, guid: Guid) -> Result<Option<&str>, FragmentError> {
        Ok(self.association(guid)?.local_item())
    }

    pub fn association_associated_item(&self, guid: Guid) -> Result<Option<&str>, FragmentError> {
        Ok(self.association(guid)?.associated_item())
    }

    pub fn association_associated_fragment(
        &self,
        guid: Guid,
    ) -> Result<Option<&str>, FragmentError> {
        Ok(self.association(guid)?.associated_fragment())
    }

    /// Reserved; empty on every association this crate creates
    pub fn association_associated_storage_driver(
        &self,
        guid: Guid,
    ) -> Result<Option<&str>, FragmentError> {
        Ok(self.association(guid)?.associated_storage_driver())
    }

    pub fn association_is_grouping_item(&self, guid: Guid) -> Result<bool, FragmentError> {
        self.association(guid)?.is_grouping_item()
    }

    pub fn set_association_display_text(&mut self, guid: Guid, value: &str) -> Result<(), FragmentError> {
        self.set_association_common(guid, attr::DISPLAY_TEXT, value)
    }

    /// Rename the local item. A grouping item's fragment path follows the new name.
    pub fn set_association_local_item(&mut self, guid: Guid, value: &str) -> Result<(), FragmentError> {
        self.set_association_item(guid, attr::LOCAL_ITEM, value)
    }

    pub fn set_association_associated_item(
        &mut self,
        guid: Guid,
        value: &str,
    ) -> Result<(), FragmentError> {
        self.set_association_item(guid, attr::ASSOCIATED_ITEM, value)
    }

    pub fn set_association_associated_storage_driver(
        &mut self,
        guid: Guid,
        value: &str,
    ) -> Result<(), FragmentError> {
        self.set_association_common(guid, attr::ASSOCIATED_STORAGE_DRIVER, value)
    }

    /// The child fragment path is derived from the grouping flag and the item
    /// name. Only that derived value (empty for non-grouping items) is accepted.
    pub fn set_association_associated_fragment(
        &mut self,
        guid: Guid,
        value: &str,
    ) -> Result<(), FragmentError> {
        let record = self.association(guid)?;
        let expected = if record.is_grouping_item()? {
            self.grouping_fragment(guid, record.local_item(), record.associated_item())?
        } else {
            String::new()
        };
        if value != expected {
            return Err(FragmentError::InvalidState(format!(
                "associatedFragment of {} must be '{}'",
                guid, expected
            )));
        }
        self.set_association_common(guid, attr::ASSOCIATED_FRAGMENT, value)
    }

    /// Set the grouping flag, keeping the child fragment path consistent with it
    pub fn set_association_is_grouping_item(
        &mut self,
        guid: Guid,
        grouping: bool,
    ) -> Result<(), FragmentError> {
        let index = self.position(guid)?;
        let child_fragment = if grouping {
            let record = &self.associations[index];
            self.grouping_fragment(guid, record.local_item(), record.associated_item())?
        } else {
            String::new()
        };

        let store = self.associations[index].attributes_mut();
        store.set_common_value(attr::IS_GROUPING_ITEM, format_bool(grouping));
        store.set_common_value(attr::ASSOCIATED_FRAGMENT, child_fragment);
        self.touch();
        Ok(())
    }

    /// Set `localItem` or `associatedItem`, re-deriving the child fragment
    /// path of a grouping item before anything is written
    fn set_association_item(&mut self, guid: Guid, name: &str, value: &str) -> Result<(), FragmentError> {
        let index = self.position(guid)?;
        let record = &self.associations[index];
        let child_fragment = if record.is_grouping_item()? {
            let (local, associated) = if name == attr::LOCAL_ITEM {
                (Some(value), record.associated_item())
            } else {
                (record.local_item(), Some(value))
            };
            Some(self.grouping_fragment(guid, local, associated)?)
        } else {
            None
        };

        let store = self.associations[index].attributes_mut();
        store.set_common_value(name, value);
        if let Some(path) = child_fragment {
            store.set_common_value(attr::ASSOCIATED_FRAGMENT, path);
        }
        self.touch();
        Ok(())
    }

    /// Child fragment path of a grouping item: the local item name, falling
    /// back to the associated item
    fn grouping_fragment(
        &self,
        guid: Guid,
        local_item: Option<&str>,
        associated_item: Option<&str>,
    ) -> Result<String, FragmentError> {
        let item = local_item
            .filter(|name| !name.is_empty())
            .or_else(|| associated_item.filter(|name| !name.is_empty()))
            .ok_or_else(|| {
                FragmentError::InvalidState(format!("association {} names no item to group", guid))
            })?;
        Ok(self.child_fragment_path_for(item))
    }

    fn set_association_common(&mut self, guid: Guid, name: &str, value: &str) -> Result<(), FragmentError> {
        let index = self.position(guid)?;
        self.associations[index]
            .attributes_mut()
            .set_common_value(name, value);
        self.touch();
        Ok(())
    }

    /// Path of a grouping item's own fragment, relative to this folder
    pub fn child_fragment_path_for(&self, item_name: &str) -> String {
        format!("{}/{}", item_name, self.fragment_filename)
    }

    // Scoped attribute access

    /// Read an attribute. Missing attributes are `None`, never an error.
    pub fn get_attribute(
        &self,
        scope: Scope,
        namespace: &Namespace,
        name: &str,
    ) -> Result<Option<String>, FragmentError> {
        if let (Scope::Association(guid), Namespace::Common, attr::GUID) = (scope, namespace, name) {
            return Ok(Some(self.association(guid)?.guid().to_string()));
        }
        Ok(self.store(scope)?.get(namespace, name)?.map(str::to_string))
    }

    /// Upsert an attribute. Document-managed attributes are refused.
    pub fn set_attribute(
        &mut self,
        scope: Scope,
        namespace: &Namespace,
        name: &str,
        value: &str,
    ) -> Result<(), FragmentError> {
        check_writable(namespace, name)?;
        if let (Scope::Association(guid), Namespace::Common) = (scope, namespace) {
            match name {
                attr::IS_GROUPING_ITEM => {
                    return self.set_association_is_grouping_item(guid, parse_bool(value)?)
                }
                attr::ASSOCIATED_FRAGMENT => {
                    return self.set_association_associated_fragment(guid, value)
                }
                attr::LOCAL_ITEM | attr::ASSOCIATED_ITEM => {
                    return self.set_association_item(guid, name, value)
                }
                _ => {}
            }
        }
        self.mutate(scope, |store| store.set(namespace, name, value))
    }

    pub fn add_attribute(
        &mut self,
        scope: Scope,
        namespace: &Namespace,
        name: &str,
    ) -> Result<(), FragmentError> {
        check_writable(namespace, name)?;
        check_structural(scope, namespace, name)?;
        self.mutate(scope, |store| store.add(namespace, name))
    }

    pub fn remove_attribute(
        &mut self,
        scope: Scope,
        namespace: &Namespace,
        name: &str,
    ) -> Result<(), FragmentError> {
        check_writable(namespace, name)?;
        check_structural(scope, namespace, name)?;
        self.mutate(scope, |store| store.remove(namespace, name))
    }

    pub fn list_attributes(&self, scope: Scope, namespace: &Namespace) -> Result<Vec<String>, FragmentError> {
        let mut names = self.store(scope)?.list(namespace)?;
        if scope_is_association(scope) && *namespace == Namespace::Common {
            names.push(attr::GUID.to_string());
            names.sort();
        }
        Ok(names)
    }

    /// Never creates the namespace
    pub fn has_namespace(&self, scope: Scope, uri: &str) -> Result<bool, FragmentError> {
        self.store(scope)?.has_namespace(uri)
    }

    pub fn namespace_data(&self, scope: Scope, uri: &str) -> Result<Option<&str>, FragmentError> {
        self.store(scope)?.namespace_data(uri)
    }

    pub fn set_namespace_data(&mut self, scope: Scope, uri: &str, data: &str) -> Result<(), FragmentError> {
        self.mutate(scope, |store| store.set_namespace_data(uri, data))
    }

    pub fn remove_namespace(&mut self, scope: Scope, uri: &str) -> Result<(), FragmentError> {
        self.mutate(scope, |store| store.remove_namespace(uri))
    }

    /// Extension namespaces in use by an owner
    pub fn namespaces(&self, scope: Scope) -> Result<Vec<String>, FragmentError> {
        Ok(self
            .store(scope)?
            .namespaces()
            .map(|(uri, _)| uri.to_string())
            .collect())
    }

    fn store(&self, scope: Scope) -> Result<&AttributeStore, FragmentError> {
        match scope {
            Scope::Fragment => Ok(&self.attributes),
            Scope::Association(guid) => Ok(self.association(guid)?.attributes()),
        }
    }

    /// Apply an attribute-store operation and bump the write generation on success
    fn mutate<T>(
        &mut self,
        scope: Scope,
        op: impl FnOnce(&mut AttributeStore) -> Result<T, FragmentError>,
    ) -> Result<T, FragmentError> {
        let store = match scope {
            Scope::Fragment => &mut self.attributes,
            Scope::Association(guid) => {
                let index = self.position(guid)?;
                self.associations[index].attributes_mut()
            }
        };
        let result = op(store)?;
        self.touch();
        Ok(result)
    }

    fn position(&self, guid: Guid) -> Result<usize, FragmentError> {
        self.associations
            .iter()
            .position(|record| record.guid() == guid)
            .ok_or_else(|| unknown_association(guid))
    }

    fn touch(&mut self) {
        self.attributes
            .set_common_value(attr::WRITE_GENERATION, Guid::generate().to_string());
    }
}

fn scope_is_association(scope: Scope) -> bool {
    matches!(scope, Scope::Association(_))
}

fn check_writable(namespace: &Namespace, name: &str) -> Result<(), FragmentError> {
    if *namespace == Namespace::Common && MANAGED_ATTRIBUTES.contains(&name) {
        return Err(FragmentError::InvalidArgument(format!(
            "'{}' is managed by the document",
            name
        )));
    }
    Ok(())
}

fn check_structural(scope: Scope, namespace: &Namespace, name: &str) -> Result<(), FragmentError> {
    if scope_is_association(scope)
        && *namespace == Namespace::Common
        && GROUPING_ATTRIBUTES.contains(&name)
    {
        return Err(FragmentError::InvalidArgument(format!(
            "'{}' follows the grouping flag and cannot be added or removed",
            name
        )));
    }
    Ok(())
}

fn unknown_association(guid: Guid) -> FragmentError {
    FragmentError::InvalidArgument(format!("no association with guid {}", guid))
}
