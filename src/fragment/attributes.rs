//! Namespace-partitioned attribute storage.
//!
//! One `AttributeStore` backs each fragment and each association. The common
//! partition holds the schema attributes; every extension namespace in use owns
//! an attribute map plus one opaque data payload.

use crate::error::FragmentError;
use crate::fragment::codec::{FRAGMENT_NAMESPACE, XMLNS_NAMESPACE, XML_NAMESPACE};
use crate::types::Namespace;
use std::collections::BTreeMap;

/// Attributes and opaque data owned by one extension namespace
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespacePartition {
    attributes: BTreeMap<String, String>,
    data: String,
}

impl NamespacePartition {
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    pub(crate) fn with_contents(attributes: BTreeMap<String, String>, data: String) -> Self {
        Self { attributes, data }
    }
}

/// Keyed attribute container addressed by (namespace, name)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeStore {
    common: BTreeMap<String, String>,
    namespaces: BTreeMap<String, NamespacePartition>,
}

impl AttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read an attribute. Missing attributes and missing namespaces are `None`.
    pub fn get(&self, namespace: &Namespace, name: &str) -> Result<Option<&str>, FragmentError> {
        validate_name_in(namespace, name)?;
        let value = match namespace {
            Namespace::Common => self.common.get(name),
            Namespace::Uri(uri) => {
                validate_uri(uri)?;
                self.namespaces
                    .get(uri)
                    .and_then(|partition| partition.attributes.get(name))
            }
        };
        Ok(value.map(String::as_str))
    }

    /// Upsert an attribute, creating the namespace partition if needed
    pub fn set(&mut self, namespace: &Namespace, name: &str, value: &str) -> Result<(), FragmentError> {
        validate_name_in(namespace, name)?;
        self.map_mut(namespace)?
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    /// Create an attribute with an empty value.
    ///
    /// Fails with `InvalidState` if the attribute already exists.
    pub fn add(&mut self, namespace: &Namespace, name: &str) -> Result<(), FragmentError> {
        validate_name_in(namespace, name)?;
        if self.get(namespace, name)?.is_some() {
            return Err(FragmentError::InvalidState(format!(
                "attribute '{}' already exists in namespace {}",
                name, namespace
            )));
        }
        self.map_mut(namespace)?.insert(name.to_string(), String::new());
        Ok(())
    }

    /// Delete an attribute.
    ///
    /// Fails with `InvalidState` if the attribute does not exist.
    pub fn remove(&mut self, namespace: &Namespace, name: &str) -> Result<(), FragmentError> {
        validate_name_in(namespace, name)?;
        let removed = match namespace {
            Namespace::Common => self.common.remove(name),
            Namespace::Uri(uri) => {
                validate_uri(uri)?;
                self.namespaces
                    .get_mut(uri)
                    .and_then(|partition| partition.attributes.remove(name))
            }
        };
        match removed {
            Some(_) => Ok(()),
            None => Err(FragmentError::InvalidState(format!(
                "attribute '{}' does not exist in namespace {}",
                name, namespace
            ))),
        }
    }

    /// Attribute names present in a namespace, sorted
    pub fn list(&self, namespace: &Namespace) -> Result<Vec<String>, FragmentError> {
        let names = match namespace {
            Namespace::Common => self.common.keys().cloned().collect(),
            Namespace::Uri(uri) => {
                validate_uri(uri)?;
                self.namespaces
                    .get(uri)
                    .map(|partition| partition.attributes.keys().cloned().collect())
                    .unwrap_or_default()
            }
        };
        Ok(names)
    }

    /// True iff the namespace partition exists. Never creates it.
    pub fn has_namespace(&self, uri: &str) -> Result<bool, FragmentError> {
        validate_uri(uri)?;
        Ok(self.namespaces.contains_key(uri))
    }

    /// Opaque data payload of a namespace, if the namespace exists
    pub fn namespace_data(&self, uri: &str) -> Result<Option<&str>, FragmentError> {
        validate_uri(uri)?;
        Ok(self.namespaces.get(uri).map(|partition| partition.data.as_str()))
    }

    /// Replace the opaque data payload of a namespace, creating it if needed
    pub fn set_namespace_data(&mut self, uri: &str, data: &str) -> Result<(), FragmentError> {
        validate_uri(uri)?;
        self.namespaces.entry(uri.to_string()).or_default().data = data.to_string();
        Ok(())
    }

    /// Drop a whole namespace partition
    pub fn remove_namespace(&mut self, uri: &str) -> Result<(), FragmentError> {
        validate_uri(uri)?;
        match self.namespaces.remove(uri) {
            Some(_) => Ok(()),
            None => Err(FragmentError::InvalidState(format!(
                "namespace '{}' does not exist",
                uri
            ))),
        }
    }

    /// Extension namespaces in use, sorted by URI
    pub fn namespaces(&self) -> impl Iterator<Item = (&str, &NamespacePartition)> {
        self.namespaces.iter().map(|(uri, partition)| (uri.as_str(), partition))
    }

    pub fn common(&self) -> &BTreeMap<String, String> {
        &self.common
    }

    pub(crate) fn common_value(&self, name: &str) -> Option<&str> {
        self.common.get(name).map(String::as_str)
    }

    pub(crate) fn set_common_value(&mut self, name: &str, value: impl Into<String>) {
        self.common.insert(name.to_string(), value.into());
    }

    pub(crate) fn take_common_value(&mut self, name: &str) -> Option<String> {
        self.common.remove(name)
    }

    pub(crate) fn insert_partition(&mut self, uri: String, partition: NamespacePartition) {
        self.namespaces.insert(uri, partition);
    }

    fn map_mut(
        &mut self,
        namespace: &Namespace,
    ) -> Result<&mut BTreeMap<String, String>, FragmentError> {
        match namespace {
            Namespace::Common => Ok(&mut self.common),
            Namespace::Uri(uri) => {
                validate_uri(uri)?;
                Ok(&mut self.namespaces.entry(uri.clone()).or_default().attributes)
            }
        }
    }
}

/// Attribute names must be serializable as unprefixed XML attributes
pub(crate) fn validate_name(name: &str) -> Result<(), FragmentError> {
    let mut chars = name.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return Err(FragmentError::NullArgument("attribute name".to_string())),
    };
    let legal_start = first.is_alphabetic() || first == '_';
    let legal_rest = chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if !legal_start || !legal_rest || name == "xmlns" {
        return Err(FragmentError::InvalidType(format!(
            "'{}' is not a legal attribute name",
            name
        )));
    }
    Ok(())
}

/// The common partition also carries `xml:`-prefixed attributes such as
/// `xml:lang`, which keep their prefix as part of the name.
fn validate_name_in(namespace: &Namespace, name: &str) -> Result<(), FragmentError> {
    match (namespace, name.strip_prefix("xml:")) {
        (Namespace::Common, Some(local)) if !local.is_empty() => validate_name(local),
        _ => validate_name(name),
    }
}

pub(crate) fn validate_uri(uri: &str) -> Result<(), FragmentError> {
    if uri.is_empty() {
        return Err(FragmentError::NullArgument("namespace URI".to_string()));
    }
    let reserved = match uri {
        FRAGMENT_NAMESPACE => "the fragment schema namespace",
        XML_NAMESPACE => "reserved for the xml prefix",
        XMLNS_NAMESPACE => "reserved for namespace declarations",
        _ => return Ok(()),
    };
    Err(FragmentError::InvalidArgument(format!("'{}' is {}", uri, reserved)))
}
