//! Association records: one child entry of a fragment.

use crate::error::FragmentError;
use crate::fragment::attributes::AttributeStore;
use crate::fragment::codec::{attr, read_owner, OpaqueElement, ParseContext};
use crate::types::Guid;
use roxmltree::Node;
use serde::{Deserialize, Serialize};

/// Caller-supplied fields for a new association.
///
/// Unset fields default to an empty string (or `false` for the grouping flag).
/// New records always mint their own identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationFields {
    pub display_text: Option<String>,
    pub associated_item: Option<String>,
    pub associated_fragment: Option<String>,
    pub associated_storage_driver: Option<String>,
    pub local_item: Option<String>,
    pub is_grouping_item: Option<bool>,
}

/// Identity and attributes of one association
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationRecord {
    guid: Guid,
    attributes: AttributeStore,
    extensions: Vec<OpaqueElement>,
}

impl AssociationRecord {
    /// Build a record from caller fields with a freshly generated identity
    pub fn from_fields(fields: AssociationFields) -> Self {
        let mut attributes = AttributeStore::new();
        let text = |value: Option<String>| value.unwrap_or_default();

        attributes.set_common_value(attr::DISPLAY_TEXT, text(fields.display_text));
        attributes.set_common_value(attr::ASSOCIATED_FRAGMENT, text(fields.associated_fragment));
        attributes.set_common_value(
            attr::ASSOCIATED_STORAGE_DRIVER,
            text(fields.associated_storage_driver),
        );
        attributes.set_common_value(attr::ASSOCIATED_ITEM, text(fields.associated_item));
        attributes.set_common_value(attr::LOCAL_ITEM, text(fields.local_item));
        attributes.set_common_value(
            attr::IS_GROUPING_ITEM,
            format_bool(fields.is_grouping_item.unwrap_or(false)),
        );

        Self {
            guid: Guid::generate(),
            attributes,
            extensions: Vec::new(),
        }
    }

    /// Build a record from a serialized `<association>` element.
    ///
    /// Common attributes are copied verbatim; absent ones stay absent.
    pub(crate) fn from_element(
        node: Node<'_, '_>,
        ctx: &mut ParseContext<'_>,
    ) -> Result<Self, FragmentError> {
        let contents = read_owner(node, ctx, false)?;
        let mut attributes = contents.attributes;
        let guid = match attributes.take_common_value(attr::GUID) {
            Some(text) => text.parse::<Guid>().map_err(|e| match e {
                FragmentError::NullArgument(_) => {
                    FragmentError::InvalidType("association has an empty guid".to_string())
                }
                other => other,
            })?,
            None => {
                return Err(FragmentError::InvalidType(
                    "association element has no guid".to_string(),
                ))
            }
        };

        Ok(Self {
            guid,
            attributes,
            extensions: contents.extensions,
        })
    }

    pub fn guid(&self) -> Guid {
        self.guid
    }

    pub fn attributes(&self) -> &AttributeStore {
        &self.attributes
    }

    pub(crate) fn attributes_mut(&mut self) -> &mut AttributeStore {
        &mut self.attributes
    }

    /// Elements carried through unchanged from the source document
    pub fn extensions(&self) -> &[OpaqueElement] {
        &self.extensions
    }

    pub fn display_text(&self) -> Option<&str> {
        self.attributes.common_value(attr::DISPLAY_TEXT)
    }

    pub fn associated_item(&self) -> Option<&str> {
        self.attributes.common_value(attr::ASSOCIATED_ITEM)
    }

    pub fn associated_fragment(&self) -> Option<&str> {
        self.attributes.common_value(attr::ASSOCIATED_FRAGMENT)
    }

    pub fn associated_storage_driver(&self) -> Option<&str> {
        self.attributes.common_value(attr::ASSOCIATED_STORAGE_DRIVER)
    }

    pub fn local_item(&self) -> Option<&str> {
        self.attributes.common_value(attr::LOCAL_ITEM)
    }

    /// Grouping flag. Absent means `false`; anything but `true`/`false` is `InvalidType`.
    pub fn is_grouping_item(&self) -> Result<bool, FragmentError> {
        match self.attributes.common_value(attr::IS_GROUPING_ITEM) {
            None | Some("") => Ok(false),
            Some(value) => parse_bool(value),
        }
    }

    /// True when the record names a physical item in the described folder
    pub fn has_local_item(&self) -> bool {
        self.local_item().map_or(false, |name| !name.is_empty())
    }

    /// Path of the grouping item's own fragment, relative to the described folder
    pub fn child_fragment_path(&self) -> Result<Option<&str>, FragmentError> {
        if !self.is_grouping_item()? {
            return Ok(None);
        }
        Ok(self.associated_fragment().filter(|path| !path.is_empty()))
    }
}

pub(crate) fn format_bool(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

pub(crate) fn parse_bool(value: &str) -> Result<bool, FragmentError> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(FragmentError::InvalidType(format!(
            "'{}' is not a boolean",
            other
        ))),
    }
}
