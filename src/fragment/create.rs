//! Association creation requests.
//!
//! Each variant carries exactly the fields its kind requires. Loose parameter
//! sets are converted at the boundary with [`CreateAssociation::from_params`].

use crate::error::FragmentError;
use serde::{Deserialize, Serialize};

/// One of the seven association creation kinds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CreateAssociation {
    /// Metadata-only entry with no backing item
    Phantom { display_text: String },
    /// Link to an existing non-grouping item, no local copy
    LinkItem { display_text: String, item_uri: String },
    /// Link to an existing non-grouping item with a local copy
    LinkItemWithLocalCopy { display_text: String, item_uri: String },
    /// Link to an existing grouping item, no local copy
    LinkGroupingItem { display_text: String, item_uri: String },
    /// Link to an existing grouping item with a local copy
    LinkGroupingItemWithLocalCopy { display_text: String, item_uri: String },
    /// New local non-grouping item
    NewItem { display_text: String, item_name: String },
    /// New local grouping item
    NewGroupingItem { display_text: String, item_name: String },
}

/// Loose creation parameters as supplied by callers that pick the kind by
/// which fields are present
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationParams {
    pub display_text: Option<String>,
    pub item_uri: Option<String>,
    pub item_name: Option<String>,
    pub is_grouping_item: Option<bool>,
    pub local_copy: Option<bool>,
}

impl CreateAssociation {
    /// Select the creation kind from the parameters that are present.
    ///
    /// Unrecognised combinations fail with `MissingParameter`.
    pub fn from_params(params: AssociationParams) -> Result<Self, FragmentError> {
        let present = |value: Option<String>| value.filter(|v| !v.is_empty());
        let display_text = present(params.display_text).ok_or_else(|| {
            FragmentError::MissingParameter("display_text is required".to_string())
        })?;
        let item_uri = present(params.item_uri);
        let item_name = present(params.item_name);

        let request = match (item_uri, item_name, params.is_grouping_item, params.local_copy) {
            (None, None, None, None) => CreateAssociation::Phantom { display_text },
            (Some(item_uri), None, grouping, local_copy) => {
                match (grouping.unwrap_or(false), local_copy.unwrap_or(false)) {
                    (false, false) => CreateAssociation::LinkItem {
                        display_text,
                        item_uri,
                    },
                    (false, true) => CreateAssociation::LinkItemWithLocalCopy {
                        display_text,
                        item_uri,
                    },
                    (true, false) => CreateAssociation::LinkGroupingItem {
                        display_text,
                        item_uri,
                    },
                    (true, true) => CreateAssociation::LinkGroupingItemWithLocalCopy {
                        display_text,
                        item_uri,
                    },
                }
            }
            (None, Some(item_name), Some(false), None) => CreateAssociation::NewItem {
                display_text,
                item_name,
            },
            (None, Some(item_name), Some(true), None) => CreateAssociation::NewGroupingItem {
                display_text,
                item_name,
            },
            (None, Some(_), None, _) => {
                return Err(FragmentError::MissingParameter(
                    "item_name requires is_grouping_item".to_string(),
                ))
            }
            _ => {
                return Err(FragmentError::MissingParameter(
                    "parameters do not select a creation kind".to_string(),
                ))
            }
        };
        Ok(request)
    }

    /// Kind number as used in the fragment schema documentation (1..=7)
    pub fn kind(&self) -> u8 {
        match self {
            CreateAssociation::Phantom { .. } => 1,
            CreateAssociation::LinkItem { .. } => 2,
            CreateAssociation::LinkItemWithLocalCopy { .. } => 3,
            CreateAssociation::LinkGroupingItem { .. } => 4,
            CreateAssociation::LinkGroupingItemWithLocalCopy { .. } => 5,
            CreateAssociation::NewItem { .. } => 6,
            CreateAssociation::NewGroupingItem { .. } => 7,
        }
    }

    pub fn display_text(&self) -> &str {
        match self {
            CreateAssociation::Phantom { display_text }
            | CreateAssociation::LinkItem { display_text, .. }
            | CreateAssociation::LinkItemWithLocalCopy { display_text, .. }
            | CreateAssociation::LinkGroupingItem { display_text, .. }
            | CreateAssociation::LinkGroupingItemWithLocalCopy { display_text, .. }
            | CreateAssociation::NewItem { display_text, .. }
            | CreateAssociation::NewGroupingItem { display_text, .. } => display_text,
        }
    }

    /// Check the variant's required fields
    pub(crate) fn validate(&self) -> Result<(), FragmentError> {
        if self.display_text().is_empty() {
            return Err(FragmentError::MissingParameter(
                "display_text is required".to_string(),
            ));
        }
        match self {
            CreateAssociation::LinkItem { item_uri, .. } if item_uri.is_empty() => Err(
                FragmentError::MissingParameter("item_uri is required".to_string()),
            ),
            CreateAssociation::NewItem { item_name, .. }
            | CreateAssociation::NewGroupingItem { item_name, .. } => validate_item_name(item_name),
            _ => Ok(()),
        }
    }
}

/// Local item names are single `/`-separated path segments. Any other
/// character the store can list, `\` included, is a valid name.
pub(crate) fn validate_item_name(item_name: &str) -> Result<(), FragmentError> {
    if item_name.is_empty() {
        return Err(FragmentError::MissingParameter(
            "item_name is required".to_string(),
        ));
    }
    if item_name.contains('/') || item_name == "." || item_name == ".." {
        return Err(FragmentError::InvalidArgument(format!(
            "'{}' is not a single item name",
            item_name
        )));
    }
    Ok(())
}
