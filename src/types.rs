//! Shared identity and addressing types.

use crate::error::FragmentError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Random association identity.
///
/// Minted once per association and never reused. Uniqueness is probabilistic
/// (UUID v4); nothing checks for collisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Guid(Uuid);

impl Guid {
    /// Generate a fresh identity
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an identity from its text form
    pub fn parse(text: &str) -> Result<Self, FragmentError> {
        text.parse()
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for Guid {
    type Err = FragmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(FragmentError::NullArgument("guid".to_string()));
        }
        Uuid::parse_str(s)
            .map(Guid)
            .map_err(|e| FragmentError::InvalidType(format!("malformed guid '{}': {}", s, e)))
    }
}

impl TryFrom<String> for Guid {
    type Error = FragmentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Guid> for String {
    fn from(value: Guid) -> Self {
        value.to_string()
    }
}

/// Attribute partition.
///
/// `Common` is the reserved partition holding the schema-defined attributes of
/// a fragment or association; `Uri` partitions belong to extension namespaces.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Namespace {
    Common,
    Uri(String),
}

impl Namespace {
    pub fn uri(uri: impl Into<String>) -> Self {
        Namespace::Uri(uri.into())
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Common => write!(f, "common"),
            Namespace::Uri(uri) => write!(f, "{}", uri),
        }
    }
}

/// Owner of an attribute store inside a fragment document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Fragment,
    Association(Guid),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Fragment => write!(f, "fragment"),
            Scope::Association(guid) => write!(f, "association {}", guid),
        }
    }
}
