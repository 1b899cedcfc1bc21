//! Deterministic document identity.
//!
//! A document's id is the SHA-256 of its content unless the caller supplies
//! an external id. Same content, same id: re-indexing is idempotent.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::utils::calculate_hash;

/// Longest accepted external id, in bytes.
pub const MAX_EXTERNAL_ID_LEN: usize = 256;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Document id must not be empty")]
    Empty,

    #[error("Document id is {0} bytes, limit is {MAX_EXTERNAL_ID_LEN}")]
    TooLong(usize),

    #[error("Document id contains control characters")]
    ControlCharacter,
}

/// Identifier of an indexed document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(String);

impl DocId {
    /// Content-addressed id: lower-case hex SHA-256 of the content.
    pub fn from_content(content: &str) -> Self {
        Self(calculate_hash(content))
    }

    /// Caller-chosen id.
    pub fn external(id: &str) -> Result<Self, IdentityError> {
        if id.is_empty() {
            return Err(IdentityError::Empty);
        }
        if id.len() > MAX_EXTERNAL_ID_LEN {
            return Err(IdentityError::TooLong(id.len()));
        }
        if id.chars().any(char::is_control) {
            return Err(IdentityError::ControlCharacter);
        }
        Ok(Self(id.to_string()))
    }

    /// Explicit id when given, content hash otherwise.
    pub fn resolve(content: &str, external: Option<&str>) -> Result<Self, IdentityError> {
        match external {
            Some(id) => Self::external(id),
            None => Ok(Self::from_content(content)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DocId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
