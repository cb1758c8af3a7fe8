//! Core document types
//!
//! - [`Version`]: per-key version token used for optimistic concurrency
//! - [`Document`]: a stored document with its identity fields
//! - [`PutOutcome`]: identity assigned by the store on a write
//! - [`StagedWrite`]: a buffered transactional write awaiting commit

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::json::JsonValue;

/// Document metadata: ordered map of string keys to JSON values
pub type Metadata = serde_json::Map<String, JsonValue>;

/// Metadata entry stamped by the store when a write becomes durable
pub const LAST_MODIFIED: &str = "@last-modified";

/// Suffix that asks the store for a sequential identity (`users/` → `users/1`)
pub const IDENTITY_SEPARATOR: char = '/';

/// Version token for a document
///
/// Versions are assigned by the store from a monotonically increasing counter
/// starting at 1. [`Version::ZERO`] stands for "no document": an expected
/// version of zero means the key must not exist.
///
/// ## Invariants
///
/// - Every successful mutation of a key produces a strictly greater version
/// - Version comparison is the sole conflict detector
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    /// The version of a document that does not exist
    pub const ZERO: Version = Version(0);

    /// Create a version from its numeric value
    pub const fn new(value: u64) -> Self {
        Version(value)
    }

    /// Get the numeric value
    #[inline]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Check if this is the absent-document version
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Increment the version, returning a new version
    pub const fn increment(&self) -> Self {
        Version(self.0 + 1)
    }
}

impl From<u64> for Version {
    fn from(value: u64) -> Self {
        Version(value)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            write!(f, "none")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Compare-and-swap check shared by every store implementation
///
/// Passes when `expected` is absent or equals `actual`.
pub fn verify_expected_version(key: &str, expected: Option<Version>, actual: Version) -> Result<()> {
    match expected {
        Some(expected) if expected != actual => Err(Error::conflict(key, expected, actual)),
        _ => Ok(()),
    }
}

/// Check whether a requested key asks the store to generate one
pub fn needs_generated_key(key: &str) -> bool {
    key.is_empty() || key.ends_with(IDENTITY_SEPARATOR)
}

/// A stored document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document key
    pub key: String,
    /// Current version
    pub version: Version,
    /// Document metadata
    #[serde(default)]
    pub metadata: Metadata,
    /// Document body
    pub content: JsonValue,
}

impl Document {
    /// Create a document
    pub fn new(
        key: impl Into<String>,
        version: Version,
        content: JsonValue,
        metadata: Metadata,
    ) -> Self {
        Document {
            key: key.into(),
            version,
            metadata,
            content,
        }
    }
}

/// Identity assigned by a successful put
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutOutcome {
    /// Final key (generated when the request asked for one)
    pub key: String,
    /// Version assigned to the write
    pub version: Version,
}

/// Operation buffered by a transaction
#[derive(Debug, Clone, PartialEq)]
pub enum StagedOp {
    /// Write the document at `version`
    Put {
        /// Version allocated when the write was staged
        version: Version,
        /// Document body
        content: JsonValue,
        /// Document metadata (commit-time entries are added by the store)
        metadata: Metadata,
    },
    /// Remove the document
    Delete,
}

/// A write staged in a transaction, applied to storage at commit
///
/// `base_version` is the committed version the transaction observed when it
/// first touched the key ([`Version::ZERO`] if absent). Commit fails when the
/// committed version has moved since (first-committer-wins).
#[derive(Debug, Clone, PartialEq)]
pub struct StagedWrite {
    /// Document key
    pub key: String,
    /// Committed version the write is based on
    pub base_version: Version,
    /// The buffered operation
    pub op: StagedOp,
}
