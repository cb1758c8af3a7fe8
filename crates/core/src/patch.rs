//! Patch operation types
//!
//! Declarative patches are an ordered list of [`PatchOp`] applied to document
//! content. Scripted patches carry a script body instead. Both kinds are
//! handed to a [`PatchEngine`](crate::traits::PatchEngine) through a borrowed
//! request and come back as a [`PatchResult`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::json::{JsonPath, JsonValue};
use crate::types::{Document, Metadata, Version};

fn default_increment() -> serde_json::Number {
    serde_json::Number::from(1)
}

/// A single field-level patch operation
///
/// Serialized with a `type` tag:
///
/// ```json
/// {"type": "Inc", "path": "stats.views", "by": 2}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PatchOp {
    /// Set or replace the value at `path`
    Set {
        /// Target location
        path: JsonPath,
        /// New value
        value: JsonValue,
    },
    /// Remove the value at `path` (no-op if missing)
    Unset {
        /// Target location
        path: JsonPath,
    },
    /// Add `by` to the number at `path` (missing field starts at 0)
    Inc {
        /// Target location
        path: JsonPath,
        /// Increment, defaults to 1
        #[serde(default = "default_increment")]
        by: serde_json::Number,
    },
    /// Append `value` to the array at `path`
    Add {
        /// Target array
        path: JsonPath,
        /// Element to append
        value: JsonValue,
    },
    /// Insert `value` into the array at `path` before `position`
    Insert {
        /// Target array
        path: JsonPath,
        /// Insertion index
        position: usize,
        /// Element to insert
        value: JsonValue,
    },
    /// Remove elements from the array at `path`
    ///
    /// Exactly one of `position` or `value` must be given.
    Remove {
        /// Target array
        path: JsonPath,
        /// Remove the element at this index
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<usize>,
        /// Remove every element equal to this value
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<JsonValue>,
    },
    /// Copy the value at `from` to `to`
    Copy {
        /// Source location
        from: JsonPath,
        /// Destination location
        to: JsonPath,
    },
    /// Move the value at `from` to `to`
    Rename {
        /// Source location
        from: JsonPath,
        /// Destination location
        to: JsonPath,
    },
    /// Apply `nested` to the object at `path`, creating it if missing
    Modify {
        /// Target object
        path: JsonPath,
        /// Operations applied relative to `path`
        nested: Vec<PatchOp>,
    },
}

impl PatchOp {
    /// Create a Set operation
    pub fn set(path: JsonPath, value: JsonValue) -> Self {
        PatchOp::Set { path, value }
    }

    /// Create an Unset operation
    pub fn unset(path: JsonPath) -> Self {
        PatchOp::Unset { path }
    }

    /// Create an Inc operation
    pub fn inc(path: JsonPath, by: impl Into<serde_json::Number>) -> Self {
        PatchOp::Inc {
            path,
            by: by.into(),
        }
    }

    /// Create an Add operation
    pub fn add(path: JsonPath, value: JsonValue) -> Self {
        PatchOp::Add { path, value }
    }

    /// Primary path this operation writes to
    pub fn path(&self) -> &JsonPath {
        match self {
            PatchOp::Set { path, .. }
            | PatchOp::Unset { path }
            | PatchOp::Inc { path, .. }
            | PatchOp::Add { path, .. }
            | PatchOp::Insert { path, .. }
            | PatchOp::Remove { path, .. }
            | PatchOp::Modify { path, .. } => path,
            PatchOp::Copy { to, .. } | PatchOp::Rename { to, .. } => to,
        }
    }

    /// Check structural validity (nested operations included)
    pub fn validate(&self) -> Result<()> {
        match self {
            PatchOp::Remove {
                position, value, ..
            } => match (position, value) {
                (Some(_), None) | (None, Some(_)) => Ok(()),
                _ => Err(Error::validation(format!(
                    "Remove at '{}' needs exactly one of position or value",
                    self.path()
                ))),
            },
            PatchOp::Modify { nested, .. } => nested.iter().try_for_each(PatchOp::validate),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for PatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchOp::Set { path, value } => write!(f, "Set {} = {}", path, value),
            PatchOp::Unset { path } => write!(f, "Unset {}", path),
            PatchOp::Inc { path, by } => write!(f, "Inc {} by {}", path, by),
            PatchOp::Add { path, value } => write!(f, "Add {} {}", path, value),
            PatchOp::Insert {
                path,
                position,
                value,
            } => write!(f, "Insert {}[{}] {}", path, position, value),
            PatchOp::Remove {
                path,
                position: Some(position),
                ..
            } => write!(f, "Remove {}[{}]", path, position),
            PatchOp::Remove { path, value, .. } => match value {
                Some(value) => write!(f, "Remove {} {}", path, value),
                None => write!(f, "Remove {}", path),
            },
            PatchOp::Copy { from, to } => write!(f, "Copy {} -> {}", from, to),
            PatchOp::Rename { from, to } => write!(f, "Rename {} -> {}", from, to),
            PatchOp::Modify { path, nested } => {
                write!(f, "Modify {} ({} ops)", path, nested.len())
            }
        }
    }
}

/// How a patch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatchOutcome {
    /// The document was modified and written
    Patched,
    /// The patch produced no change; nothing was written
    AlreadyPatched,
    /// The target did not exist and nothing was created
    DocumentDoesNotExist,
    /// A script removed the document
    DocumentDeleted,
}

impl PatchOutcome {
    /// Whether a document remains at the key after this outcome
    pub fn leaves_document(&self) -> bool {
        matches!(self, PatchOutcome::Patched | PatchOutcome::AlreadyPatched)
    }
}

impl fmt::Display for PatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PatchOutcome::Patched => "Patched",
            PatchOutcome::AlreadyPatched => "AlreadyPatched",
            PatchOutcome::DocumentDoesNotExist => "DocumentDoesNotExist",
            PatchOutcome::DocumentDeleted => "DocumentDeleted",
        };
        write!(f, "{}", s)
    }
}

/// Declarative patch handed to a patch engine
#[derive(Debug, Clone, Copy)]
pub struct PatchRequest<'a> {
    /// Target key
    pub key: &'a str,
    /// Compare-and-swap guard
    pub expected_version: Option<Version>,
    /// Applied when the document exists
    pub patches: &'a [PatchOp],
    /// Applied to an empty object when the document is missing
    pub patches_if_missing: &'a [PatchOp],
    /// Merged over the document's metadata on write
    pub metadata: &'a Metadata,
}

/// Scripted patch handed to a patch engine
#[derive(Debug, Clone, Copy)]
pub struct ScriptRequest<'a> {
    /// Target key
    pub key: &'a str,
    /// Compare-and-swap guard
    pub expected_version: Option<Version>,
    /// Script run against an existing document
    pub script: &'a str,
    /// Script run against an empty object when the document is missing
    pub script_if_missing: Option<&'a str>,
    /// Merged over the document's metadata on write
    pub metadata: &'a Metadata,
    /// Collect an execution trace
    pub debug_mode: bool,
}

/// What a patch engine reports back
#[derive(Debug, Clone, PartialEq)]
pub struct PatchResult {
    /// How the patch ended
    pub outcome: PatchOutcome,
    /// Version after the patch (None unless a document remains)
    pub version: Option<Version>,
    /// Resulting document, when one remains
    pub document: Option<Document>,
    /// Execution trace (scripts in debug mode only)
    pub debug_log: Option<Vec<String>>,
}

impl PatchResult {
    /// Result for a missing target that was left alone
    pub fn missing() -> Self {
        PatchResult {
            outcome: PatchOutcome::DocumentDoesNotExist,
            version: None,
            document: None,
            debug_log: None,
        }
    }
}
