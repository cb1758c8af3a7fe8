//! Command types defining the batch write operations.
//!
//! A command is one entry in a batch. Every command carries the same identity
//! fields (key, expected version, metadata, additional data) plus exactly one
//! [`CommandKind`].
//!
//! Commands are:
//! - **Self-contained**: everything needed for execution is in the command
//! - **Serializable**: a batch can be submitted as JSON
//! - **Never mutated by execution**: generated keys and new versions go into
//!   the [`CommandResult`](crate::CommandResult), not back into the command
//!
//! # JSON form
//!
//! ```json
//! {"method": "PUT", "key": "users/", "content": {"name": "Alice"}}
//! {"method": "DELETE", "key": "users/1", "expected_version": 4}
//! {"method": "PATCH", "key": "users/1", "patches": [{"type": "Inc", "path": "logins"}]}
//! {"method": "EVAL", "key": "users/1", "script": "set active = true", "debug_mode": true}
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use docwrite_core::{needs_generated_key, Error, JsonValue, Metadata, PatchOp, Result, Version};

/// Method tag of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// Insert or replace a document
    Put,
    /// Remove a document
    Delete,
    /// Declarative patch
    Patch,
    /// Scripted patch
    Eval,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Eval => "EVAL",
        };
        write!(f, "{}", s)
    }
}

/// Variant-specific part of a command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "UPPERCASE")]
pub enum CommandKind {
    /// Insert or replace a document.
    /// Result: `key` (generated if requested) and `version`
    Put {
        /// Document body, must be a JSON object
        content: JsonValue,
    },

    /// Remove a document.
    /// Result: `deleted`
    Delete,

    /// Declarative patch.
    /// Result: `patch_outcome`, `version` refreshed after commit
    Patch {
        /// Applied when the document exists
        #[serde(default)]
        patches: Vec<PatchOp>,
        /// Applied to an empty object when the document is missing
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        patches_if_missing: Vec<PatchOp>,
    },

    /// Scripted patch.
    /// Result: `patch_outcome`, plus `debug_log` in debug mode
    #[serde(rename = "EVAL")]
    ScriptedPatch {
        /// Script run against an existing document
        script: String,
        /// Script run when the document is missing
        #[serde(default, skip_serializing_if = "Option::is_none")]
        script_if_missing: Option<String>,
        /// Return the execution trace and resulting document
        #[serde(default)]
        debug_mode: bool,
    },
}

/// A single batch command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Document key (empty or ending in `/` asks a Put to generate one)
    #[serde(default)]
    pub key: String,
    /// Compare-and-swap guard (absent = no check)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_version: Option<Version>,
    /// Metadata written with the document
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
    /// Caller-opaque data echoed back in the result
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub additional_data: Metadata,
    /// What the command does
    #[serde(flatten)]
    pub kind: CommandKind,
}

impl Command {
    fn new(key: impl Into<String>, kind: CommandKind) -> Self {
        Command {
            key: key.into(),
            expected_version: None,
            metadata: Metadata::new(),
            additional_data: Metadata::new(),
            kind,
        }
    }

    /// Put `content` at `key`
    pub fn put(key: impl Into<String>, content: JsonValue) -> Self {
        Self::new(key, CommandKind::Put { content })
    }

    /// Delete `key`
    pub fn delete(key: impl Into<String>) -> Self {
        Self::new(key, CommandKind::Delete)
    }

    /// Patch `key` with `patches`; nothing happens if it is missing
    pub fn patch(key: impl Into<String>, patches: Vec<PatchOp>) -> Self {
        Self::new(
            key,
            CommandKind::Patch {
                patches,
                patches_if_missing: Vec::new(),
            },
        )
    }

    /// Run `script` against `key`
    pub fn script(key: impl Into<String>, script: impl Into<String>) -> Self {
        Self::new(
            key,
            CommandKind::ScriptedPatch {
                script: script.into(),
                script_if_missing: None,
                debug_mode: false,
            },
        )
    }

    /// Set the expected version
    pub fn with_expected_version(mut self, version: Version) -> Self {
        self.expected_version = Some(version);
        self
    }

    /// Set the metadata
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Add one additional-data entry
    pub fn with_additional_data(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.additional_data.insert(key.into(), value);
        self
    }

    /// Patches used when the document is missing (Patch only)
    pub fn with_patches_if_missing(mut self, ops: Vec<PatchOp>) -> Self {
        if let CommandKind::Patch {
            patches_if_missing, ..
        } = &mut self.kind
        {
            *patches_if_missing = ops;
        }
        self
    }

    /// Script used when the document is missing (scripted patch only)
    pub fn with_script_if_missing(mut self, source: impl Into<String>) -> Self {
        if let CommandKind::ScriptedPatch {
            script_if_missing, ..
        } = &mut self.kind
        {
            *script_if_missing = Some(source.into());
        }
        self
    }

    /// Enable debug mode (scripted patch only)
    pub fn with_debug_mode(mut self, enabled: bool) -> Self {
        if let CommandKind::ScriptedPatch { debug_mode, .. } = &mut self.kind {
            *debug_mode = enabled;
        }
        self
    }

    /// Method tag
    pub fn method(&self) -> Method {
        match self.kind {
            CommandKind::Put { .. } => Method::Put,
            CommandKind::Delete => Method::Delete,
            CommandKind::Patch { .. } => Method::Patch,
            CommandKind::ScriptedPatch { .. } => Method::Eval,
        }
    }

    /// Reject structurally invalid commands before any store call
    pub fn validate(&self, max_key_length: usize) -> Result<()> {
        if self.key.len() > max_key_length {
            return Err(Error::validation(format!(
                "key is {} bytes, maximum is {}",
                self.key.len(),
                max_key_length
            )));
        }

        if !matches!(self.kind, CommandKind::Put { .. }) && needs_generated_key(&self.key) {
            return Err(Error::validation(format!(
                "{} needs a concrete key, got '{}'",
                self.method(),
                self.key
            )));
        }

        match &self.kind {
            CommandKind::Put { content } => {
                if !content.is_object() {
                    return Err(Error::validation("PUT content must be a JSON object"));
                }
            }
            CommandKind::Delete => {}
            CommandKind::Patch {
                patches,
                patches_if_missing,
            } => {
                if patches.is_empty() && patches_if_missing.is_empty() {
                    return Err(Error::validation(format!(
                        "PATCH on '{}' has no patches",
                        self.key
                    )));
                }
                patches
                    .iter()
                    .chain(patches_if_missing)
                    .try_for_each(PatchOp::validate)?;
            }
            CommandKind::ScriptedPatch { script, .. } => {
                if script.trim().is_empty() {
                    return Err(Error::validation(format!(
                        "EVAL on '{}' has an empty script",
                        self.key
                    )));
                }
            }
        }
        Ok(())
    }
}
