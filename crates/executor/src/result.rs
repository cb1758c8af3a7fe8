//! Command results and batch aggregation types.
//!
//! Each dispatched command yields a [`SharedResult`]: a shared cell holding a
//! [`CommandResult`]. The cell is shared so that a refresh registered to run
//! after commit can fill in the final version and metadata once the
//! transaction is durable, after the batch call has already returned.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use docwrite_core::{Error, Metadata, PatchOutcome, Version};

use crate::command::{Command, Method};

/// Outcome of one command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Method of the command
    pub method: Method,
    /// Final key (generated by a Put when requested)
    pub key: String,
    /// Version after the command (absent after a delete or a missing patch target)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
    /// Document metadata
    #[serde(default)]
    pub metadata: Metadata,
    /// Caller data echoed back, plus engine output such as a debug snapshot
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub additional_data: Metadata,
    /// Whether a document was removed (Delete only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
    /// How a patch ended (Patch and EVAL only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch_outcome: Option<PatchOutcome>,
    /// Script trace (EVAL in debug mode only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_log: Option<Vec<String>>,
}

impl CommandResult {
    /// Result echoing the identity fields of `command`
    pub fn for_command(command: &Command) -> Self {
        CommandResult {
            method: command.method(),
            key: command.key.clone(),
            version: None,
            metadata: command.metadata.clone(),
            additional_data: command.additional_data.clone(),
            deleted: None,
            patch_outcome: None,
            debug_log: None,
        }
    }
}

/// Shared, updatable cell holding a [`CommandResult`]
#[derive(Debug, Clone)]
pub struct SharedResult(Arc<RwLock<CommandResult>>);

impl SharedResult {
    /// Wrap a result
    pub fn new(result: CommandResult) -> Self {
        SharedResult(Arc::new(RwLock::new(result)))
    }

    /// Copy of the current result
    pub fn snapshot(&self) -> CommandResult {
        self.0.read().clone()
    }

    /// Borrow the current result
    pub fn read(&self) -> RwLockReadGuard<'_, CommandResult> {
        self.0.read()
    }

    pub(crate) fn update(&self, f: impl FnOnce(&mut CommandResult)) {
        f(&mut self.0.write());
    }
}

impl Serialize for SharedResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.read().serialize(serializer)
    }
}

/// Results of a batch, one per processed command, in submission order
pub type BatchResults = Vec<SharedResult>;

/// Snapshot every result of a batch
pub fn snapshot_all(results: &[SharedResult]) -> Vec<CommandResult> {
    results.iter().map(SharedResult::snapshot).collect()
}

/// A batch stopped at its first failing command
///
/// `results` holds the results of the commands that ran before the failure.
/// Nothing is rolled back by the aggregator itself.
#[derive(Debug, Error)]
#[error("batch failed at command {failed_at}: {error}")]
pub struct BatchFailure {
    /// Results of the commands processed before the failure
    pub results: BatchResults,
    /// Index of the failing command (the batch length if the commit failed)
    pub failed_at: usize,
    /// The failure
    #[source]
    pub error: Error,
}

impl BatchFailure {
    /// Failure before any command ran
    pub fn rejected(error: Error) -> Self {
        BatchFailure {
            results: Vec::new(),
            failed_at: 0,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_for_command_echoes_identity() {
        let mut metadata = Metadata::new();
        metadata.insert("tag".into(), json!("x"));
        let cmd = Command::put("users/1", json!({}))
            .with_metadata(metadata.clone())
            .with_additional_data("trace", json!(7));

        let result = CommandResult::for_command(&cmd);
        assert_eq!(result.method, Method::Put);
        assert_eq!(result.key, "users/1");
        assert_eq!(result.metadata, metadata);
        assert_eq!(result.additional_data.get("trace"), Some(&json!(7)));
        assert_eq!(result.version, None);
    }

    #[test]
    fn test_shared_result_updates_are_visible_to_clones() {
        let shared = SharedResult::new(CommandResult::for_command(&Command::delete("a")));
        let clone = shared.clone();
        shared.update(|r| r.version = Some(Version::new(9)));
        assert_eq!(clone.snapshot().version, Some(Version::new(9)));
    }

    #[test]
    fn test_batch_failure_display() {
        let failure = BatchFailure {
            results: Vec::new(),
            failed_at: 2,
            error: Error::validation("bad"),
        };
        let msg = failure.to_string();
        assert!(msg.contains("command 2"));
        assert!(msg.contains("bad"));
    }
}
