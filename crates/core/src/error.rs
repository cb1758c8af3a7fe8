//! Error types for the docwrite write path
//!
//! Every failure a command can produce is one variant of [`Error`]. The
//! variants are grouped by [`ErrorKind`] so callers can branch on the class of
//! failure without matching every field.
//!
//! | Kind | Variant | Raised by |
//! |------|---------|-----------|
//! | Concurrency | `ConcurrencyConflict` | store, patch engine, transaction commit |
//! | Validation | `Validation` | dispatcher (before any store call) |
//! | Script | `ScriptExecution` | scripted patches |
//! | Patch | `PatchFailed` | declarative patches |
//! | Transaction | `TransactionNotActive` | writes through a finished transaction |
//! | System | `Storage` | store-level failures, propagated unmodified |

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Version;

/// Result type alias for docwrite operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Expected version did not match the current version
    ConcurrencyConflict,
    /// Structurally invalid command
    Validation,
    /// A patch script raised an error
    ScriptExecution,
    /// A declarative patch could not be applied
    PatchFailed,
    /// The transaction is no longer accepting operations
    TransactionNotActive,
    /// Storage-level failure
    Storage,
}

/// Errors raised while executing commands
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum Error {
    /// Version conflict (compare-and-swap failure)
    ///
    /// `actual` is [`Version::ZERO`] when the document does not exist.
    #[error("concurrency conflict on '{key}': expected version {expected}, actual {actual}")]
    ConcurrencyConflict {
        /// Document key
        key: String,
        /// Version the caller expected
        expected: Version,
        /// Version found in the store
        actual: Version,
    },

    /// Command rejected before reaching the store
    #[error("invalid command: {reason}")]
    Validation {
        /// What was wrong with the command
        reason: String,
    },

    /// Patch script raised an error
    #[error("script failed on '{key}': {message}")]
    ScriptExecution {
        /// Document key
        key: String,
        /// Error message produced by the script
        message: String,
        /// Trace collected up to the failure (empty unless debug mode was requested)
        debug_log: Vec<String>,
    },

    /// Declarative patch operation could not be applied
    #[error("patch failed on '{key}': {reason}")]
    PatchFailed {
        /// Document key
        key: String,
        /// Why the operation failed
        reason: String,
    },

    /// Operation attempted on a transaction that is not active
    #[error("transaction not active: {state}")]
    TransactionNotActive {
        /// Current transaction state
        state: String,
    },

    /// Storage layer error
    #[error("storage error: {message}")]
    Storage {
        /// Error message from the store
        message: String,
    },
}

impl Error {
    /// Create a concurrency conflict error
    pub fn conflict(key: impl Into<String>, expected: Version, actual: Version) -> Self {
        Error::ConcurrencyConflict {
            key: key.into(),
            expected,
            actual,
        }
    }

    /// Create a validation error
    pub fn validation(reason: impl Into<String>) -> Self {
        Error::Validation {
            reason: reason.into(),
        }
    }

    /// Create a declarative patch failure
    pub fn patch_failed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::PatchFailed {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Error::Storage {
            message: message.into(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ConcurrencyConflict { .. } => ErrorKind::ConcurrencyConflict,
            Error::Validation { .. } => ErrorKind::Validation,
            Error::ScriptExecution { .. } => ErrorKind::ScriptExecution,
            Error::PatchFailed { .. } => ErrorKind::PatchFailed,
            Error::TransactionNotActive { .. } => ErrorKind::TransactionNotActive,
            Error::Storage { .. } => ErrorKind::Storage,
        }
    }

    /// Check if this is a concurrency conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::ConcurrencyConflict { .. })
    }

    /// Key of the document involved, if the error names one
    pub fn key(&self) -> Option<&str> {
        match self {
            Error::ConcurrencyConflict { key, .. }
            | Error::ScriptExecution { key, .. }
            | Error::PatchFailed { key, .. } => Some(key),
            _ => None,
        }
    }
}
