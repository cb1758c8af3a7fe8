//! Core types and traits for docwrite
//!
//! This crate defines the foundational types used throughout the write path:
//! - Version: per-key version token for optimistic concurrency
//! - Document, Metadata: stored documents and their metadata
//! - JsonPath: paths into document content, plus path mutation helpers
//! - PatchOp: declarative patch operations and patch request/result types
//! - Error: the error taxonomy shared by every crate
//! - Traits: collaborator contracts (DocumentStore, Storage, PatchEngine, CommitScope)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod json;
pub mod patch;
pub mod traits;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use json::{
    delete_at_path, get_at_path, get_at_path_mut, set_at_path, JsonPath, JsonPathError,
    JsonValue, PathParseError, PathSegment, MAX_PATH_LENGTH,
};
pub use patch::{PatchOp, PatchOutcome, PatchRequest, PatchResult, ScriptRequest};
pub use traits::{
    run_after_commit, CommitScope, DocumentStore, NoTransaction, PatchEngine,
    PostCommitCallback, Storage,
};
pub use types::{
    needs_generated_key, verify_expected_version, Document, Metadata, PutOutcome, StagedOp,
    StagedWrite, Version, IDENTITY_SEPARATOR, LAST_MODIFIED,
};
