//! Patch engine for docwrite
//!
//! This crate evaluates patches against a [`DocumentStore`](docwrite_core::DocumentStore):
//! - ops: declarative field operations (Set, Inc, Add, Remove, ...)
//! - script: a small statement language with conditions, output and delete
//! - engine: `JsonPatchEngine`, the read-modify-write cycle with version checks

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine;
pub mod ops;
pub mod script;

pub use engine::{JsonPatchEngine, ScriptConfig, MAX_WRITE_ATTEMPTS};
pub use ops::{apply_op, apply_ops, PatchError};
pub use script::{Program, ScriptError, Trace};
