//! # docwrite executor
//!
//! The batch write path: commands go in, one result per processed command
//! comes out.
//!
//! This crate provides:
//! - [`Command`] / [`CommandResult`] - the batch wire model
//! - [`Executor`] - dispatcher and fail-fast batch aggregator
//! - [`Database`] / [`Session`] - in-memory store, transactions and config
//!
//! ## Quick Start
//!
//! ```text
//! use docwrite_executor::{Command, Database};
//!
//! let db = Database::in_memory();
//! let results = db.execute_batch(&[
//!     Command::put("users/", json!({"name": "Alice"})),
//!     Command::script("users/1", "inc logins"),
//! ])?;
//! ```
//!
//! ## Commands
//!
//! | Method | Result fields |
//! |--------|---------------|
//! | **PUT** | `key`, `version` |
//! | **DELETE** | `deleted` |
//! | **PATCH** | `patch_outcome`, refreshed `version` and `metadata` |
//! | **EVAL** | `patch_outcome`, `debug_log` in debug mode |
//!
//! Patch results read their final version and metadata once the enclosing
//! transaction commits. Outside a transaction that happens immediately.

#![warn(missing_docs)]

mod command;
mod config;
mod database;
mod executor;
mod result;
mod session;

#[cfg(test)]
mod tests;

pub use command::{Command, CommandKind, Method};
pub use config::{DocwriteConfig, CONFIG_FILE_NAME};
pub use database::Database;
pub use executor::{BatchConfig, Executor, DEBUG_DOCUMENT_KEY, DEBUG_LOG_KEY};
pub use result::{snapshot_all, BatchFailure, BatchResults, CommandResult, SharedResult};
pub use session::Session;

pub use docwrite_core::{Error, ErrorKind, Result};
