//! Concurrency layer for docwrite
//!
//! This crate implements optimistic concurrency control (OCC) with:
//! - TransactionContext: staged writes and post-commit callbacks
//! - TransactionalStore: read-your-own-writes document view
//! - TransactionManager: first-committer-wins commit, abort, counters

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod manager;
pub mod transaction;
pub mod view;

pub use manager::{TransactionManager, TransactionStats};
pub use transaction::{TransactionContext, TransactionStatus};
pub use view::TransactionalStore;
