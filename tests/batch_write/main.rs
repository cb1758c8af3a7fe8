//! Batch write path integration tests.
//!
//! Drives the public `docwrite` API end to end: command dispatch, batch
//! aggregation, optimistic concurrency and post-commit refresh.

#[path = "../common/mod.rs"]
mod common;

mod concurrency;
mod properties;
mod scenarios;
mod transactions;
