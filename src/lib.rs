//! docwrite - the batch write path of a versioned document store
//!
//! A batch of heterogeneous commands (put, delete, declarative patch, scripted
//! patch) runs in order against a keyed, versioned store with optimistic
//! concurrency, and comes back as one result per processed command.
//!
//! # Quick Start
//!
//! ```ignore
//! use docwrite::{Command, Database};
//!
//! let db = Database::in_memory();
//! let results = db.execute_batch(&[
//!     Command::put("users/", json!({"name": "Alice"})),
//!     Command::script("users/1", "inc logins"),
//! ])?;
//! ```
//!
//! # Architecture
//!
//! Every batch goes through the [`Executor`]. [`Database`] wires the in-memory
//! store, the transaction manager and the patch engine together and hands
//! out [`Session`]s for explicit transactions.

pub use docwrite_core::{
    Document, JsonPath, JsonValue, Metadata, PatchOp, PatchOutcome, Version, LAST_MODIFIED,
};
pub use docwrite_executor::*;
