//! Storage layer for docwrite
//!
//! This crate implements the in-memory document store with:
//! - MemoryStore: BTreeMap-based storage with RwLock
//! - Version management with AtomicU64
//! - Generated keys (UUIDs and per-prefix sequential identities)
//! - `@last-modified` stamping on committed writes

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod memory;

pub use memory::{MemoryStore, StoreConfig};
