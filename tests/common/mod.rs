//! Shared test utilities for the integration suites.
//!
//! Import via `mod common;` from any test's main.rs.

#![allow(dead_code)]

pub use docwrite::{
    Command, CommandResult, Database, DocwriteConfig, ErrorKind, JsonPath, JsonValue, Metadata,
    PatchOp, PatchOutcome, Version,
};
pub use serde_json::json;

/// Parse a path, panicking on bad test input.
pub fn path(s: &str) -> JsonPath {
    s.parse().unwrap()
}

/// Metadata with a single `tag` entry.
pub fn tagged(tag: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("tag".into(), json!(tag));
    metadata
}

/// Run a single command outside any transaction and return its result.
pub fn run_one(db: &Database, command: Command) -> CommandResult {
    let results = db.execute_batch(&[command]).unwrap();
    results[0].snapshot()
}

/// Put `content` at `key` and return the assigned version.
pub fn seed(db: &Database, key: &str, content: JsonValue) -> Version {
    run_one(db, Command::put(key, content)).version.unwrap()
}

/// Current version of `key`, if present.
pub fn version_of(db: &Database, key: &str) -> Option<Version> {
    db.get(key).unwrap().map(|doc| doc.version)
}
