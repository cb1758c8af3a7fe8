//! MemoryStore: in-memory versioned document store
//!
//! This module implements [`DocumentStore`] and [`Storage`] using:
//! - `BTreeMap<String, Document>` for ordered key storage
//! - `parking_lot::RwLock` so version check and write happen under one lock
//! - `AtomicU64` for monotonically increasing version numbers
//! - `DashMap` for per-prefix identity counters (`users/` → `users/1`)
//!
//! # Design Notes
//!
//! - **No version history**: each key stores only its latest document
//! - **Global version counter**: versions are unique across keys, so every
//!   mutation of a key yields a strictly greater version
//! - **Commit stamping**: `@last-modified` is written when a document becomes
//!   durable (autocommit put, or transaction apply), never at staging

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use docwrite_core::{
    verify_expected_version, Document, DocumentStore, Error, JsonValue, Metadata, PutOutcome,
    Result, StagedOp, StagedWrite, Storage, Version, IDENTITY_SEPARATOR, LAST_MODIFIED,
};

fn default_true() -> bool {
    true
}

/// Store behaviour knobs (the `[store]` table of `docwrite.toml`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Stamp `@last-modified` into metadata on every committed write
    #[serde(default = "default_true")]
    pub stamp_last_modified: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            stamp_last_modified: true,
        }
    }
}

/// In-memory document store
///
/// Thread-safe through `parking_lot::RwLock` and `AtomicU64`. Cheap to share
/// behind an `Arc`.
#[derive(Debug)]
pub struct MemoryStore {
    /// Latest document per key
    data: RwLock<BTreeMap<String, Document>>,
    /// Global version counter
    version: AtomicU64,
    /// Last identity handed out per key prefix
    identities: DashMap<String, u64>,
    config: StoreConfig,
}

impl MemoryStore {
    /// Create an empty store with default configuration
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create an empty store
    ///
    /// Initial version is 0 (no writes have occurred).
    pub fn with_config(config: StoreConfig) -> Self {
        MemoryStore {
            data: RwLock::new(BTreeMap::new()),
            version: AtomicU64::new(0),
            identities: DashMap::new(),
            config,
        }
    }

    /// Store configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Number of stored documents
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Check if the store holds no documents
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Highest version allocated so far
    pub fn current_version(&self) -> Version {
        Version::new(self.version.load(Ordering::SeqCst))
    }

    /// All keys in order
    pub fn keys(&self) -> Vec<String> {
        self.data.read().keys().cloned().collect()
    }

    /// Allocate the next version atomically (1, 2, 3, ...)
    fn next_version(&self) -> Version {
        Version::new(self.version.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn stamp(&self, metadata: &mut Metadata) {
        if self.config.stamp_last_modified {
            metadata.insert(
                LAST_MODIFIED.to_string(),
                JsonValue::String(chrono::Utc::now().to_rfc3339()),
            );
        }
    }

    /// Next free `prefix + n`, checked against `data`
    ///
    /// The caller holds the data lock for as long as the returned key must
    /// stay free.
    fn next_identity(&self, data: &BTreeMap<String, Document>, prefix: &str) -> String {
        let mut counter = self.identities.entry(prefix.to_string()).or_insert(0);
        loop {
            *counter += 1;
            let candidate = format!("{}{}", prefix, *counter);
            if !data.contains_key(&candidate) {
                return candidate;
            }
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn current_version(data: &BTreeMap<String, Document>, key: &str) -> Version {
    data.get(key).map(|doc| doc.version).unwrap_or(Version::ZERO)
}

impl DocumentStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Document>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(
        &self,
        key: &str,
        expected_version: Option<Version>,
        content: JsonValue,
        mut metadata: Metadata,
    ) -> Result<PutOutcome> {
        let mut data = self.data.write();
        let key = if key.ends_with(IDENTITY_SEPARATOR) {
            self.next_identity(&data, key)
        } else {
            self.generate_key(key)
        };

        let current = current_version(&data, &key);
        if let Err(err) = verify_expected_version(&key, expected_version, current) {
            debug!(key = %key, expected = ?expected_version, actual = %current, "put rejected");
            return Err(err);
        }

        let version = self.next_version();
        self.stamp(&mut metadata);
        trace!(key = %key, version = %version, "put");
        data.insert(key.clone(), Document::new(key.clone(), version, content, metadata));

        Ok(PutOutcome { key, version })
    }

    fn delete(&self, key: &str, expected_version: Option<Version>) -> Result<bool> {
        let mut data = self.data.write();
        let current = current_version(&data, key);
        if let Err(err) = verify_expected_version(key, expected_version, current) {
            debug!(key, expected = ?expected_version, actual = %current, "delete rejected");
            return Err(err);
        }

        trace!(key, "delete");
        Ok(data.remove(key).is_some())
    }
}

impl Storage for MemoryStore {
    fn read_committed(&self, key: &str) -> Result<Option<Document>> {
        self.get(key)
    }

    fn allocate_version(&self) -> Version {
        self.next_version()
    }

    fn generate_key(&self, requested: &str) -> String {
        if requested.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else if requested.ends_with(IDENTITY_SEPARATOR) {
            self.next_identity(&self.data.read(), requested)
        } else {
            requested.to_string()
        }
    }

    /// Validate every write, then apply all of them under one write lock
    fn apply_batch(&self, writes: Vec<StagedWrite>) -> Result<()> {
        let mut data = self.data.write();

        for write in &writes {
            let current = current_version(&data, &write.key);
            if current != write.base_version {
                debug!(
                    key = %write.key,
                    base = %write.base_version,
                    actual = %current,
                    "batch rejected, key changed since it was read"
                );
                return Err(Error::conflict(&write.key, write.base_version, current));
            }
        }

        let count = writes.len();
        for write in writes {
            match write.op {
                StagedOp::Put {
                    version,
                    content,
                    mut metadata,
                } => {
                    self.stamp(&mut metadata);
                    data.insert(
                        write.key.clone(),
                        Document::new(write.key, version, content, metadata),
                    );
                }
                StagedOp::Delete => {
                    data.remove(&write.key);
                }
            }
        }

        trace!(count, "batch applied");
        Ok(())
    }
}
