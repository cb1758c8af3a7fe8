//! Explicit transaction scope for batches.
//!
//! A [`Session`] owns one open transaction. Batches run through it see their
//! own writes, but nothing reaches the store (and no deferred refresh runs)
//! until [`Session::commit`].
//!
//! # Usage
//!
//! ```ignore
//! let session = db.begin();
//! let results = session.run_batch(&[Command::put("users/", json!({"name": "Alice"}))])?;
//! session.commit()?;
//! ```
//!
//! Dropping a session that was neither committed nor rolled back aborts it.

use std::sync::Arc;

use tracing::{debug, warn};

use docwrite_concurrency::{TransactionContext, TransactionManager, TransactionalStore};
use docwrite_core::{Document, DocumentStore, Result};
use docwrite_patch::JsonPatchEngine;
use docwrite_storage::MemoryStore;

use crate::command::Command;
use crate::executor::{BatchConfig, Executor};
use crate::result::{BatchFailure, BatchResults, SharedResult};

type TxnExecutor = Executor<TransactionalStore<MemoryStore>, JsonPatchEngine>;

/// A batch scope bound to one transaction
pub struct Session {
    executor: TxnExecutor,
    txn: Arc<TransactionContext>,
    manager: Arc<TransactionManager>,
    store: Arc<MemoryStore>,
}

impl Session {
    pub(crate) fn new(
        store: Arc<MemoryStore>,
        manager: Arc<TransactionManager>,
        patcher: Arc<JsonPatchEngine>,
        config: BatchConfig,
    ) -> Self {
        let txn = manager.begin();
        let view = Arc::new(TransactionalStore::new(Arc::clone(&txn), Arc::clone(&store)));
        Self {
            executor: Executor::new(view, patcher, config),
            txn,
            manager,
            store,
        }
    }

    /// Transaction id
    pub fn id(&self) -> u64 {
        self.txn.id()
    }

    /// Returns whether the transaction still accepts commands.
    pub fn is_active(&self) -> bool {
        self.txn.is_active()
    }

    /// Number of deferred callbacks waiting for commit
    pub fn pending_callbacks(&self) -> usize {
        self.txn.pending_callbacks()
    }

    /// Run a batch inside the transaction
    pub fn run_batch(&self, commands: &[Command]) -> std::result::Result<BatchResults, BatchFailure> {
        self.executor.run_batch(commands, self.txn.as_ref())
    }

    /// Run one command inside the transaction
    pub fn dispatch(&self, command: &Command) -> Result<SharedResult> {
        self.executor.dispatch(command, self.txn.as_ref())
    }

    /// Read through the transaction (sees its own uncommitted writes)
    pub fn get(&self, key: &str) -> Result<Option<Document>> {
        self.executor.store().get(key)
    }

    /// Apply every staged write, then run deferred callbacks in order.
    ///
    /// # Errors
    ///
    /// `ConcurrencyConflict` if another transaction committed a touched key
    /// first; the transaction is aborted in that case.
    pub fn commit(self) -> Result<()> {
        self.manager.commit(&self.txn, self.store.as_ref())
    }

    /// Discard staged writes and deferred callbacks.
    pub fn rollback(self) -> Result<()> {
        self.manager.abort(&self.txn, "rolled back")
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.txn.is_active() {
            debug!(txn_id = self.txn.id(), "dropping uncommitted session");
            if let Err(err) = self.manager.abort(&self.txn, "session dropped") {
                warn!(txn_id = self.txn.id(), error = %err, "abort on drop failed");
            }
        }
    }
}
