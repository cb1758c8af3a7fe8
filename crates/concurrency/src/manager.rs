//! Transaction manager for coordinating commit operations
//!
//! Provides atomic commit by orchestrating:
//! 1. Validation (first-committer-wins)
//! 2. Storage application (visibility)
//! 3. Post-commit callbacks
//!
//! ## Commit Sequence
//!
//! ```text
//! 1. mark_validating() - Change state to Validating, reject new writes
//! 2. take_writes() - Drain staged writes
//! 3. apply_batch() - Storage validates base versions and applies atomically
//! 4. IF conflict: mark_aborted(), drop callbacks, return error
//! 5. mark_committed() - Change state to Committed
//! 6. Run post-commit callbacks in registration order
//! ```
//!
//! Callbacks run after the storage write lock is released, so they may read
//! from the store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use docwrite_core::{Result, Storage};

use crate::transaction::TransactionContext;

/// Counters for transactions handled by a manager
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionStats {
    /// Transactions begun
    pub started: u64,
    /// Transactions committed
    pub committed: u64,
    /// Transactions aborted (user rollback or conflict)
    pub aborted: u64,
}

/// Manages transaction lifecycle and atomic commits
#[derive(Debug)]
pub struct TransactionManager {
    /// Next transaction ID
    next_txn_id: AtomicU64,
    started: AtomicU64,
    committed: AtomicU64,
    aborted: AtomicU64,
}

impl TransactionManager {
    /// Create a new transaction manager
    pub fn new() -> Self {
        TransactionManager {
            next_txn_id: AtomicU64::new(1),
            started: AtomicU64::new(0),
            committed: AtomicU64::new(0),
            aborted: AtomicU64::new(0),
        }
    }

    /// Begin a new transaction
    pub fn begin(&self) -> Arc<TransactionContext> {
        let txn_id = self.next_txn_id.fetch_add(1, Ordering::SeqCst);
        self.started.fetch_add(1, Ordering::Relaxed);
        debug!(txn_id, "transaction begin");
        Arc::new(TransactionContext::new(txn_id))
    }

    /// Commit a transaction against `store`
    ///
    /// On a conflict the transaction is aborted, its callbacks are dropped
    /// unrun, and the conflict is returned.
    ///
    /// # Errors
    /// - `TransactionNotActive` if the transaction already finished
    /// - `ConcurrencyConflict` if a written key changed since it was read
    pub fn commit<S: Storage + ?Sized>(&self, txn: &TransactionContext, store: &S) -> Result<()> {
        txn.mark_validating()?;

        let writes = txn.take_writes();
        let write_count = writes.len();

        if let Err(err) = store.apply_batch(writes) {
            let dropped = txn.mark_aborted(err.to_string()).unwrap_or(0);
            self.aborted.fetch_add(1, Ordering::Relaxed);
            warn!(
                txn_id = txn.id(),
                error = %err,
                callbacks_skipped = dropped,
                "transaction aborted at commit"
            );
            return Err(err);
        }

        let callbacks = txn.mark_committed()?;
        self.committed.fetch_add(1, Ordering::Relaxed);
        info!(
            txn_id = txn.id(),
            writes = write_count,
            callbacks = callbacks.len(),
            "transaction committed"
        );

        for callback in callbacks {
            callback();
        }
        Ok(())
    }

    /// Abort a transaction, discarding its writes and callbacks
    pub fn abort(&self, txn: &TransactionContext, reason: &str) -> Result<()> {
        let dropped = txn.mark_aborted(reason)?;
        self.aborted.fetch_add(1, Ordering::Relaxed);
        debug!(txn_id = txn.id(), reason, callbacks_skipped = dropped, "transaction aborted");
        Ok(())
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> TransactionStats {
        TransactionStats {
            started: self.started.load(Ordering::Relaxed),
            committed: self.committed.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
        }
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TransactionalStore;
    use docwrite_core::{run_after_commit, DocumentStore, Metadata};
    use docwrite_storage::MemoryStore;
    use parking_lot::Mutex;
    use serde_json::json;

    #[test]
    fn test_transaction_ids_increase() {
        let manager = TransactionManager::new();
        let t1 = manager.begin();
        let t2 = manager.begin();
        assert!(t2.id() > t1.id());
        assert_eq!(manager.stats().started, 2);
    }

    #[test]
    fn test_commit_applies_writes_then_runs_callbacks() {
        let manager = TransactionManager::new();
        let store = Arc::new(MemoryStore::new());
        let txn = manager.begin();
        let view = TransactionalStore::new(Arc::clone(&txn), Arc::clone(&store));

        view.put("a", None, json!({"n": 1}), Metadata::new()).unwrap();

        let seen = Arc::new(Mutex::new(None));
        let seen_cb = Arc::clone(&seen);
        let store_cb = Arc::clone(&store);
        run_after_commit(txn.as_ref(), move || {
            *seen_cb.lock() = store_cb.get("a").unwrap().map(|d| d.content);
        });

        assert!(store.get("a").unwrap().is_none());
        manager.commit(&txn, store.as_ref()).unwrap();

        assert_eq!(*seen.lock(), Some(json!({"n": 1})));
        assert!(txn.is_committed());
        assert_eq!(manager.stats().committed, 1);
    }

    #[test]
    fn test_abort_skips_callbacks() {
        let manager = TransactionManager::new();
        let store = Arc::new(MemoryStore::new());
        let txn = manager.begin();
        let view = TransactionalStore::new(Arc::clone(&txn), Arc::clone(&store));
        view.put("a", None, json!({}), Metadata::new()).unwrap();

        let ran = Arc::new(Mutex::new(false));
        let ran_cb = Arc::clone(&ran);
        run_after_commit(txn.as_ref(), move || *ran_cb.lock() = true);

        manager.abort(&txn, "rollback").unwrap();
        assert!(!*ran.lock());
        assert!(store.get("a").unwrap().is_none());
        assert_eq!(manager.stats().aborted, 1);
    }

    #[test]
    fn test_conflict_at_commit_aborts() {
        let manager = TransactionManager::new();
        let store = Arc::new(MemoryStore::new());
        store.put("a", None, json!({"v": 0}), Metadata::new()).unwrap();

        let txn = manager.begin();
        let view = TransactionalStore::new(Arc::clone(&txn), Arc::clone(&store));
        view.put("a", None, json!({"v": 1}), Metadata::new()).unwrap();

        let ran = Arc::new(Mutex::new(false));
        let ran_cb = Arc::clone(&ran);
        run_after_commit(txn.as_ref(), move || *ran_cb.lock() = true);

        // Another writer commits first
        store.put("a", None, json!({"v": 2}), Metadata::new()).unwrap();

        let err = manager.commit(&txn, store.as_ref()).unwrap_err();
        assert!(err.is_conflict());
        assert!(txn.is_aborted());
        assert!(!*ran.lock());
        assert_eq!(store.get("a").unwrap().unwrap().content, json!({"v": 2}));
    }

    #[test]
    fn test_commit_twice_fails() {
        let manager = TransactionManager::new();
        let store = MemoryStore::new();
        let txn = manager.begin();
        manager.commit(&txn, &store).unwrap();
        assert!(manager.commit(&txn, &store).is_err());
        assert!(manager.abort(&txn, "late").is_err());
    }
}
