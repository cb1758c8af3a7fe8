//! Transaction context
//!
//! A [`TransactionContext`] buffers staged writes and post-commit callbacks
//! until the [`TransactionManager`](crate::TransactionManager) commits or
//! aborts it.
//!
//! ## State Machine
//!
//! ```text
//! Active ──► Validating ──► Committed
//!   │            │
//!   └────────────┴────────► Aborted
//! ```
//!
//! Terminal states (no transitions allowed):
//! - `Committed`
//! - `Aborted`

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;

use parking_lot::Mutex;
use tracing::warn;

use docwrite_core::{
    CommitScope, Error, PostCommitCallback, Result, StagedOp, StagedWrite, Version,
};

/// Status of a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Transaction is executing, can read/write
    Active,
    /// Staged writes are being validated and applied
    Validating,
    /// Transaction committed successfully
    Committed,
    /// Transaction was aborted
    Aborted {
        /// Human-readable reason for abort
        reason: String,
    },
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Active => write!(f, "active"),
            TransactionStatus::Validating => write!(f, "validating"),
            TransactionStatus::Committed => write!(f, "committed"),
            TransactionStatus::Aborted { reason } => write!(f, "aborted ({})", reason),
        }
    }
}

#[derive(Default)]
struct Buffers {
    /// One staged write per key, ordered by key
    writes: BTreeMap<String, StagedWrite>,
    /// Post-commit callbacks in registration order
    callbacks: Vec<PostCommitCallback>,
}

/// A single optimistic transaction
///
/// Shared as `Arc<TransactionContext>` between the session that drives it and
/// the [`TransactionalStore`](crate::TransactionalStore) view that stages
/// writes into it.
pub struct TransactionContext {
    txn_id: u64,
    status: Mutex<TransactionStatus>,
    buffers: Mutex<Buffers>,
}

impl fmt::Debug for TransactionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionContext")
            .field("txn_id", &self.txn_id)
            .field("status", &*self.status.lock())
            .field("pending_writes", &self.pending_writes())
            .field("pending_callbacks", &self.pending_callbacks())
            .finish()
    }
}

impl TransactionContext {
    /// Create an active transaction
    pub fn new(txn_id: u64) -> Self {
        TransactionContext {
            txn_id,
            status: Mutex::new(TransactionStatus::Active),
            buffers: Mutex::new(Buffers::default()),
        }
    }

    /// Transaction id
    pub fn id(&self) -> u64 {
        self.txn_id
    }

    /// Current status
    pub fn status(&self) -> TransactionStatus {
        self.status.lock().clone()
    }

    /// Check if transaction is active
    pub fn is_active(&self) -> bool {
        matches!(*self.status.lock(), TransactionStatus::Active)
    }

    /// Check if transaction is committed
    pub fn is_committed(&self) -> bool {
        matches!(*self.status.lock(), TransactionStatus::Committed)
    }

    /// Check if transaction is aborted
    pub fn is_aborted(&self) -> bool {
        matches!(*self.status.lock(), TransactionStatus::Aborted { .. })
    }

    /// Fail unless the transaction is active
    pub fn ensure_active(&self) -> Result<()> {
        let status = self.status.lock();
        match *status {
            TransactionStatus::Active => Ok(()),
            ref other => Err(Error::TransactionNotActive {
                state: format!("transaction {} is {}", self.txn_id, other),
            }),
        }
    }

    /// Number of keys with a staged write
    pub fn pending_writes(&self) -> usize {
        self.buffers.lock().writes.len()
    }

    /// Number of registered post-commit callbacks
    pub fn pending_callbacks(&self) -> usize {
        self.buffers.lock().callbacks.len()
    }

    /// Staged operation for `key`, if any
    pub fn staged(&self, key: &str) -> Option<StagedOp> {
        self.buffers.lock().writes.get(key).map(|w| w.op.clone())
    }

    /// Committed version observed when `key` was first written
    pub fn base_version(&self, key: &str) -> Option<Version> {
        self.buffers.lock().writes.get(key).map(|w| w.base_version)
    }

    /// Stage a write
    ///
    /// A later write to the same key replaces the operation but keeps the
    /// original base version.
    pub fn stage(&self, write: StagedWrite) -> Result<()> {
        let status = self.status.lock();
        if *status != TransactionStatus::Active {
            return Err(Error::TransactionNotActive {
                state: format!("transaction {} is {}", self.txn_id, *status),
            });
        }
        match self.buffers.lock().writes.entry(write.key.clone()) {
            Entry::Occupied(mut existing) => existing.get_mut().op = write.op,
            Entry::Vacant(slot) => {
                slot.insert(write);
            }
        }
        Ok(())
    }

    /// Transition to Validating state
    ///
    /// # State Transition
    /// `Active` → `Validating`
    pub fn mark_validating(&self) -> Result<()> {
        let mut status = self.status.lock();
        match *status {
            TransactionStatus::Active => {
                *status = TransactionStatus::Validating;
                Ok(())
            }
            ref other => Err(Error::TransactionNotActive {
                state: format!("cannot commit transaction {} from {}", self.txn_id, other),
            }),
        }
    }

    /// Drain the staged writes for application to storage
    pub fn take_writes(&self) -> Vec<StagedWrite> {
        std::mem::take(&mut self.buffers.lock().writes)
            .into_values()
            .collect()
    }

    /// Transition to Committed state
    ///
    /// Returns the post-commit callbacks, in registration order, for the
    /// caller to run.
    ///
    /// # State Transition
    /// `Validating` → `Committed`
    pub fn mark_committed(&self) -> Result<Vec<PostCommitCallback>> {
        let mut status = self.status.lock();
        match *status {
            TransactionStatus::Validating => {
                *status = TransactionStatus::Committed;
                Ok(std::mem::take(&mut self.buffers.lock().callbacks))
            }
            ref other => Err(Error::TransactionNotActive {
                state: format!("cannot commit transaction {} from {}", self.txn_id, other),
            }),
        }
    }

    /// Abort the transaction
    ///
    /// Staged writes and post-commit callbacks are discarded unrun. Returns
    /// the number of callbacks dropped.
    ///
    /// Can be called from `Active` (user abort) or `Validating` (conflict
    /// detected).
    pub fn mark_aborted(&self, reason: impl Into<String>) -> Result<usize> {
        let mut status = self.status.lock();
        match *status {
            TransactionStatus::Active | TransactionStatus::Validating => {
                *status = TransactionStatus::Aborted {
                    reason: reason.into(),
                };
                let mut buffers = self.buffers.lock();
                buffers.writes.clear();
                let dropped = buffers.callbacks.len();
                buffers.callbacks.clear();
                Ok(dropped)
            }
            ref other => Err(Error::TransactionNotActive {
                state: format!("cannot abort transaction {} from {}", self.txn_id, other),
            }),
        }
    }
}

impl CommitScope for TransactionContext {
    fn is_active(&self) -> bool {
        TransactionContext::is_active(self)
    }

    fn register_post_commit(&self, callback: PostCommitCallback) {
        let status = self.status.lock();
        if *status != TransactionStatus::Active {
            warn!(txn_id = self.txn_id, status = %*status, "callback on inactive transaction dropped");
            return;
        }
        self.buffers.lock().callbacks.push(callback);
    }
}
