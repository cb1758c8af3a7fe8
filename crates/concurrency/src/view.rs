//! Per-transaction document store view
//!
//! [`TransactionalStore`] is the [`DocumentStore`] a dispatcher writes through
//! while a transaction is open:
//!
//! - Reads see the transaction's own staged writes first, then committed state
//! - Writes are staged in the [`TransactionContext`], not applied
//! - Each staged write carries a version allocated from the base store, so the
//!   version reported to the caller is the one the document gets at commit
//! - The first write to a key records the committed version it was based on
//!
//! Once the transaction has committed, staged writes are gone and reads fall
//! through to the base store.

use std::sync::Arc;

use tracing::trace;

use docwrite_core::{
    verify_expected_version, Document, DocumentStore, JsonValue, Metadata, PutOutcome, Result,
    StagedOp, StagedWrite, Storage, Version,
};

use crate::transaction::TransactionContext;

/// Document store view bound to one transaction
#[derive(Debug)]
pub struct TransactionalStore<S> {
    txn: Arc<TransactionContext>,
    store: Arc<S>,
}

impl<S> Clone for TransactionalStore<S> {
    fn clone(&self) -> Self {
        TransactionalStore {
            txn: Arc::clone(&self.txn),
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: Storage> TransactionalStore<S> {
    /// Bind a view to `txn` over `store`
    pub fn new(txn: Arc<TransactionContext>, store: Arc<S>) -> Self {
        TransactionalStore { txn, store }
    }

    /// The transaction this view stages into
    pub fn transaction(&self) -> &Arc<TransactionContext> {
        &self.txn
    }

    /// The underlying committed store
    pub fn base(&self) -> &Arc<S> {
        &self.store
    }

    fn committed_version(&self, key: &str) -> Result<Version> {
        Ok(self
            .store
            .read_committed(key)?
            .map(|doc| doc.version)
            .unwrap_or(Version::ZERO))
    }

    /// Version visible to this transaction (staged first, then committed)
    fn visible_version(&self, key: &str) -> Result<Version> {
        match self.txn.staged(key) {
            Some(StagedOp::Put { version, .. }) => Ok(version),
            Some(StagedOp::Delete) => Ok(Version::ZERO),
            None => self.committed_version(key),
        }
    }

    fn base_version(&self, key: &str) -> Result<Version> {
        match self.txn.base_version(key) {
            Some(base) => Ok(base),
            None => self.committed_version(key),
        }
    }
}

impl<S: Storage> DocumentStore for TransactionalStore<S> {
    fn get(&self, key: &str) -> Result<Option<Document>> {
        match self.txn.staged(key) {
            Some(StagedOp::Put {
                version,
                content,
                metadata,
            }) => Ok(Some(Document::new(key, version, content, metadata))),
            Some(StagedOp::Delete) => Ok(None),
            None => self.store.read_committed(key),
        }
    }

    fn put(
        &self,
        key: &str,
        expected_version: Option<Version>,
        content: JsonValue,
        metadata: Metadata,
    ) -> Result<PutOutcome> {
        self.txn.ensure_active()?;

        let key = self.store.generate_key(key);
        verify_expected_version(&key, expected_version, self.visible_version(&key)?)?;

        let base_version = self.base_version(&key)?;
        let version = self.store.allocate_version();
        trace!(txn_id = self.txn.id(), key = %key, version = %version, "staged put");
        self.txn.stage(StagedWrite {
            key: key.clone(),
            base_version,
            op: StagedOp::Put {
                version,
                content,
                metadata,
            },
        })?;

        Ok(PutOutcome { key, version })
    }

    fn delete(&self, key: &str, expected_version: Option<Version>) -> Result<bool> {
        self.txn.ensure_active()?;

        let visible = self.visible_version(key)?;
        verify_expected_version(key, expected_version, visible)?;
        if visible.is_zero() {
            return Ok(false);
        }

        let base_version = self.base_version(key)?;
        trace!(txn_id = self.txn.id(), key, "staged delete");
        self.txn.stage(StagedWrite {
            key: key.to_string(),
            base_version,
            op: StagedOp::Delete,
        })?;
        Ok(true)
    }
}
