//! Collaborator traits
//!
//! The write path talks to its collaborators only through these traits:
//!
//! - [`DocumentStore`]: keyed, versioned document access with compare-and-swap
//! - [`Storage`]: commit target that applies a transaction's staged writes
//! - [`PatchEngine`]: declarative and scripted patch evaluation
//! - [`CommitScope`]: the ambient transaction, owner of post-commit callbacks
//!
//! All of them are `Send + Sync` so a handle can be shared across threads.

use std::sync::Arc;

use crate::error::Result;
use crate::json::JsonValue;
use crate::patch::{PatchRequest, PatchResult, ScriptRequest};
use crate::types::{Document, Metadata, PutOutcome, StagedWrite, Version};

/// Keyed, versioned document access
///
/// Every mutation is a compare-and-swap: it succeeds only if
/// `expected_version` is `None` or equals the current version
/// ([`Version::ZERO`] for a missing document), and assigns a version strictly
/// greater than the previous one. A failed check returns
/// [`Error::ConcurrencyConflict`](crate::Error::ConcurrencyConflict) and
/// leaves the document unchanged.
pub trait DocumentStore: Send + Sync {
    /// Read the current document
    fn get(&self, key: &str) -> Result<Option<Document>>;

    /// Insert or replace a document
    ///
    /// An empty key, or a key ending in `/`, asks the store to generate one.
    /// The returned [`PutOutcome`] carries the final key and new version.
    fn put(
        &self,
        key: &str,
        expected_version: Option<Version>,
        content: JsonValue,
        metadata: Metadata,
    ) -> Result<PutOutcome>;

    /// Remove a document
    ///
    /// Returns `true` if a document was removed, `false` if none existed.
    fn delete(&self, key: &str, expected_version: Option<Version>) -> Result<bool>;
}

impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<Document>> {
        (**self).get(key)
    }

    fn put(
        &self,
        key: &str,
        expected_version: Option<Version>,
        content: JsonValue,
        metadata: Metadata,
    ) -> Result<PutOutcome> {
        (**self).put(key, expected_version, content, metadata)
    }

    fn delete(&self, key: &str, expected_version: Option<Version>) -> Result<bool> {
        (**self).delete(key, expected_version)
    }
}

/// Commit target for transactions
///
/// Thread safety: all methods must be safe to call concurrently.
pub trait Storage: Send + Sync {
    /// Read the latest committed document
    fn read_committed(&self, key: &str) -> Result<Option<Document>>;

    /// Reserve the next version from the global counter
    fn allocate_version(&self) -> Version;

    /// Resolve a requested key, generating one when asked
    ///
    /// Keys that do not ask for generation are returned unchanged.
    fn generate_key(&self, requested: &str) -> String;

    /// Apply a transaction's staged writes atomically
    ///
    /// Each write is validated against its `base_version` before anything is
    /// applied. If any key's committed version has moved, nothing is applied
    /// and a concurrency conflict is returned.
    fn apply_batch(&self, writes: Vec<StagedWrite>) -> Result<()>;
}

impl<T: Storage + ?Sized> Storage for Arc<T> {
    fn read_committed(&self, key: &str) -> Result<Option<Document>> {
        (**self).read_committed(key)
    }

    fn allocate_version(&self) -> Version {
        (**self).allocate_version()
    }

    fn generate_key(&self, requested: &str) -> String {
        (**self).generate_key(requested)
    }

    fn apply_batch(&self, writes: Vec<StagedWrite>) -> Result<()> {
        (**self).apply_batch(writes)
    }
}

/// Evaluates patches against a document store
pub trait PatchEngine: Send + Sync {
    /// Apply a declarative patch
    fn apply(&self, store: &dyn DocumentStore, request: PatchRequest<'_>) -> Result<PatchResult>;

    /// Run a patch script
    fn apply_script(
        &self,
        store: &dyn DocumentStore,
        request: ScriptRequest<'_>,
    ) -> Result<PatchResult>;
}

/// Callback run once after a transaction commits
pub type PostCommitCallback = Box<dyn FnOnce() + Send + 'static>;

/// The commit scope a command runs under
///
/// An active scope collects post-commit callbacks and runs them, in
/// registration order, after it commits. Callbacks are dropped unrun if the
/// scope aborts.
pub trait CommitScope: Send + Sync {
    /// Whether a transaction is open
    fn is_active(&self) -> bool;

    /// Append a callback to the post-commit list
    ///
    /// Only called while [`is_active`](CommitScope::is_active) is true.
    fn register_post_commit(&self, callback: PostCommitCallback);
}

/// Scope with no ambient transaction: every write commits on its own
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTransaction;

impl CommitScope for NoTransaction {
    fn is_active(&self) -> bool {
        false
    }

    fn register_post_commit(&self, callback: PostCommitCallback) {
        callback();
    }
}

/// Run `callback` now, or after the active transaction commits
///
/// Returns `true` if the callback was deferred.
pub fn run_after_commit<F>(scope: &dyn CommitScope, callback: F) -> bool
where
    F: FnOnce() + Send + 'static,
{
    if scope.is_active() {
        scope.register_post_commit(Box::new(callback));
        true
    } else {
        callback();
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingScope {
        callbacks: Mutex<Vec<PostCommitCallback>>,
    }

    impl CommitScope for RecordingScope {
        fn is_active(&self) -> bool {
            true
        }

        fn register_post_commit(&self, callback: PostCommitCallback) {
            self.callbacks.lock().unwrap().push(callback);
        }
    }

    #[test]
    fn test_no_transaction_runs_immediately() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        let deferred = run_after_commit(&NoTransaction, move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert!(!deferred);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_active_scope_defers() {
        let scope = RecordingScope::default();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        let deferred = run_after_commit(&scope, move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert!(deferred);
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        for cb in scope.callbacks.lock().unwrap().drain(..) {
            cb();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
