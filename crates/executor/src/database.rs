//! Database facade: store, transaction manager and patch engine wired together.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use docwrite_concurrency::{TransactionManager, TransactionStats};
use docwrite_core::{Document, DocumentStore, NoTransaction, Result};
use docwrite_patch::JsonPatchEngine;
use docwrite_storage::MemoryStore;

use crate::command::Command;
use crate::config::DocwriteConfig;
use crate::executor::Executor;
use crate::result::{BatchFailure, BatchResults};
use crate::session::Session;

/// An in-memory document database with a batch write path
pub struct Database {
    executor: Executor<MemoryStore, JsonPatchEngine>,
    store: Arc<MemoryStore>,
    manager: Arc<TransactionManager>,
    patcher: Arc<JsonPatchEngine>,
    config: DocwriteConfig,
}

impl Database {
    /// Open a database with `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured limits are invalid.
    pub fn open(config: DocwriteConfig) -> Result<Self> {
        config.validate()?;
        info!(
            max_batch_size = config.max_batch_size,
            max_key_length = config.max_key_length,
            "database opened"
        );
        Ok(Self::build(config))
    }

    /// Open with the default configuration.
    pub fn in_memory() -> Self {
        Self::build(DocwriteConfig::default())
    }

    fn build(config: DocwriteConfig) -> Self {
        let store = Arc::new(MemoryStore::with_config(config.store.clone()));
        let patcher = Arc::new(JsonPatchEngine::with_config(config.scripts.clone()));
        Self {
            executor: Executor::new(
                Arc::clone(&store),
                Arc::clone(&patcher),
                config.batch_config(),
            ),
            store,
            manager: Arc::new(TransactionManager::new()),
            patcher,
            config,
        }
    }

    /// Open with the configuration in a `docwrite.toml` file.
    pub fn from_config_file(path: &Path) -> Result<Self> {
        Self::open(DocwriteConfig::from_file(path)?)
    }

    /// Active configuration
    pub fn config(&self) -> &DocwriteConfig {
        &self.config
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// Transaction counters
    pub fn transaction_stats(&self) -> TransactionStats {
        self.manager.stats()
    }

    /// Read a committed document
    pub fn get(&self, key: &str) -> Result<Option<Document>> {
        self.store.get(key)
    }

    /// Run a batch with no enclosing transaction.
    ///
    /// Every command is durable as soon as it succeeds, so on failure the
    /// commands before it stay applied.
    pub fn execute_batch(
        &self,
        commands: &[Command],
    ) -> std::result::Result<BatchResults, BatchFailure> {
        self.executor.run_batch(commands, &NoTransaction)
    }

    /// Run a batch in one transaction: all commands apply or none do.
    ///
    /// If the commit itself fails, `failed_at` is the batch length.
    pub fn execute_batch_atomic(
        &self,
        commands: &[Command],
    ) -> std::result::Result<BatchResults, BatchFailure> {
        let session = self.begin();
        let results = match session.run_batch(commands) {
            Ok(results) => results,
            Err(failure) => {
                if let Err(err) = session.rollback() {
                    warn!(error = %err, "rollback after failed batch");
                }
                return Err(failure);
            }
        };

        match session.commit() {
            Ok(()) => Ok(results),
            Err(error) => Err(BatchFailure {
                results,
                failed_at: commands.len(),
                error,
            }),
        }
    }

    /// Open a transaction scope.
    pub fn begin(&self) -> Session {
        Session::new(
            Arc::clone(&self.store),
            Arc::clone(&self.manager),
            Arc::clone(&self.patcher),
            self.config.batch_config(),
        )
    }
}
