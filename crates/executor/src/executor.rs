//! The Executor: command dispatch and batch aggregation.
//!
//! The Executor is a dispatcher. It holds no transaction state of its own:
//! every call receives the [`CommitScope`] the commands run under, so the
//! same executor serves autocommit batches and batches inside a session.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use docwrite_core::{
    run_after_commit, CommitScope, DocumentStore, JsonValue, PatchEngine, PatchOutcome,
    PatchRequest, PatchResult, Result, ScriptRequest,
};

use crate::command::{Command, CommandKind};
use crate::result::{BatchFailure, BatchResults, CommandResult, SharedResult};

/// Key under which a debug-mode script returns the resulting document
pub const DEBUG_DOCUMENT_KEY: &str = "Document";

/// Key under which every scripted patch echoes its debug trace (empty unless
/// debug mode was requested)
pub const DEBUG_LOG_KEY: &str = "Debug";

/// Limits applied by the executor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Largest accepted batch
    pub max_batch_size: usize,
    /// Longest accepted key, in bytes
    pub max_key_length: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig {
            max_batch_size: 1024,
            max_key_length: 512,
        }
    }
}

/// Dispatches commands against a document store and a patch engine
///
/// # Example
///
/// ```ignore
/// use docwrite_executor::{Command, Executor, BatchConfig};
/// use docwrite_core::NoTransaction;
///
/// let executor = Executor::new(store, patcher, BatchConfig::default());
/// let results = executor.run_batch(&[Command::put("users/", json!({}))], &NoTransaction)?;
/// ```
pub struct Executor<S, P> {
    store: Arc<S>,
    patcher: Arc<P>,
    config: BatchConfig,
}

impl<S, P> Clone for Executor<S, P> {
    fn clone(&self) -> Self {
        Executor {
            store: Arc::clone(&self.store),
            patcher: Arc::clone(&self.patcher),
            config: self.config,
        }
    }
}

impl<S, P> Executor<S, P>
where
    S: DocumentStore + 'static,
    P: PatchEngine,
{
    /// Create an executor
    pub fn new(store: Arc<S>, patcher: Arc<P>, config: BatchConfig) -> Self {
        Executor {
            store,
            patcher,
            config,
        }
    }

    /// Store the executor writes to
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Executor limits
    pub fn config(&self) -> BatchConfig {
        self.config
    }

    /// Run `commands` in order, stopping at the first failure
    ///
    /// On failure the results of the commands that already ran are returned
    /// inside the [`BatchFailure`]; nothing is rolled back here.
    pub fn run_batch(
        &self,
        commands: &[Command],
        scope: &dyn CommitScope,
    ) -> std::result::Result<BatchResults, BatchFailure> {
        if commands.len() > self.config.max_batch_size {
            return Err(BatchFailure::rejected(docwrite_core::Error::validation(
                format!(
                    "batch has {} commands, maximum is {}",
                    commands.len(),
                    self.config.max_batch_size
                ),
            )));
        }

        debug!(
            count = commands.len(),
            transactional = scope.is_active(),
            "batch start"
        );

        let mut results = Vec::with_capacity(commands.len());
        for (index, command) in commands.iter().enumerate() {
            match self.dispatch(command, scope) {
                Ok(result) => results.push(result),
                Err(error) => {
                    warn!(
                        index,
                        key = %command.key,
                        method = %command.method(),
                        error = %error,
                        "batch stopped"
                    );
                    return Err(BatchFailure {
                        results,
                        failed_at: index,
                        error,
                    });
                }
            }
        }

        info!(count = results.len(), "batch complete");
        Ok(results)
    }

    /// Execute a single command
    pub fn dispatch(&self, command: &Command, scope: &dyn CommitScope) -> Result<SharedResult> {
        command.validate(self.config.max_key_length)?;
        debug!(method = %command.method(), key = %command.key, "dispatch");

        let mut result = CommandResult::for_command(command);
        let key = command.key.as_str();

        match &command.kind {
            CommandKind::Put { content } => {
                let outcome = self.store.put(
                    key,
                    command.expected_version,
                    content.clone(),
                    command.metadata.clone(),
                )?;
                result.key = outcome.key;
                result.version = Some(outcome.version);
                Ok(SharedResult::new(result))
            }

            CommandKind::Delete => {
                let deleted = self.store.delete(key, command.expected_version)?;
                result.deleted = Some(deleted);
                Ok(SharedResult::new(result))
            }

            CommandKind::Patch {
                patches,
                patches_if_missing,
            } => {
                let patched = self.patcher.apply(
                    self.store.as_ref(),
                    PatchRequest {
                        key,
                        expected_version: command.expected_version,
                        patches,
                        patches_if_missing,
                        metadata: &command.metadata,
                    },
                )?;
                result.patch_outcome = Some(patched.outcome);
                Ok(self.finish_patch(result, patched.outcome, scope))
            }

            CommandKind::ScriptedPatch {
                script,
                script_if_missing,
                debug_mode,
            } => {
                let patched = self.patcher.apply_script(
                    self.store.as_ref(),
                    ScriptRequest {
                        key,
                        expected_version: command.expected_version,
                        script,
                        script_if_missing: script_if_missing.as_deref(),
                        metadata: &command.metadata,
                        debug_mode: *debug_mode,
                    },
                )?;
                result.patch_outcome = Some(patched.outcome);
                if *debug_mode {
                    Self::attach_debug(&mut result, patched);
                    return Ok(SharedResult::new(result));
                }
                result
                    .additional_data
                    .insert(DEBUG_LOG_KEY.to_string(), json!([]));
                Ok(self.finish_patch(result, patched.outcome, scope))
            }
        }
    }

    /// Debug mode is terminal: the trace and document snapshot go straight
    /// into the result and no refresh is registered.
    fn attach_debug(result: &mut CommandResult, patched: PatchResult) {
        let mut log = patched.debug_log.unwrap_or_default();
        if log.is_empty() {
            log.push(format!("outcome: {}", patched.outcome));
        }

        let snapshot = match &patched.document {
            Some(doc) => {
                result.metadata = doc.metadata.clone();
                doc.content.clone()
            }
            None => JsonValue::Null,
        };
        result.version = patched.version;
        result
            .additional_data
            .insert(DEBUG_DOCUMENT_KEY.to_string(), snapshot);
        result
            .additional_data
            .insert(DEBUG_LOG_KEY.to_string(), json!(log));
        result.debug_log = Some(log);
    }

    fn finish_patch(
        &self,
        result: CommandResult,
        outcome: PatchOutcome,
        scope: &dyn CommitScope,
    ) -> SharedResult {
        let shared = SharedResult::new(result);
        if outcome.leaves_document() {
            self.register_refresh(&shared, scope);
        }
        shared
    }

    /// Fill the result's version and metadata from the stored document, now
    /// or once the enclosing transaction has committed
    fn register_refresh(&self, shared: &SharedResult, scope: &dyn CommitScope) {
        let store = Arc::clone(&self.store);
        let cell = shared.clone();
        let key = shared.read().key.clone();

        let deferred = run_after_commit(scope, move || match store.get(&key) {
            Ok(Some(doc)) => cell.update(|r| {
                r.version = Some(doc.version);
                r.metadata = doc.metadata;
            }),
            Ok(None) => debug!(key = %key, "refresh found no document"),
            Err(err) => warn!(key = %key, error = %err, "refresh failed"),
        });
        if deferred {
            debug!(key = %shared.read().key, "refresh deferred until commit");
        }
    }
}
