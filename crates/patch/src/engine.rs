//! JsonPatchEngine: the reference patch engine
//!
//! Both patch kinds follow the same read-modify-write cycle:
//!
//! 1. Read the document and check the caller's expected version
//! 2. Pick the patch for the present or missing case
//! 3. Apply it to a copy of the content
//! 4. Write back with the version read in step 1 as the expected version, so
//!    a concurrent writer between read and write surfaces as a conflict
//!
//! When the caller gave no expected version, a conflict from step 4 is the
//! engine's own guard tripping, not the caller's: the whole cycle is rerun
//! up to [`MAX_WRITE_ATTEMPTS`] times. With an expected version the conflict
//! is returned as is.
//!
//! A patch that changes neither content nor metadata writes nothing and
//! reports [`PatchOutcome::AlreadyPatched`].

use serde::{Deserialize, Serialize};
use tracing::debug;

use docwrite_core::{
    verify_expected_version, Document, DocumentStore, Error, JsonValue, Metadata, PatchEngine,
    PatchOutcome, PatchRequest, PatchResult, Result, ScriptRequest, Version,
};

use crate::ops::apply_ops;
use crate::script::{Flow, Interpreter, Program, ScriptError, Trace};

/// Read-modify-write attempts for a patch without an expected version
pub const MAX_WRITE_ATTEMPTS: usize = 8;

fn default_max_steps() -> usize {
    10_000
}

/// Script limits (the `[scripts]` table of `docwrite.toml`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptConfig {
    /// Maximum statements executed per script run
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        ScriptConfig {
            max_steps: default_max_steps(),
        }
    }
}

/// Patch engine for JSON documents
#[derive(Debug, Clone, Default)]
pub struct JsonPatchEngine {
    scripts: ScriptConfig,
}

/// Document state going into a patch
struct Target {
    /// Stored document, if any
    existing: Option<Document>,
    /// Content the patch runs against
    content: JsonValue,
}

impl JsonPatchEngine {
    /// Create an engine with default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with the given script limits
    pub fn with_config(scripts: ScriptConfig) -> Self {
        JsonPatchEngine { scripts }
    }

    /// Script limits in effect
    pub fn config(&self) -> &ScriptConfig {
        &self.scripts
    }

    /// Read the target and enforce the caller's expected version
    fn load(
        store: &dyn DocumentStore,
        key: &str,
        expected_version: Option<Version>,
    ) -> Result<Target> {
        let existing = store.get(key)?;
        let actual = existing
            .as_ref()
            .map(|doc| doc.version)
            .unwrap_or(Version::ZERO);
        verify_expected_version(key, expected_version, actual)?;

        let content = existing
            .as_ref()
            .map(|doc| doc.content.clone())
            .unwrap_or_else(|| JsonValue::Object(serde_json::Map::new()));
        Ok(Target { existing, content })
    }

    /// Write patched content back, or report it unchanged
    fn store_result(
        store: &dyn DocumentStore,
        key: &str,
        target: Target,
        patched: JsonValue,
        metadata: &Metadata,
    ) -> Result<PatchResult> {
        let (base_version, mut merged) = match &target.existing {
            Some(doc) => (doc.version, doc.metadata.clone()),
            None => (Version::ZERO, Metadata::new()),
        };
        merged.extend(metadata.iter().map(|(k, v)| (k.clone(), v.clone())));

        if let Some(doc) = target.existing {
            if doc.content == patched && doc.metadata == merged {
                debug!(key, version = %doc.version, "patch produced no change");
                return Ok(PatchResult {
                    outcome: PatchOutcome::AlreadyPatched,
                    version: Some(doc.version),
                    document: Some(doc),
                    debug_log: None,
                });
            }
        }

        let out = store.put(key, Some(base_version), patched.clone(), merged.clone())?;
        debug!(key, version = %out.version, "patched");
        Ok(PatchResult {
            outcome: PatchOutcome::Patched,
            version: Some(out.version),
            document: Some(Document::new(out.key, out.version, patched, merged)),
            debug_log: None,
        })
    }

    fn script_error(key: &str, err: ScriptError, trace: Trace) -> Error {
        debug!(key, error = %err, "script failed");
        Error::ScriptExecution {
            key: key.to_string(),
            message: err.to_string(),
            debug_log: trace.into_log().unwrap_or_default(),
        }
    }

    fn apply_once(
        &self,
        store: &dyn DocumentStore,
        request: PatchRequest<'_>,
    ) -> Result<PatchResult> {
        let key = request.key;
        let target = Self::load(store, key, request.expected_version)?;

        let ops = if target.existing.is_some() {
            request.patches
        } else if request.patches_if_missing.is_empty() {
            debug!(key, "patch target missing");
            return Ok(PatchResult::missing());
        } else {
            request.patches_if_missing
        };

        let mut patched = target.content.clone();
        apply_ops(&mut patched, ops).map_err(|e| Error::patch_failed(key, e.to_string()))?;

        Self::store_result(store, key, target, patched, request.metadata)
    }

    fn apply_script_once(
        &self,
        store: &dyn DocumentStore,
        request: ScriptRequest<'_>,
    ) -> Result<PatchResult> {
        let key = request.key;
        let mut trace = Trace::new(request.debug_mode);
        let target = Self::load(store, key, request.expected_version)?;

        let source = match (&target.existing, request.script_if_missing) {
            (Some(_), _) => request.script,
            (None, Some(script)) => script,
            (None, None) => {
                debug!(key, "script target missing");
                trace.record(|| format!("document '{}' does not exist, script not run", key));
                return Ok(PatchResult {
                    debug_log: trace.into_log(),
                    ..PatchResult::missing()
                });
            }
        };

        let program = match Program::parse(source) {
            Ok(program) => program,
            Err(err) => return Err(Self::script_error(key, err, trace)),
        };
        if target.existing.is_none() {
            trace.record(|| format!("document '{}' does not exist, running fallback", key));
        }

        let mut patched = target.content.clone();
        let interpreter = Interpreter::new(self.scripts.max_steps);
        let flow = match interpreter.run(&program, &mut patched, &mut trace) {
            Ok(flow) => flow,
            Err(err) => return Err(Self::script_error(key, err, trace)),
        };

        let mut result = match flow {
            Flow::Deleted => match target.existing {
                Some(doc) => {
                    store.delete(key, Some(doc.version))?;
                    debug!(key, "script deleted document");
                    PatchResult {
                        outcome: PatchOutcome::DocumentDeleted,
                        version: None,
                        document: None,
                        debug_log: None,
                    }
                }
                None => PatchResult::missing(),
            },
            Flow::Completed => Self::store_result(store, key, target, patched, request.metadata)?,
        };
        result.debug_log = trace.into_log();
        Ok(result)
    }
}

/// Rerun `attempt` while it fails on the engine's own write-back guard
fn retry_unguarded<F>(
    key: &str,
    expected_version: Option<Version>,
    mut attempt: F,
) -> Result<PatchResult>
where
    F: FnMut() -> Result<PatchResult>,
{
    let mut attempts = 1;
    loop {
        match attempt() {
            Err(err)
                if expected_version.is_none()
                    && err.is_conflict()
                    && attempts < MAX_WRITE_ATTEMPTS =>
            {
                debug!(key, attempts, "document changed during patch, retrying");
                attempts += 1;
            }
            other => return other,
        }
    }
}

impl PatchEngine for JsonPatchEngine {
    fn apply(&self, store: &dyn DocumentStore, request: PatchRequest<'_>) -> Result<PatchResult> {
        retry_unguarded(request.key, request.expected_version, || {
            self.apply_once(store, request)
        })
    }

    fn apply_script(
        &self,
        store: &dyn DocumentStore,
        request: ScriptRequest<'_>,
    ) -> Result<PatchResult> {
        retry_unguarded(request.key, request.expected_version, || {
            self.apply_script_once(store, request)
        })
    }
}
