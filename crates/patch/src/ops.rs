//! Declarative patch operations
//!
//! Applies [`PatchOp`] lists to document content in order. Operations stop at
//! the first failure; callers work on a copy of the content, so a failed
//! patch leaves the stored document untouched.

use serde_json::Number;
use thiserror::Error;

use docwrite_core::json::value_type_name;
use docwrite_core::{
    delete_at_path, get_at_path, get_at_path_mut, set_at_path, JsonPath, JsonPathError,
    JsonValue, PatchOp,
};

/// Why a patch operation could not be applied
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PatchError {
    /// Path traversal failed
    #[error(transparent)]
    Path(#[from] JsonPathError),

    /// The value at a path has the wrong type for the operation
    #[error("{op} at '{path}' needs {expected}, found {found}")]
    TypeMismatch {
        /// Operation name
        op: &'static str,
        /// Target path
        path: String,
        /// Expected type
        expected: &'static str,
        /// Actual type found
        found: &'static str,
    },

    /// Source of a copy or rename does not exist
    #[error("{op} source '{path}' does not exist")]
    MissingSource {
        /// Operation name
        op: &'static str,
        /// Source path
        path: String,
    },

    /// Array position outside the array
    #[error("{op} at '{path}': position {position} outside array of length {len}")]
    PositionOutOfBounds {
        /// Operation name
        op: &'static str,
        /// Target path
        path: String,
        /// Requested position
        position: usize,
        /// Array length
        len: usize,
    },

    /// Numeric result not representable
    #[error("Inc at '{0}' overflowed")]
    Overflow(String),
}

fn mismatch(
    op: &'static str,
    path: &JsonPath,
    expected: &'static str,
    found: &JsonValue,
) -> PatchError {
    PatchError::TypeMismatch {
        op,
        path: path.to_string(),
        expected,
        found: value_type_name(found),
    }
}

/// Apply `ops` to `doc` in order
pub fn apply_ops(doc: &mut JsonValue, ops: &[PatchOp]) -> Result<(), PatchError> {
    ops.iter().try_for_each(|op| apply_op(doc, op))
}

/// Apply a single operation
pub fn apply_op(doc: &mut JsonValue, op: &PatchOp) -> Result<(), PatchError> {
    match op {
        PatchOp::Set { path, value } => {
            set_at_path(doc, path, value.clone())?;
        }
        PatchOp::Unset { path } => {
            delete_at_path(doc, path)?;
        }
        PatchOp::Inc { path, by } => {
            // null counts as a missing field
            let current = match get_at_path(doc, path) {
                None | Some(JsonValue::Null) => Number::from(0),
                Some(JsonValue::Number(n)) => n.clone(),
                Some(other) => return Err(mismatch("Inc", path, "number", other)),
            };
            let sum = add_numbers(&current, by)
                .ok_or_else(|| PatchError::Overflow(path.to_string()))?;
            set_at_path(doc, path, JsonValue::Number(sum))?;
        }
        PatchOp::Add { path, value } => match get_at_path_mut(doc, path) {
            Some(JsonValue::Array(arr)) => arr.push(value.clone()),
            Some(other) => return Err(mismatch("Add", path, "array", other)),
            None => set_at_path(doc, path, JsonValue::Array(vec![value.clone()]))?,
        },
        PatchOp::Insert {
            path,
            position,
            value,
        } => {
            if get_at_path(doc, path).is_none() {
                set_at_path(doc, path, JsonValue::Array(Vec::new()))?;
            }
            match get_at_path_mut(doc, path) {
                Some(JsonValue::Array(arr)) => {
                    if *position > arr.len() {
                        return Err(PatchError::PositionOutOfBounds {
                            op: "Insert",
                            path: path.to_string(),
                            position: *position,
                            len: arr.len(),
                        });
                    }
                    arr.insert(*position, value.clone());
                }
                Some(other) => return Err(mismatch("Insert", path, "array", other)),
                None => return Err(JsonPathError::NotFound(path.to_string()).into()),
            }
        }
        PatchOp::Remove {
            path,
            position,
            value,
        } => match get_at_path_mut(doc, path) {
            Some(JsonValue::Array(arr)) => {
                if let Some(position) = position {
                    if *position >= arr.len() {
                        return Err(PatchError::PositionOutOfBounds {
                            op: "Remove",
                            path: path.to_string(),
                            position: *position,
                            len: arr.len(),
                        });
                    }
                    arr.remove(*position);
                } else if let Some(value) = value {
                    arr.retain(|item| item != value);
                }
            }
            Some(other) => return Err(mismatch("Remove", path, "array", other)),
            None => {}
        },
        PatchOp::Copy { from, to } => {
            let value = get_at_path(doc, from)
                .cloned()
                .ok_or_else(|| PatchError::MissingSource {
                    op: "Copy",
                    path: from.to_string(),
                })?;
            set_at_path(doc, to, value)?;
        }
        PatchOp::Rename { from, to } => {
            let value = delete_at_path(doc, from)?.ok_or_else(|| PatchError::MissingSource {
                op: "Rename",
                path: from.to_string(),
            })?;
            set_at_path(doc, to, value)?;
        }
        PatchOp::Modify { path, nested } => {
            if get_at_path(doc, path).is_none() {
                set_at_path(doc, path, JsonValue::Object(serde_json::Map::new()))?;
            }
            match get_at_path_mut(doc, path) {
                Some(target) if target.is_object() => apply_ops(target, nested)?,
                Some(other) => return Err(mismatch("Modify", path, "object", other)),
                None => return Err(JsonPathError::NotFound(path.to_string()).into()),
            }
        }
    }
    Ok(())
}

/// Add two JSON numbers, staying integral when both are integers
fn add_numbers(a: &Number, b: &Number) -> Option<Number> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if let Some(sum) = x.checked_add(y) {
            return Some(Number::from(sum));
        }
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        if let Some(sum) = x.checked_add(y) {
            return Some(Number::from(sum));
        }
    }
    let sum = a.as_f64()? + b.as_f64()?;
    Number::from_f64(sum)
}
