//! JSON paths and path mutation
//!
//! Document content is a [`JsonValue`]. Patches address locations inside it
//! with a [`JsonPath`]:
//!
//! | Syntax | Meaning | Example |
//! |--------|---------|---------|
//! | `key` | Object property | `user` |
//! | `[n]` | Array index | `[0]` |
//! | `key1.key2` | Nested property | `user.name` |
//! | `key[n]` | Property then index | `items[0]` |
//! | (empty) | Root | `` |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// JSON value used for document content and metadata
pub type JsonValue = serde_json::Value;

/// Maximum path length in segments
pub const MAX_PATH_LENGTH: usize = 256;

// =============================================================================
// JsonPath and PathSegment
// =============================================================================

/// Error type for JSON path parsing
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathParseError {
    /// Empty key in path
    #[error("empty key in path at position {0}")]
    EmptyKey(usize),
    /// Unclosed bracket
    #[error("unclosed bracket starting at position {0}")]
    UnclosedBracket(usize),
    /// Invalid array index
    #[error("invalid array index at position {0}: {1}")]
    InvalidIndex(usize, String),
    /// Unexpected character
    #[error("unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),
    /// Path has too many segments
    #[error("path has {0} segments, maximum is {MAX_PATH_LENGTH}")]
    TooLong(usize),
}

/// A segment in a JSON path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Object key: `.foo`
    Key(String),
    /// Array index: `[0]`
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => write!(f, ".{}", k),
            PathSegment::Index(i) => write!(f, "[{}]", i),
        }
    }
}

/// A path into a JSON document
///
/// Serialized as its string form, so patch operations read naturally in JSON:
/// `{"type": "Set", "path": "user.name", "value": "Alice"}`.
///
/// # Examples
///
/// ```
/// use docwrite_core::json::JsonPath;
///
/// let user_name = JsonPath::root().key("user").key("name");
/// let parsed: JsonPath = "user.name".parse().unwrap();
/// assert_eq!(parsed, user_name);
///
/// let first_item: JsonPath = "items[0]".parse().unwrap();
/// assert_eq!(first_item.to_string(), "items[0]");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JsonPath {
    segments: Vec<PathSegment>,
}

impl JsonPath {
    /// Create the root path (empty path)
    pub fn root() -> Self {
        JsonPath {
            segments: Vec::new(),
        }
    }

    /// Get the path segments
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Check if this is the root path (empty)
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Append a key segment (builder pattern)
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.segments.push(PathSegment::Key(key.into()));
        self
    }

    /// Append an index segment (builder pattern)
    pub fn index(mut self, idx: usize) -> Self {
        self.segments.push(PathSegment::Index(idx));
        self
    }

    /// Get the parent path (None if root)
    pub fn parent(&self) -> Option<JsonPath> {
        if self.segments.is_empty() {
            None
        } else {
            let mut parent = self.clone();
            parent.segments.pop();
            Some(parent)
        }
    }

    /// Get the last segment (None if root)
    pub fn last_segment(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    /// Convert to a string representation
    pub fn to_path_string(&self) -> String {
        let mut result = String::new();
        for seg in &self.segments {
            match seg {
                PathSegment::Key(k) => {
                    if !result.is_empty() {
                        result.push('.');
                    }
                    result.push_str(k);
                }
                PathSegment::Index(i) => {
                    result.push('[');
                    result.push_str(&i.to_string());
                    result.push(']');
                }
            }
        }
        result
    }
}

fn is_key_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '$' | '@')
}

impl FromStr for JsonPath {
    type Err = PathParseError;

    /// Parse a path from a string
    ///
    /// Supported syntax:
    /// - `foo` or `.foo` - object key
    /// - `[0]` - array index
    /// - `foo.bar` - nested keys
    /// - `foo[0].bar` - mixed
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(JsonPath::root());
        }

        let mut segments = Vec::new();
        let chars: Vec<char> = s.chars().collect();
        let mut i = 0;

        // Skip leading dot if present
        if chars[0] == '.' {
            i += 1;
        }

        while i < chars.len() {
            if chars[i] == '.' {
                i += 1;
                if i >= chars.len() || chars[i] == '.' || chars[i] == '[' {
                    return Err(PathParseError::EmptyKey(i));
                }
            }

            if chars[i] == '[' {
                let start = i;
                i += 1;
                let idx_start = i;

                while i < chars.len() && chars[i] != ']' {
                    i += 1;
                }

                if i >= chars.len() {
                    return Err(PathParseError::UnclosedBracket(start));
                }

                let idx_str: String = chars[idx_start..i].iter().collect();
                let idx = idx_str
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| PathParseError::InvalidIndex(idx_start, idx_str.clone()))?;

                segments.push(PathSegment::Index(idx));
                i += 1;
            } else if is_key_char(chars[i]) {
                let key_start = i;
                while i < chars.len() && is_key_char(chars[i]) {
                    i += 1;
                }
                let key: String = chars[key_start..i].iter().collect();
                segments.push(PathSegment::Key(key));
            } else {
                return Err(PathParseError::UnexpectedChar(chars[i], i));
            }
        }

        if segments.len() > MAX_PATH_LENGTH {
            return Err(PathParseError::TooLong(segments.len()));
        }

        Ok(JsonPath { segments })
    }
}

impl TryFrom<String> for JsonPath {
    type Error = PathParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<JsonPath> for String {
    fn from(path: JsonPath) -> Self {
        path.to_path_string()
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_path_string())
    }
}

// =============================================================================
// Path Operations
// =============================================================================

/// Error type for path operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JsonPathError {
    /// Type mismatch during path traversal
    #[error("type mismatch at '{path}': expected {expected}, found {found}")]
    TypeMismatch {
        /// Path where the mismatch occurred
        path: String,
        /// Expected type
        expected: &'static str,
        /// Actual type found
        found: &'static str,
    },

    /// Array index out of bounds
    #[error("index out of bounds at '{path}': {index} > {len}")]
    IndexOutOfBounds {
        /// Path of the array
        path: String,
        /// The requested index
        index: usize,
        /// The array length
        len: usize,
    },

    /// Path not found
    #[error("path not found: '{0}'")]
    NotFound(String),
}

/// Name of a JSON value's type, for error messages
pub fn value_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// Get value at path within a JSON document
///
/// Returns `None` if the path doesn't exist or crosses a value of the wrong type.
///
/// ```
/// use docwrite_core::json::{get_at_path, JsonPath};
/// use serde_json::json;
///
/// let doc = json!({"user": {"scores": [100, 95]}});
/// let path: JsonPath = "user.scores[1]".parse().unwrap();
/// assert_eq!(get_at_path(&doc, &path), Some(&json!(95)));
/// ```
pub fn get_at_path<'a>(value: &'a JsonValue, path: &JsonPath) -> Option<&'a JsonValue> {
    let mut current = value;
    for segment in path.segments() {
        current = match (segment, current) {
            (PathSegment::Key(key), JsonValue::Object(obj)) => obj.get(key)?,
            (PathSegment::Index(idx), JsonValue::Array(arr)) => arr.get(*idx)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Get mutable reference to value at path within a JSON document
pub fn get_at_path_mut<'a>(value: &'a mut JsonValue, path: &JsonPath) -> Option<&'a mut JsonValue> {
    let mut current = value;
    for segment in path.segments() {
        current = match (segment, current) {
            (PathSegment::Key(key), JsonValue::Object(obj)) => obj.get_mut(key)?,
            (PathSegment::Index(idx), JsonValue::Array(arr)) => arr.get_mut(*idx)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Set value at path within a JSON document
///
/// Creates intermediate objects and arrays as needed. The type of an
/// intermediate container is chosen by the segment that follows it. Setting
/// an array index equal to the array length appends.
///
/// ```
/// use docwrite_core::json::{set_at_path, JsonPath};
/// use serde_json::json;
///
/// let mut doc = json!({});
/// set_at_path(&mut doc, &"user.profile.name".parse().unwrap(), json!("Alice")).unwrap();
/// assert_eq!(doc, json!({"user": {"profile": {"name": "Alice"}}}));
/// ```
pub fn set_at_path(
    root: &mut JsonValue,
    path: &JsonPath,
    value: JsonValue,
) -> Result<(), JsonPathError> {
    let segments = path.segments();
    if segments.is_empty() {
        *root = value;
        return Ok(());
    }

    let mut current = root;
    let mut walked = JsonPath::root();

    for (i, segment) in segments.iter().enumerate() {
        let is_last = i + 1 == segments.len();
        current = match segment {
            PathSegment::Key(key) => {
                let obj = match current {
                    JsonValue::Object(obj) => obj,
                    other => {
                        return Err(JsonPathError::TypeMismatch {
                            path: walked.to_path_string(),
                            expected: "object",
                            found: value_type_name(other),
                        })
                    }
                };
                if is_last {
                    obj.insert(key.clone(), value);
                    return Ok(());
                }
                obj.entry(key.clone()).or_insert_with(|| match segments[i + 1] {
                    PathSegment::Key(_) => JsonValue::Object(serde_json::Map::new()),
                    PathSegment::Index(_) => JsonValue::Array(Vec::new()),
                })
            }
            PathSegment::Index(idx) => {
                let arr = match current {
                    JsonValue::Array(arr) => arr,
                    other => {
                        return Err(JsonPathError::TypeMismatch {
                            path: walked.to_path_string(),
                            expected: "array",
                            found: value_type_name(other),
                        })
                    }
                };
                let len = arr.len();
                if is_last {
                    if *idx < len {
                        arr[*idx] = value;
                    } else if *idx == len {
                        arr.push(value);
                    } else {
                        return Err(JsonPathError::IndexOutOfBounds {
                            path: walked.to_path_string(),
                            index: *idx,
                            len,
                        });
                    }
                    return Ok(());
                }
                match arr.get_mut(*idx) {
                    Some(next) => next,
                    None => {
                        return Err(JsonPathError::IndexOutOfBounds {
                            path: walked.to_path_string(),
                            index: *idx,
                            len,
                        })
                    }
                }
            }
        };
        walked.segments.push(segment.clone());
    }

    Ok(())
}

/// Delete value at path within a JSON document
///
/// Removes an object key, or removes an array element and shifts subsequent
/// elements. Deleting the root replaces the value with null.
///
/// Returns the removed value, or `None` if the path didn't exist.
pub fn delete_at_path(
    root: &mut JsonValue,
    path: &JsonPath,
) -> Result<Option<JsonValue>, JsonPathError> {
    let (parent_path, last) = match (path.parent(), path.last_segment()) {
        (Some(parent), Some(last)) => (parent, last),
        _ => return Ok(Some(std::mem::take(root))),
    };

    let parent = match get_at_path_mut(root, &parent_path) {
        Some(parent) => parent,
        None => return Ok(None),
    };

    match (last, parent) {
        (PathSegment::Key(key), JsonValue::Object(obj)) => Ok(obj.remove(key)),
        (PathSegment::Index(idx), JsonValue::Array(arr)) => {
            if *idx < arr.len() {
                Ok(Some(arr.remove(*idx)))
            } else {
                Ok(None)
            }
        }
        (PathSegment::Key(_), other) => Err(JsonPathError::TypeMismatch {
            path: parent_path.to_path_string(),
            expected: "object",
            found: value_type_name(other),
        }),
        (PathSegment::Index(_), other) => Err(JsonPathError::TypeMismatch {
            path: parent_path.to_path_string(),
            expected: "array",
            found: value_type_name(other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn path(s: &str) -> JsonPath {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_simple_key() {
        assert_eq!(path("foo"), JsonPath::root().key("foo"));
        assert_eq!(path(".foo"), JsonPath::root().key("foo"));
    }

    #[test]
    fn test_parse_mixed() {
        assert_eq!(
            path("items[0].name"),
            JsonPath::root().key("items").index(0).key("name")
        );
        assert_eq!(path("[2]"), JsonPath::root().index(2));
    }

    #[test]
    fn test_parse_empty_is_root() {
        assert!(path("").is_empty());
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            "a..b".parse::<JsonPath>(),
            Err(PathParseError::EmptyKey(_))
        ));
        assert!(matches!(
            "a[1".parse::<JsonPath>(),
            Err(PathParseError::UnclosedBracket(_))
        ));
        assert!(matches!(
            "a[x]".parse::<JsonPath>(),
            Err(PathParseError::InvalidIndex(_, _))
        ));
        assert!(matches!(
            "a b".parse::<JsonPath>(),
            Err(PathParseError::UnexpectedChar(' ', _))
        ));
    }

    #[test]
    fn test_path_serde_as_string() {
        let p = path("user.tags[1]");
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "\"user.tags[1]\"");
        let back: JsonPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
        assert!(serde_json::from_str::<JsonPath>("\"a[\"").is_err());
    }

    #[test]
    fn test_get_at_path() {
        let doc = json!({"user": {"name": "Alice", "tags": ["a", "b"]}});
        assert_eq!(get_at_path(&doc, &path("user.name")), Some(&json!("Alice")));
        assert_eq!(get_at_path(&doc, &path("user.tags[1]")), Some(&json!("b")));
        assert_eq!(get_at_path(&doc, &path("user.missing")), None);
        assert_eq!(get_at_path(&doc, &path("user.name.first")), None);
        assert_eq!(get_at_path(&doc, &JsonPath::root()), Some(&doc));
    }

    #[test]
    fn test_set_creates_intermediates() {
        let mut doc = json!({});
        set_at_path(&mut doc, &path("a.b[0]"), json!(1)).unwrap();
        assert_eq!(doc, json!({"a": {"b": [1]}}));
    }

    #[test]
    fn test_set_replaces_and_appends() {
        let mut doc = json!({"list": [1, 2]});
        set_at_path(&mut doc, &path("list[0]"), json!(9)).unwrap();
        set_at_path(&mut doc, &path("list[2]"), json!(3)).unwrap();
        assert_eq!(doc, json!({"list": [9, 2, 3]}));

        let err = set_at_path(&mut doc, &path("list[9]"), json!(0)).unwrap_err();
        assert!(matches!(err, JsonPathError::IndexOutOfBounds { index: 9, len: 3, .. }));
    }

    #[test]
    fn test_set_type_mismatch() {
        let mut doc = json!({"name": "Alice"});
        let err = set_at_path(&mut doc, &path("name.first"), json!("A")).unwrap_err();
        assert_eq!(
            err,
            JsonPathError::TypeMismatch {
                path: "name".into(),
                expected: "object",
                found: "string",
            }
        );
    }

    #[test]
    fn test_set_root_replaces_document() {
        let mut doc = json!({"a": 1});
        set_at_path(&mut doc, &JsonPath::root(), json!({"b": 2})).unwrap();
        assert_eq!(doc, json!({"b": 2}));
    }

    #[test]
    fn test_delete_at_path() {
        let mut doc = json!({"a": 1, "list": [1, 2, 3]});
        assert_eq!(delete_at_path(&mut doc, &path("a")).unwrap(), Some(json!(1)));
        assert_eq!(delete_at_path(&mut doc, &path("list[1]")).unwrap(), Some(json!(2)));
        assert_eq!(doc, json!({"list": [1, 3]}));
        assert_eq!(delete_at_path(&mut doc, &path("missing.deep")).unwrap(), None);
        assert_eq!(delete_at_path(&mut doc, &path("list[10]")).unwrap(), None);
    }

    #[test]
    fn test_delete_type_mismatch() {
        let mut doc = json!({"a": 1});
        assert!(delete_at_path(&mut doc, &path("a[0]")).is_err());
    }

    fn segment_strategy() -> impl Strategy<Value = PathSegment> {
        prop_oneof![
            "[a-z_][a-z0-9_]{0,8}".prop_map(PathSegment::Key),
            (0usize..50).prop_map(PathSegment::Index),
        ]
    }

    proptest! {
        #[test]
        fn path_string_round_trips(segments in prop::collection::vec(segment_strategy(), 0..8)) {
            let original = segments.into_iter().fold(JsonPath::root(), |path, seg| match seg {
                PathSegment::Key(key) => path.key(key),
                PathSegment::Index(idx) => path.index(idx),
            });
            let parsed: JsonPath = original.to_path_string().parse().unwrap();
            prop_assert_eq!(parsed, original);
        }
    }
}
