//! Patch scripts
//!
//! A small statement language for patches that need conditions or want to
//! delete the document:
//!
//! ```text
//! // bump the counter and publish drafts
//! inc views
//! if status == "draft" then set status = "published"
//! output done
//! ```
//!
//! | Statement | Effect |
//! |-----------|--------|
//! | `set <path> = <json>` | set/replace a value |
//! | `unset <path>` | remove a value |
//! | `inc <path> [<number>]` | numeric increment (default 1) |
//! | `push <path> <json>` | append to an array |
//! | `copy <from> <to>` / `rename <from> <to>` | copy or move a value |
//! | `if <cond> then <statement>` | `==`, `!=` or `exists` guard |
//! | `output <text>` | append a line to the debug trace |
//! | `delete` | remove the document and stop |
//! | `throw <message>` | fail the patch |

mod interpreter;
mod parser;

pub use interpreter::{Flow, Interpreter, Trace};
pub use parser::{Condition, Line, Program, Statement};

use thiserror::Error;

use crate::ops::PatchError;

/// Errors raised while parsing or running a script
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    /// Statement could not be parsed
    #[error("parse error on line {line}: {message}")]
    Parse {
        /// 1-based line number
        line: usize,
        /// What was wrong
        message: String,
    },

    /// A patch statement failed
    #[error("line {line}: {source}")]
    Op {
        /// 1-based line number
        line: usize,
        /// Underlying failure
        source: PatchError,
    },

    /// `throw` statement
    #[error("{0}")]
    Thrown(String),

    /// Script ran more statements than allowed
    #[error("script exceeded {0} steps")]
    StepLimit(usize),
}
