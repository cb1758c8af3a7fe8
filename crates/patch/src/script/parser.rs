//! Patch script parser
//!
//! Scripts are a list of statements separated by newlines or `;`. Separators
//! inside JSON string literals do not split. A statement starting with `//`
//! is a comment and runs to the end of the line.

use std::fmt;

use serde_json::Number;

use docwrite_core::{get_at_path, JsonPath, JsonValue, PatchOp};

use super::ScriptError;

/// Guard of an `if` statement
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `if <path> == <json>`
    Equals(JsonPath, JsonValue),
    /// `if <path> != <json>`
    NotEquals(JsonPath, JsonValue),
    /// `if exists <path>`
    Exists(JsonPath),
}

impl Condition {
    /// Evaluate against document content
    ///
    /// A missing path compares equal to nothing.
    pub fn holds(&self, doc: &JsonValue) -> bool {
        match self {
            Condition::Equals(path, value) => get_at_path(doc, path) == Some(value),
            Condition::NotEquals(path, value) => get_at_path(doc, path) != Some(value),
            Condition::Exists(path) => get_at_path(doc, path).is_some(),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Equals(path, value) => write!(f, "{} == {}", path, value),
            Condition::NotEquals(path, value) => write!(f, "{} != {}", path, value),
            Condition::Exists(path) => write!(f, "exists {}", path),
        }
    }
}

/// A parsed statement
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `set`, `unset`, `inc`, `push`, `copy`, `rename`
    Op(PatchOp),
    /// `if <condition> then <statement>`
    If {
        /// Guard
        condition: Condition,
        /// Statement run when the guard holds
        then: Box<Statement>,
    },
    /// `output <text>`
    Output(String),
    /// `delete`
    Delete,
    /// `throw <message>`
    Throw(String),
}

/// A statement with its source line
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    /// 1-based line number
    pub number: usize,
    /// Parsed statement
    pub statement: Statement,
}

/// A parsed script
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    /// Statements in execution order
    pub lines: Vec<Line>,
}

impl Program {
    /// Parse script source
    ///
    /// # Errors
    /// [`ScriptError::Parse`] naming the line of the first bad statement.
    pub fn parse(source: &str) -> Result<Self, ScriptError> {
        let lines = split_statements(source)
            .into_iter()
            .map(|(number, text)| {
                parse_statement(&text)
                    .map(|statement| Line { number, statement })
                    .map_err(|message| ScriptError::Parse {
                        line: number,
                        message,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Program { lines })
    }

    /// Number of top-level statements
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Check if the script has no statements
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Split source into `(line, statement text)` pairs
fn split_statements(source: &str) -> Vec<(usize, String)> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut line = 1;
    let mut start_line = 1;
    let mut in_string = false;
    let mut escaped = false;
    let mut chars = source.chars().peekable();

    fn flush(out: &mut Vec<(usize, String)>, current: &mut String, line: usize) {
        let text = current.trim();
        if !text.is_empty() {
            out.push((line, text.to_string()));
        }
        current.clear();
    }

    while let Some(c) = chars.next() {
        if in_string {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            } else if c == '\n' {
                line += 1;
            }
            continue;
        }

        match c {
            '/' if chars.peek() == Some(&'/') && current.trim().is_empty() => {
                while chars.peek().map_or(false, |next| *next != '\n') {
                    chars.next();
                }
                current.clear();
            }
            ';' | '\n' => {
                flush(&mut out, &mut current, start_line);
                if c == '\n' {
                    line += 1;
                }
            }
            _ => {
                if current.trim().is_empty() && !c.is_whitespace() {
                    start_line = line;
                }
                if c == '"' {
                    in_string = true;
                }
                current.push(c);
            }
        }
    }
    flush(&mut out, &mut current, start_line);
    out
}

/// Split off the first whitespace-delimited word
fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim();
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim()),
        None => (s, ""),
    }
}

/// Byte offset of `pattern` in `s`, skipping JSON string literals
fn find_outside_strings(s: &str, pattern: &str) -> Option<usize> {
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
        } else if s[i..].starts_with(pattern) {
            return Some(i);
        }
    }
    None
}

fn parse_path(s: &str) -> Result<JsonPath, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("missing path".to_string());
    }
    s.parse()
        .map_err(|e| format!("invalid path '{}': {}", s, e))
}

fn parse_json(s: &str) -> Result<JsonValue, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("missing value".to_string());
    }
    serde_json::from_str(s).map_err(|e| format!("invalid JSON value '{}': {}", s, e))
}

fn parse_number(s: &str) -> Result<Number, String> {
    match parse_json(s)? {
        JsonValue::Number(n) => Ok(n),
        other => Err(format!("expected a number, found '{}'", other)),
    }
}

/// Free text argument; a JSON string literal is unquoted
fn parse_text(s: &str) -> String {
    match serde_json::from_str::<JsonValue>(s) {
        Ok(JsonValue::String(text)) => text,
        _ => s.to_string(),
    }
}

fn parse_two_paths(keyword: &str, rest: &str) -> Result<(JsonPath, JsonPath), String> {
    let (from, to) = split_word(rest);
    if to.is_empty() || to.contains(char::is_whitespace) {
        return Err(format!("expected `{} <from> <to>`", keyword));
    }
    Ok((parse_path(from)?, parse_path(to)?))
}

fn parse_condition(s: &str) -> Result<Condition, String> {
    let s = s.trim();
    if let Some(path) = s.strip_prefix("exists ") {
        return Ok(Condition::Exists(parse_path(path)?));
    }

    let eq = s.find("==");
    let ne = s.find("!=");
    match (eq, ne) {
        (Some(e), Some(n)) if n < e => Ok(Condition::NotEquals(
            parse_path(&s[..n])?,
            parse_json(&s[n + 2..])?,
        )),
        (Some(e), _) => Ok(Condition::Equals(
            parse_path(&s[..e])?,
            parse_json(&s[e + 2..])?,
        )),
        (None, Some(n)) => Ok(Condition::NotEquals(
            parse_path(&s[..n])?,
            parse_json(&s[n + 2..])?,
        )),
        (None, None) => Err(format!(
            "expected `<path> == <json>`, `<path> != <json>` or `exists <path>`, found '{}'",
            s
        )),
    }
}

/// Parse one statement
pub(crate) fn parse_statement(text: &str) -> Result<Statement, String> {
    let (keyword, rest) = split_word(text);
    let statement = match keyword {
        "set" => {
            let (path, value) = rest
                .split_once('=')
                .ok_or_else(|| "expected `set <path> = <json>`".to_string())?;
            Statement::Op(PatchOp::Set {
                path: parse_path(path)?,
                value: parse_json(value)?,
            })
        }
        "unset" => Statement::Op(PatchOp::Unset {
            path: parse_path(rest)?,
        }),
        "inc" => {
            let (path, by) = split_word(rest);
            let by = if by.is_empty() {
                Number::from(1)
            } else {
                parse_number(by)?
            };
            Statement::Op(PatchOp::Inc {
                path: parse_path(path)?,
                by,
            })
        }
        "push" => {
            let (path, value) = split_word(rest);
            Statement::Op(PatchOp::Add {
                path: parse_path(path)?,
                value: parse_json(value)?,
            })
        }
        "copy" => {
            let (from, to) = parse_two_paths("copy", rest)?;
            Statement::Op(PatchOp::Copy { from, to })
        }
        "rename" => {
            let (from, to) = parse_two_paths("rename", rest)?;
            Statement::Op(PatchOp::Rename { from, to })
        }
        "if" => {
            let at = find_outside_strings(rest, " then ")
                .ok_or_else(|| "expected `if <condition> then <statement>`".to_string())?;
            Statement::If {
                condition: parse_condition(&rest[..at])?,
                then: Box::new(parse_statement(&rest[at + " then ".len()..])?),
            }
        }
        "output" => Statement::Output(parse_text(rest)),
        "delete" => {
            if !rest.is_empty() {
                return Err("`delete` takes no arguments".to_string());
            }
            Statement::Delete
        }
        "throw" => Statement::Throw(parse_text(rest)),
        other => return Err(format!("unknown statement '{}'", other)),
    };
    Ok(statement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(s: &str) -> JsonPath {
        s.parse().unwrap()
    }

    #[test]
    fn test_split_on_newlines_and_semicolons() {
        let parts = split_statements("set a = 1; set b = 2\n\nunset c");
        assert_eq!(
            parts,
            vec![
                (1, "set a = 1".to_string()),
                (1, "set b = 2".to_string()),
                (3, "unset c".to_string()),
            ]
        );
    }

    #[test]
    fn test_split_keeps_separators_inside_strings() {
        let parts = split_statements(r#"set a = "x;y"; output "done""#);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].1, r#"set a = "x;y""#);
    }

    #[test]
    fn test_comments_are_skipped() {
        let parts = split_statements("// header; still comment\nset a = 1 // not a comment");
        assert_eq!(parts, vec![(2, "set a = 1 // not a comment".to_string())]);
    }

    #[test]
    fn test_parse_ops() {
        assert_eq!(
            parse_statement("set user.name = \"Alice\"").unwrap(),
            Statement::Op(PatchOp::set(path("user.name"), json!("Alice")))
        );
        assert_eq!(
            parse_statement("inc views").unwrap(),
            Statement::Op(PatchOp::inc(path("views"), 1))
        );
        assert_eq!(
            parse_statement("inc views -2").unwrap(),
            Statement::Op(PatchOp::inc(path("views"), -2))
        );
        assert_eq!(
            parse_statement("push tags {\"k\": 1}").unwrap(),
            Statement::Op(PatchOp::add(path("tags"), json!({"k": 1})))
        );
        assert_eq!(
            parse_statement("rename a b").unwrap(),
            Statement::Op(PatchOp::Rename {
                from: path("a"),
                to: path("b")
            })
        );
    }

    #[test]
    fn test_parse_if() {
        let stmt = parse_statement("if status == \"a then b\" then set x = 1").unwrap();
        assert_eq!(
            stmt,
            Statement::If {
                condition: Condition::Equals(path("status"), json!("a then b")),
                then: Box::new(Statement::Op(PatchOp::set(path("x"), json!(1)))),
            }
        );

        let stmt = parse_statement("if exists a then if b != 2 then delete").unwrap();
        match stmt {
            Statement::If { condition, then } => {
                assert_eq!(condition, Condition::Exists(path("a")));
                assert!(matches!(*then, Statement::If { .. }));
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_text_arguments() {
        assert_eq!(
            parse_statement("output hello world").unwrap(),
            Statement::Output("hello world".into())
        );
        assert_eq!(
            parse_statement("throw \"bad; input\"").unwrap(),
            Statement::Throw("bad; input".into())
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_statement("frobnicate a").is_err());
        assert!(parse_statement("set a 1").is_err());
        assert!(parse_statement("set a = {").is_err());
        assert!(parse_statement("inc a \"x\"").is_err());
        assert!(parse_statement("copy a").is_err());
        assert!(parse_statement("delete now").is_err());
        assert!(parse_statement("if a then delete").is_err());
    }

    #[test]
    fn test_program_parse_reports_line() {
        let err = Program::parse("set a = 1\nbogus").unwrap_err();
        assert_eq!(
            err,
            ScriptError::Parse {
                line: 2,
                message: "unknown statement 'bogus'".into()
            }
        );
    }

    #[test]
    fn test_condition_holds() {
        let doc = json!({"a": 1});
        assert!(Condition::Equals(path("a"), json!(1)).holds(&doc));
        assert!(!Condition::Equals(path("b"), json!(1)).holds(&doc));
        assert!(Condition::NotEquals(path("b"), json!(1)).holds(&doc));
        assert!(Condition::Exists(path("a")).holds(&doc));
        assert!(!Condition::Exists(path("b")).holds(&doc));
    }
}
