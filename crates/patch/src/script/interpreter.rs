//! Patch script interpreter

use docwrite_core::JsonValue;

use super::parser::{Program, Statement};
use super::ScriptError;
use crate::ops::apply_op;

/// How a script finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Ran to the end
    Completed,
    /// Hit a `delete` statement
    Deleted,
}

/// Execution trace, collected only in debug mode
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trace {
    entries: Option<Vec<String>>,
}

impl Trace {
    /// A trace that records entries
    pub fn enabled() -> Self {
        Trace {
            entries: Some(Vec::new()),
        }
    }

    /// A trace that records nothing
    pub fn disabled() -> Self {
        Trace { entries: None }
    }

    /// Create a trace, enabled when `debug` is set
    pub fn new(debug: bool) -> Self {
        if debug {
            Self::enabled()
        } else {
            Self::disabled()
        }
    }

    /// Check if entries are being recorded
    pub fn is_enabled(&self) -> bool {
        self.entries.is_some()
    }

    /// Append an entry (the closure only runs when enabled)
    pub fn record(&mut self, entry: impl FnOnce() -> String) {
        if let Some(entries) = self.entries.as_mut() {
            entries.push(entry());
        }
    }

    /// Recorded entries so far
    pub fn entries(&self) -> &[String] {
        self.entries.as_deref().unwrap_or(&[])
    }

    /// Consume the trace (None when disabled)
    pub fn into_log(self) -> Option<Vec<String>> {
        self.entries
    }
}

/// Runs a parsed program against document content
#[derive(Debug, Clone, Copy)]
pub struct Interpreter {
    max_steps: usize,
}

impl Interpreter {
    /// Create an interpreter bounded to `max_steps` executed statements
    pub fn new(max_steps: usize) -> Self {
        Interpreter { max_steps }
    }

    /// Execute `program`, mutating `doc` in place
    pub fn run(
        &self,
        program: &Program,
        doc: &mut JsonValue,
        trace: &mut Trace,
    ) -> Result<Flow, ScriptError> {
        let mut steps = 0;
        for line in &program.lines {
            if self.exec(&line.statement, line.number, doc, trace, &mut steps)? == Flow::Deleted {
                return Ok(Flow::Deleted);
            }
        }
        Ok(Flow::Completed)
    }

    fn exec(
        &self,
        statement: &Statement,
        line: usize,
        doc: &mut JsonValue,
        trace: &mut Trace,
        steps: &mut usize,
    ) -> Result<Flow, ScriptError> {
        *steps += 1;
        if *steps > self.max_steps {
            trace.record(|| format!("line {}: step limit {} reached", line, self.max_steps));
            return Err(ScriptError::StepLimit(self.max_steps));
        }

        match statement {
            Statement::Op(op) => {
                trace.record(|| format!("line {}: {}", line, op));
                apply_op(doc, op).map_err(|source| ScriptError::Op { line, source })?;
            }
            Statement::If { condition, then } => {
                let holds = condition.holds(doc);
                trace.record(|| format!("line {}: if {} -> {}", line, condition, holds));
                if holds {
                    return self.exec(then, line, doc, trace, steps);
                }
            }
            Statement::Output(text) => {
                trace.record(|| text.clone());
            }
            Statement::Delete => {
                trace.record(|| format!("line {}: delete", line));
                return Ok(Flow::Deleted);
            }
            Statement::Throw(message) => {
                trace.record(|| format!("line {}: throw {}", line, message));
                return Err(ScriptError::Thrown(message.clone()));
            }
        }
        Ok(Flow::Completed)
    }
}
