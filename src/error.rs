//! Error taxonomy for annotation evaluation and file processing.

use std::fmt;

use thiserror::Error;

/// What went wrong while evaluating one annotation expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    /// A `\name` token named no known command.
    #[error("unknown command \\{0}")]
    UnknownCommand(String),
    /// The token stream ran out before a command could gather its arguments.
    #[error("not enough tokens to finish the expression")]
    StarvedExpression,
    /// An argument that must be numeric was not.
    #[error("expected a number, got {0:?}")]
    NumericConversion(String),
    /// `\regex` needed the line below the current one, or its pattern was
    /// invalid.
    #[error("missing line below, or invalid regex")]
    MissingContextLine,
    /// A variable name contained `=`, whitespace, or named no existing key.
    #[error("{0:?} is not a usable variable name")]
    InvalidVariableName(String),
    /// An `\end` unwound all the way out without an enclosing `\if` or `\r`.
    #[error("\\end outside any open branch")]
    UnmatchedBranchBoundary,
}

/// An evaluation failure, optionally located at a document line.
///
/// Errors raised inside the evaluator carry only the [`ErrorKind`]; the
/// document driver attaches the offending line index and raw expression via
/// [`EvalError::at`] before logging or propagating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalError {
    pub kind: ErrorKind,
    /// Zero-based index of the offending line, when known.
    pub line: Option<usize>,
    /// Raw expression text of the offending line, when known.
    pub expr: Option<String>,
}

impl EvalError {
    /// Attach document-level context to an evaluator error.
    pub fn at(mut self, line: usize, expr: &str) -> Self {
        self.line = Some(line);
        self.expr = Some(expr.to_owned());
        self
    }
}

impl From<ErrorKind> for EvalError {
    fn from(kind: ErrorKind) -> Self {
        EvalError {
            kind,
            line: None,
            expr: None,
        }
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(line) = self.line {
            write!(f, " (line {line}")?;
            if let Some(expr) = &self.expr {
                write!(f, ": {expr:?}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl std::error::Error for EvalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

/// Failure surface of [`process_file`](crate::driver::process_file): either a
/// fatal evaluation defect or a path I/O failure, propagated unmodified.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
