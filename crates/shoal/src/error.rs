//! Error types for shoal
//!
//! Errors are split along the phases that raise them:
//! - [`LexError`] and [`ParseError`] abort before anything runs
//! - [`ExpansionError`], [`TestError`] and [`ExecutionError`] abort the
//!   statement sequence being executed
//!
//! A command that runs and fails is not an error: it completes with a
//! nonzero [`ExitStatus`](crate::ExitStatus).

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::limits::LimitExceeded;
use crate::parser::Position;

/// Result type alias using shoal's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid character or unterminated construct in the source text.
    #[error(transparent)]
    Lex(#[from] LexError),

    /// Token stream does not form a valid script.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Word, parameter or arithmetic expansion failed.
    #[error(transparent)]
    Expansion(#[from] ExpansionError),

    /// A `[[ ]]` predicate could not be evaluated.
    #[error(transparent)]
    Test(#[from] TestError),

    /// Redirection or pipeline setup failed.
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// Resource limit exceeded.
    #[error("resource limit exceeded: {0}")]
    ResourceLimit(#[from] LimitExceeded),

    /// I/O error while a builtin was reading or writing its streams.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Process exit code a host should use after this error ends a run.
    ///
    /// Syntax errors exit with 2, everything else with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Lex(_) | Error::Parse(_) => 2,
            _ => 1,
        }
    }
}

/// Lexical errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexError {
    #[error("syntax error at {position}: unexpected character {ch:?}")]
    UnexpectedChar { ch: char, position: Position },

    #[error("syntax error at {position}: unterminated {construct}")]
    Unterminated {
        construct: &'static str,
        position: Position,
    },
}

/// Parse error with source location.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("syntax error at {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: Position,
}

impl ParseError {
    pub fn at(message: impl Into<String>, position: Position) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

/// Errors raised while expanding words and evaluating arithmetic.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpansionError {
    /// `${name:?message}` on an unset variable.
    #[error("{name}: {message}")]
    Unset { name: String, message: String },

    #[error("invalid number: {0}")]
    BadNumber(String),

    #[error("arithmetic syntax error: {0}")]
    ArithmeticSyntax(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("exponent less than 0")]
    NegativeExponent,

    /// A word had to yield exactly one field.
    #[error("{word}: ambiguous redirect ({count} fields)")]
    FieldCount { word: String, count: usize },

    #[error("{0}: cannot assign")]
    ReadOnly(String),

    #[error("expression recursion level exceeded: {0}")]
    TooDeep(String),
}

/// Errors raised by `[[ ]]` predicates.
#[derive(Error, Debug)]
pub enum TestError {
    #[error("{path}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid regular expression {pattern:?}: {message}")]
    InvalidRegex { pattern: String, message: String },
}

/// Errors raised while wiring a command's streams.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("{path}: {source}")]
    Redirect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{0}: bad file descriptor")]
    BadDescriptor(u8),

    /// `cmd < file > file` would truncate the input before it is read.
    #[error("{0}: cannot redirect input and output to the same file")]
    ReadWriteConflict(PathBuf),

    #[error("pipeline: {0}")]
    Pipeline(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let lex: Error = LexError::Unterminated {
            construct: "double quote",
            position: Position::new(),
        }
        .into();
        assert_eq!(lex.exit_code(), 2);

        let expansion: Error = ExpansionError::DivisionByZero.into();
        assert_eq!(expansion.exit_code(), 1);
    }

    #[test]
    fn test_messages() {
        let err = ParseError::at("unexpected 'fi'", Position::new());
        assert_eq!(err.to_string(), "syntax error at 1:1: unexpected 'fi'");

        let err = ExpansionError::Unset {
            name: "HOME".into(),
            message: "parameter null or not set".into(),
        };
        assert_eq!(err.to_string(), "HOME: parameter null or not set");
    }
}
