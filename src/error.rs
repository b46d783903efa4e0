//! Centralised error hierarchy for the **treelox** interpreter.
//!
//! All subsystems (scanner, parser, interpreter, CLI) convert their internal
//! failure modes into one of the [`LoxError`] variants defined here, enabling
//! a uniform `Result<T>` alias throughout the crate and ergonomic
//! inter-operation with `anyhow` in the binary.
//!
//! The resolver is the exception: its findings are not failures of the
//! resolver itself, so it accumulates [`Diagnostic`] records (errors *and*
//! warnings) and returns the whole batch to the caller.  The driver decides
//! what to print and whether execution may start.
//!
//! The module **does not** print diagnostics itself.

use std::fmt;
use std::io;

use log::info;
use serde::Serialize;
use thiserror::Error;

use crate::token::{Token, TokenType};

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoxError {
    /// Lexical (scanner) error with source line information.
    #[error("[line {line}] Error: {message}")]
    Lex {
        /// Human-readable description.
        message: String,

        /// 1-based line where the error occurred.
        line: usize,
    },

    /// Syntactic (parser) error.
    #[error("[line {line}] Error: {message}")]
    Parse { message: String, line: usize },

    /// Runtime evaluation error, anchored to the offending token's line.
    #[error("[line {line}] {message}")]
    Runtime { message: String, line: usize },

    /// Wrapper around `std::io::Error` (transparent).  Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl LoxError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Lex error: line={}, msg={}", line, message);

        LoxError::Lex { message, line }
    }

    /// Helper constructor for the **parser**.
    pub fn parse<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Parse error: line={}, msg={}", line, message);

        LoxError::Parse { message, line }
    }

    /// Helper constructor for the **interpreter**.  The error is pinned to
    /// the line of the token at which evaluation failed.
    pub fn runtime<S: Into<String>>(token: &Token<'_>, msg: S) -> Self {
        let message: String = msg.into();

        info!(
            "Creating Runtime error: line={}, msg={}",
            token.line, message
        );

        LoxError::Runtime {
            message,
            line: token.line,
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, LoxError>;

/// How serious a [`Diagnostic`] is.  Errors block execution; warnings never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Error,
    Warning,
}

/// One finding from the static resolution pass.
///
/// The rendered form matches the classic report shape:
/// `[line N] Error at 'x': message` (or `Warning`, or ` at end` for EOF).
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub line: usize,

    /// Location suffix, e.g. ` at 'count'` or ` at end`.
    pub location: String,

    pub message: String,
}

impl Diagnostic {
    fn new<S: Into<String>>(severity: Severity, token: &Token<'_>, msg: S) -> Self {
        let location = if matches!(token.token_type, TokenType::EOF) {
            " at end".to_string()
        } else {
            format!(" at '{}'", token.lexeme)
        };

        Diagnostic {
            severity,
            line: token.line,
            location,
            message: msg.into(),
        }
    }

    pub fn error<S: Into<String>>(token: &Token<'_>, msg: S) -> Self {
        Self::new(Severity::Error, token, msg)
    }

    pub fn warning<S: Into<String>>(token: &Token<'_>, msg: S) -> Self {
        Self::new(Severity::Warning, token, msg)
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.severity {
            Severity::Error => "Error",
            Severity::Warning => "Warning",
        };

        write!(
            f,
            "[line {}] {}{}: {}",
            self.line, kind, self.location, self.message
        )
    }
}
