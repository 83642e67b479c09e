//! Error hierarchy shared by every stage of the interpreter.
//!
//! Scanner, parser, resolver and runtime all report through [`LoxError`].
//! Static stages (lex, parse, resolve) collect several of these before giving
//! up; the runtime stops at the first one.
//!
//! Nothing in here prints. Rendering to the console is the binary's job.

use std::io;
use thiserror::Error;

use log::info;

use crate::token::{Token, TokenType};

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoxError {
    /// Lexical (scanner) error with source line information.
    #[error("[line {line}] Error: {message}")]
    Lex {
        /// Human‑readable description.
        message: String,

        /// 1‑based line where the error occurred.
        line: usize,
    },

    /// Syntactic (parser) error. `location` is either ` at end` or ` at 'x'`.
    #[error("[line {line}] Error{location}: {message}")]
    Parse {
        message: String,
        location: String,
        line: usize,
    },

    /// Static scope error found by the resolver.
    #[error("[line {line}] Error at '{lexeme}': {message}")]
    Resolve {
        message: String,
        lexeme: String,
        line: usize,
    },

    /// Runtime evaluation error. Aborts the program run.
    #[error("{message}\n[line {line}]")]
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

    /// Helper constructor for the **parser**, pointing at the offending token.
    pub fn parse<S: Into<String>>(token: &Token<'_>, msg: S) -> Self {
        let message: String = msg.into();
        let location = match token.token_type {
            TokenType::EOF => " at end".to_string(),
            _ => format!(" at '{}'", token.lexeme),
        };

        info!("Creating Parse error: line={}, msg={}", token.line, message);

        LoxError::Parse {
            message,
            location,
            line: token.line,
        }
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve<S: Into<String>>(token: &Token<'_>, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Resolve error: line={}, msg={}", token.line, message);

        LoxError::Resolve {
            message,
            lexeme: token.lexeme.to_string(),
            line: token.line,
        }
    }

    /// Helper constructor for the **interpreter**.
    pub fn runtime<S: Into<String>>(token: &Token<'_>, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Runtime error: line={}, msg={}", token.line, message);

        LoxError::Runtime {
            message,
            line: token.line,
        }
    }

    /// `true` for errors that must stop a program before it starts.
    pub fn is_static(&self) -> bool {
        matches!(
            self,
            LoxError::Lex { .. } | LoxError::Parse { .. } | LoxError::Resolve { .. }
        )
    }
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, LoxError>;
