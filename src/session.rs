//! Interactive use: one interpreter fed a line at a time.
//!
//! Functions and classes defined on one line are called from later ones, so
//! every line's source, tokens and statements are leaked and live as long as
//! the process. Node ids keep counting from line to line, which keeps each
//! line's resolutions distinct inside the shared table.

use std::io::Write;

use log::{debug, info};

use crate::ast::Stmt;
use crate::error::LoxError;
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::{Resolutions, Resolver};
use crate::scanner::Scanner;
use crate::token::Token;

pub struct Session<'o> {
    interpreter: Interpreter<'o>,
    next_id: usize,
    lines: usize,
}

impl<'o> Session<'o> {
    pub fn new(out: Box<dyn Write + 'o>) -> Self {
        info!("Starting interactive session");

        Self {
            interpreter: Interpreter::with_output(Resolutions::new(), out),
            next_id: 0,
            lines: 0,
        }
    }

    /// Runs one line against the session's globals.
    ///
    /// Errors are returned the same way as [`crate::run`] returns them, and
    /// the session stays usable afterwards.
    pub fn run_line(&mut self, line: &str) -> Result<(), Vec<LoxError>> {
        self.lines += 1;
        debug!("Session line {}: {}", self.lines, line);

        let source: &'static str = Box::leak(line.to_owned().into_boxed_str());
        let (tokens, mut errors) = Scanner::new(source).scan_all();
        let tokens: &'static [Token<'static>] = Vec::leak(tokens);

        let mut parser = Parser::with_first_id(tokens, self.next_id);
        let parsed = parser.parse();
        self.next_id = parser.next_id();

        let statements = match parsed {
            Ok(statements) => statements,
            Err(parse_errors) => {
                errors.extend(parse_errors);
                Vec::new()
            }
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        let resolutions = Resolver::new().resolve(&statements)?;
        self.interpreter.add_resolutions(resolutions);

        let statements: &'static [Stmt<'static>] = Vec::leak(statements);
        self.interpreter
            .interpret(statements)
            .map_err(|e| vec![e])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_keep_counting_between_lines() {
        let mut session = Session::new(Box::new(std::io::sink()));

        session.run_line("var a = 1; print a;").unwrap();
        assert_eq!(session.next_id, 1);

        session.run_line("{ var b = a; print b; }").unwrap();
        assert_eq!(session.next_id, 3);
        assert_eq!(session.lines, 2);
    }
}
