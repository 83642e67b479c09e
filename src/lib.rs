pub mod ast;
pub mod callable;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod session;
pub mod token;
pub mod value;

use std::io::{self, Write};
use std::{panic, thread};

use log::info;

use error::LoxError;
use interpreter::Interpreter;
use parser::Parser;
use resolver::Resolver;
use scanner::Scanner;

pub use session::Session;

/// Stack reserved for the thread a program runs on. Every Lox call nests
/// several evaluator frames, and [`interpreter::MAX_CALL_DEPTH`] of them
/// must fit.
pub const STACK_SIZE: usize = 64 * 1024 * 1024;

/// Runs `f` to completion on a fresh thread with a [`STACK_SIZE`] stack.
/// A panic in `f` is resumed on the caller.
pub fn on_large_stack<T, F>(f: F) -> io::Result<T>
where
    F: FnOnce() -> T + Send,
    T: Send,
{
    thread::scope(|scope| {
        let handle = thread::Builder::new()
            .name("rox-eval".to_string())
            .stack_size(STACK_SIZE)
            .spawn_scoped(scope, f)?;

        Ok(handle.join().unwrap_or_else(|payload| panic::resume_unwind(payload)))
    })
}

/// Scans, parses, resolves and runs `source`, printing to `out`.
///
/// Static errors (lex, parse, resolve) are all collected and returned before
/// anything executes. Otherwise the result holds at most the one runtime
/// error that stopped the program.
pub fn run(source: &str, out: Box<dyn Write + Send + '_>) -> Result<(), Vec<LoxError>> {
    match on_large_stack(move || run_here(source, out)) {
        Ok(outcome) => outcome,
        Err(e) => Err(vec![LoxError::from(e)]),
    }
}

fn run_here(source: &str, out: Box<dyn Write + Send + '_>) -> Result<(), Vec<LoxError>> {
    let (tokens, mut errors) = Scanner::new(source).scan_all();

    let statements = match Parser::new(&tokens).parse() {
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

    info!("Static passes clean; running {} statement(s)", statements.len());

    let mut interpreter = Interpreter::with_output(resolutions, out);
    let outcome = interpreter.interpret(&statements);

    outcome.map_err(|e| vec![e])
}
