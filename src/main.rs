use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};

use rox::error::LoxError;
use rox::scanner::Scanner;
use rox::Session;

/// Exit code for lex, parse and resolve errors.
const EXIT_STATIC: i32 = 65;

/// Exit code for a runtime error.
const EXIT_RUNTIME: i32 = 70;

#[derive(ClapParser, Debug)]
#[command(version, about = "Lox language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: Option<PathBuf>,

        /// Print one JSON object per token instead of `KIND lexeme literal`
        #[arg(long)]
        json: bool,
    },

    /// Runs input from a file as a Lox program
    Run { filename: Option<PathBuf> },

    /// Reads and runs Lox one line at a time, keeping globals between lines
    Repl,
}

/// Reads a whole source file, rejecting non‑UTF‑8 input.
fn read_file(filename: PathBuf) -> Result<String> {
    info!("Reading file: {:?}", filename);
    let file = File::open(&filename).context(format!("Failed to open file {:?}", filename))?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();

    let bytes = reader
        .read_to_end(&mut buf)
        .context(format!("Failed to read file {:?}", filename))?;

    info!("Read {} bytes from {:?}", bytes, filename);

    String::from_utf8(buf).context(format!("File {:?} is not valid UTF-8", filename))
}

/// `None` (after telling the user) when no file was given.
fn load(filename: Option<PathBuf>) -> Result<Option<String>> {
    match filename {
        Some(filename) => read_file(filename).map(Some),
        None => {
            info!("No filepath provided");
            println!("No input filepath was provided. Exiting...");
            Ok(None)
        }
    }
}

fn init_logger() -> Result<()> {
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    Builder::new()
        .format(|buf, record| {
            let module = record.module_path().unwrap_or("<unnamed>");
            let module = module.strip_prefix("rox::").unwrap_or(module);
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug)
        .parse_default_env()
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

fn tokenize(source: &str, json: bool) -> Result<()> {
    let mut tokenized = true;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for item in Scanner::new(source) {
        match item {
            Ok(token) if json => {
                serde_json::to_writer(&mut out, &token).context("Failed to encode token")?;
                writeln!(out)?;
            }

            Ok(token) => writeln!(out, "{}", token)?,

            Err(e) => {
                tokenized = false;
                debug!("Tokenization debug: {}", e);
                eprintln!("{}", e);
            }
        }
    }

    out.flush()?;

    if !tokenized {
        debug!("Tokenization failed, exiting with code {}", EXIT_STATIC);
        std::process::exit(EXIT_STATIC);
    }

    info!("Tokenization completed successfully");
    Ok(())
}

fn run(source: &str) {
    info!("Provided input:\n {}", source);

    if let Err(errors) = rox::run(source, Box::new(io::stdout())) {
        for e in &errors {
            eprintln!("{}", e);
        }

        let code = if errors.iter().any(LoxError::is_static) {
            EXIT_STATIC
        } else {
            EXIT_RUNTIME
        };

        debug!("Run failed with {} error(s), exiting with {}", errors.len(), code);
        std::process::exit(code);
    }

    info!("Program executed successfully");
}

fn repl() -> Result<()> {
    info!("Entering interactive prompt");

    let mut session = Session::new(Box::new(io::stdout()));
    let mut lines = io::stdin().lock().lines();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line.context("Failed to read from stdin")?;

        if let Err(errors) = session.run_line(&line) {
            debug!("Line failed with {} error(s)", errors.len());
            for e in &errors {
                eprintln!("{}", e);
            }
        }
    }

    println!();
    info!("Prompt closed");
    Ok(())
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    if args.log {
        init_logger()?;
    } else {
        // Keep the `log` macros pointed at something.
        Builder::new().filter_level(log::LevelFilter::Off).init();
    }

    info!("CLI arguments: {:?}", args);

    match args.commands {
        Commands::Tokenize { filename, json } => {
            if let Some(source) = load(filename)? {
                tokenize(&source, json)?;
            }
        }

        Commands::Run { filename } => {
            if let Some(source) = load(filename)? {
                run(&source);
            }
        }

        Commands::Repl => {
            rox::on_large_stack(repl).context("Failed to start the prompt thread")??;
        }
    }

    Ok(())
}
