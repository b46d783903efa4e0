use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};
use memmap2::Mmap;

use treelox as lox;

use lox::ast_printer::AstPrinter;
use lox::interpreter::Interpreter;
use lox::parser::{Parser, Stmt};
use lox::resolver::Resolver;
use lox::scanner::Scanner;
use lox::token::Token;

#[derive(ClapParser, Debug)]
#[command(version, about = "Tree-walking Lox interpreter", long_about = None)]
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

        /// Dump the token stream as JSON instead of one token per line
        #[arg(long)]
        json: bool,
    },

    /// Parses input from a file as a single expression and prints its AST
    Parse { filename: Option<PathBuf> },

    /// Evaluates input from a file as a single expression and prints the result
    Evaluate { filename: Option<PathBuf> },

    /// Runs input from a file as a program
    Run { filename: Option<PathBuf> },

    /// Starts an interactive session
    Repl,
}

/// Maps the script file read-only; token lexemes borrow straight from it.
fn map_file(filename: &PathBuf) -> Result<Mmap> {
    info!("Mapping file: {:?}", filename);

    let file = File::open(filename).context(format!("Failed to open file {:?}", filename))?;
    let mmap = unsafe { Mmap::map(&file) }.context(format!("Failed to map file {:?}", filename))?;

    info!("Mapped {} bytes from {:?}", mmap.len(), filename);

    Ok(mmap)
}

/// Scan the whole buffer, reporting lexing errors as they occur.
/// Returns the valid tokens plus whether any error was seen.
fn scan_tokens(src: &[u8]) -> (Vec<Token<'_>>, bool) {
    let mut tokens = Vec::new();
    let mut had_error = false;

    for result in Scanner::new(src) {
        match result {
            Ok(token) => {
                debug!("Scanned token: {}", token);
                tokens.push(token);
            }

            Err(e) => {
                had_error = true;
                eprintln!("{}", e);
            }
        }
    }

    (tokens, had_error)
}

fn init_logger() -> Result<()> {
    // Create or open the log file
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    // Configure env_logger to write to file with module path and source line
    Builder::new()
        .format(|buf, record| {
            // Strip 'treelox::' from module path
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("treelox::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug) // Default to Debug, override with RUST_LOG
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

/// Resolve then interpret a whole program.  Exit codes follow the classic
/// convention: 65 for static errors, 70 for runtime errors.
fn run_source(src: &[u8]) {
    let (tokens, had_lex_error) = scan_tokens(src);
    if had_lex_error {
        debug!("Lexing failed, exiting with code 65");
        std::process::exit(65);
    }

    let mut parser = Parser::new(&tokens);
    let statements = match parser.parse() {
        Ok(statements) => statements,

        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(65);
        }
    };

    info!("Parsed {} statements", statements.len());

    let mut interpreter = Interpreter::new();

    let diagnostics = Resolver::new(&mut interpreter).resolve(&statements);
    let mut had_resolve_error = false;

    for diagnostic in &diagnostics {
        if diagnostic.is_error() {
            had_resolve_error = true;
            eprintln!("{}", diagnostic);
        } else {
            println!("{}", diagnostic);
        }
    }

    if had_resolve_error {
        debug!("Resolution failed, exiting with code 65");
        std::process::exit(65);
    }

    if let Err(e) = interpreter.interpret(&statements) {
        eprintln!("{}", e);
        std::process::exit(70);
    }

    info!("Program executed successfully");
}

/// Interactive prompt.  Interpreter state persists across lines, and a line
/// that is a single expression statement echoes its value.
fn run_repl() -> Result<()> {
    let mut interpreter: Interpreter<'static> = Interpreter::new();
    let mut id_base: usize = 0;

    let stdin = io::stdin();
    let mut handle = stdin.lock();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if handle.read_line(&mut line)? == 0 {
            break; // EOF
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        // Closures declared on this line may capture its AST for the rest
        // of the session, so the line's source, tokens, and statements are
        // kept alive deliberately.
        let src: &'static str = Box::leak(line.to_owned().into_boxed_str());

        let (tokens, had_lex_error) = scan_tokens(src.as_bytes());
        if had_lex_error {
            continue;
        }

        let tokens: &'static [Token<'static>] = Box::leak(tokens.into_boxed_slice());

        let mut parser = Parser::with_id_base(tokens, id_base);
        let statements = match parser.parse() {
            Ok(statements) => statements,

            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };
        id_base = parser.id_watermark();

        let statements: &'static [Stmt<'static>] = Box::leak(statements.into_boxed_slice());

        let diagnostics = Resolver::new(&mut interpreter).resolve(statements);
        let mut had_resolve_error = false;

        for diagnostic in &diagnostics {
            if diagnostic.is_error() {
                had_resolve_error = true;
                eprintln!("{}", diagnostic);
            } else {
                println!("{}", diagnostic);
            }
        }

        if had_resolve_error {
            continue;
        }

        match interpreter.interpret(statements) {
            Ok(Some(value)) => println!("{}", value),
            Ok(None) => {}
            Err(e) => eprintln!("{}", e),
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    // Initialize logger only if --log flag is provided
    if args.log {
        init_logger()?;
    } else {
        // Initialize a minimal logger to avoid "no logger" errors
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    match args.commands {
        Commands::Tokenize { filename, json } => match filename {
            Some(filename) => {
                info!("Running Tokenize subcommand");

                let mmap = map_file(&filename)?;
                let (tokens, had_error) = scan_tokens(&mmap);

                if json {
                    println!("{}", serde_json::to_string_pretty(&tokens)?);
                } else {
                    for token in &tokens {
                        println!("{}", token);
                    }
                }

                if had_error {
                    debug!("Tokenization failed, exiting with code 65");
                    std::process::exit(65);
                }

                info!("Tokenization completed successfully");
            }

            None => {
                info!("No filepath provided for Tokenize");
                println!("No input filepath was provided. Exiting...");
                std::process::exit(0);
            }
        },

        Commands::Parse { filename } => match filename {
            Some(filename) => {
                info!("Running Parse subcommand");

                let mmap = map_file(&filename)?;
                let (tokens, had_error) = scan_tokens(&mmap);
                if had_error {
                    std::process::exit(65);
                }

                let mut parser = Parser::new(&tokens);

                match parser.parse_expression() {
                    Ok(expr) => {
                        let ast_str = AstPrinter::print(&expr);

                        debug!("AST: {}", ast_str);
                        println!("{}", ast_str);
                    }

                    Err(e) => {
                        eprintln!("{}", e);
                        std::process::exit(65);
                    }
                }

                info!("Parse subcommand completed");
            }

            None => {
                info!("No filepath provided for Parse");
                println!("No input filepath was provided. Exiting...");
                std::process::exit(0);
            }
        },

        Commands::Evaluate { filename } => match filename {
            Some(filename) => {
                info!("Running Evaluate subcommand");

                let mmap = map_file(&filename)?;
                let (tokens, had_error) = scan_tokens(&mmap);
                if had_error {
                    std::process::exit(65);
                }

                let mut parser = Parser::new(&tokens);

                match parser.parse_expression() {
                    Ok(expr) => {
                        let mut interpreter = Interpreter::new();

                        match interpreter.evaluate(&expr) {
                            Ok(value) => {
                                debug!("Evaluated to: {}", value);
                                println!("{}", value);
                            }

                            Err(e) => {
                                eprintln!("{}", e);
                                std::process::exit(70);
                            }
                        }
                    }

                    Err(e) => {
                        eprintln!("{}", e);
                        std::process::exit(65);
                    }
                }

                info!("Evaluate subcommand completed");
            }

            None => {
                info!("No filepath provided for Evaluate");
                println!("No input filepath was provided. Exiting...");
                std::process::exit(0);
            }
        },

        Commands::Run { filename } => match filename {
            Some(filename) => {
                info!("Running Run subcommand");

                let mmap = map_file(&filename)?;
                run_source(&mmap);
            }

            None => {
                info!("No filepath provided for Run");
                println!("No input filepath was provided. Exiting...");
                std::process::exit(0);
            }
        },

        Commands::Repl => {
            info!("Starting REPL");
            run_repl()?;
        }
    }

    Ok(())
}
