extern crate clap;
extern crate thiserror;

use std::{
    collections::HashSet,
    io::{self, Read},
    path::PathBuf,
    process::ExitCode,
    time::Instant,
};

use clap::{error::ErrorKind, CommandFactory, Parser, ValueEnum};
use colored::Colorize;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tapeir::{
    emit::{ArtifactSink, FileSink},
    compile_ast,
    interpreter::{ir_interpreter::IrInterpreter, Runtime, RuntimeError},
    lexer::{lexer::Lexer, TokenKind},
    parse_source, CompileError, TAPE_SIZE,
};

/// Tape-language to LLVM-like IR compiler
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The file to compile, stdin when omitted
    #[arg()]
    file: Option<PathBuf>,

    /// Where to write the IR
    #[arg(short, long, default_value = "bf.ll")]
    out: PathBuf,

    /// Print intermediate forms to stdout
    #[arg(short, long, value_enum)]
    emit: Vec<Emit>,

    /// Run the generated IR on stdin/stdout instead of writing it out
    #[arg(long)]
    run: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, Hash, PartialEq, Eq)]
enum Emit {
    /// Output the tokens
    Tokens,
    /// Output the ast
    Ast,
    /// Output the IR
    Ir,
}

#[derive(Error, Debug)]
enum Failure {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("{0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl Failure {
    fn exit_code(&self) -> ExitCode {
        match self {
            Failure::Compile(CompileError::Parse(_)) => ExitCode::from(1),
            Failure::Compile(CompileError::Internal(_)) => ExitCode::from(70),
            Failure::Io(_) | Failure::Runtime(RuntimeError::Io(_)) => ExitCode::from(2),
            Failure::Runtime(_) => ExitCode::from(1),
        }
    }
}

fn init_logging(quiet: bool) {
    let level = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(filter)
        .init();
}

/// Read the program as bytes. Invalid UTF-8 becomes U+FFFD, which lexes as commentary like any
/// other non-operator character.
fn read_source(file: Option<&PathBuf>) -> io::Result<String> {
    let bytes = match file {
        Some(path) => std::fs::read(path)?,
        None => {
            let mut bytes = vec![];
            io::stdin().read_to_end(&mut bytes)?;
            bytes
        }
    };
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn print_tokens(source: &str) {
    let tokens = Lexer::new(source).collect_tokens();
    let text: String = tokens
        .iter()
        .filter(|t| **t != TokenKind::Ignore && **t != TokenKind::EndOfStream)
        .map(|t| t.to_string())
        .collect();
    println!("{}", text);
}

fn run(args: &Args) -> Result<ExitCode, Failure> {
    let emit: HashSet<Emit> = args.emit.iter().copied().collect();
    let name = args
        .file
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<stdin>".to_string());

    info!("Compiling {}", name);
    let text = read_source(args.file.as_ref())?;

    if emit.contains(&Emit::Tokens) {
        print_tokens(&text);
    }

    let ast = parse_source(&text)?;

    if emit.contains(&Emit::Ast) {
        print!("{}", ast);
    }

    let module = compile_ast(&ast)?;

    if emit.contains(&Emit::Ir) {
        print!("{}", module);
    }

    if args.run {
        info!("Starting ir-interpreter");
        let now = Instant::now();
        let mut runtime = Runtime::new(TAPE_SIZE, Box::new(io::stdin()), Box::new(io::stdout()));
        let status = IrInterpreter::new().run(&mut runtime, &module)?;
        info!("Finished ir-interpreter in {:.2?}", now.elapsed());
        return Ok(ExitCode::from(status as u8));
    }

    FileSink::new(&args.out).write_module(&module)?;
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(_) => {
            // anything we don't understand gets the usage text
            let _ = Args::command().print_help();
            return ExitCode::SUCCESS;
        }
    };

    init_logging(args.quiet);

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            e.exit_code()
        }
    }
}
