//! Shoal CLI - Command line interface for the shoal interpreter
//!
//! Usage:
//!   shoal -c 'echo hello' [args]   # Execute a command string
//!   shoal script.sh [args]         # Execute a script file
//!   shoal < script.sh              # Execute a script read from stdin

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use shoal::{InputHandle, Io, Shell};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Shoal - POSIX-style shell interpreter
#[derive(Parser, Debug)]
#[command(name = "shoal")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Execute the given command string
    #[arg(short = 'c')]
    command: Option<String>,

    /// Log filter, e.g. `debug` or `shoal=trace`; overrides SHOAL_LOG
    #[arg(long)]
    log_level: Option<String>,

    /// Script file to execute, or `$0` with -c
    #[arg()]
    script: Option<PathBuf>,

    /// Arguments to pass to the script
    #[arg(trailing_var_arg = true)]
    args: Vec<String>,
}

/// Where the script text comes from, and what `$0` is.
struct Source {
    text: String,
    name: String,
    /// Stdin was consumed as the script itself
    stdin_used: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.log_level.as_deref());

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("shoal: {err}");
            return ExitCode::FAILURE;
        }
    };
    match runtime.block_on(run(args)) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("shoal: {err:#}");
            let code = err
                .downcast_ref::<shoal::Error>()
                .map_or(1, shoal::Error::exit_code);
            exit_code(code)
        }
    }
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_env("SHOAL_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn run(args: Args) -> Result<ExitCode> {
    let source = load(&args)?;

    let mut shell = Shell::builder()
        .inherit_env()
        .name(source.name)
        .args(args.args)
        .build();

    let mut io = Io::inherit();
    if source.stdin_used {
        io.stdin = InputHandle::Null;
    }
    let status = shell.run(&source.text, &io).await?;
    Ok(exit_code(status.code()))
}

fn load(args: &Args) -> Result<Source> {
    if let Some(command) = &args.command {
        let name = args
            .script
            .as_ref()
            .map_or_else(|| "shoal".to_string(), |p| p.display().to_string());
        return Ok(Source {
            text: command.clone(),
            name,
            stdin_used: false,
        });
    }

    if let Some(path) = &args.script {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script: {}", path.display()))?;
        return Ok(Source {
            text,
            name: path.display().to_string(),
            stdin_used: false,
        });
    }

    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("Failed to read script from stdin")?;
    Ok(Source {
        text,
        name: "shoal".to_string(),
        stdin_used: true,
    })
}

/// Process exit codes are a byte; larger statuses wrap like a real shell's.
fn exit_code(code: i32) -> ExitCode {
    ExitCode::from((code & 0xff) as u8)
}
