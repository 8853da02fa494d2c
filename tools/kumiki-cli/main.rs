use clap::{Parser, ValueEnum};
use kumiki::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Target languages as spelled on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum TargetCli {
    Rust,
    Javascript,
}

impl From<TargetCli> for Target {
    fn from(target: TargetCli) -> Self {
        match target {
            TargetCli::Rust => Target::Rust,
            TargetCli::Javascript => Target::JavaScript,
        }
    }
}

/// Compiles a node graph into server and client source
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the graph JSON file
    #[arg(long)]
    input: PathBuf,

    /// Path to the state schema JSON file
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Where to write the generated source for `--target`
    #[arg(long)]
    output: Option<PathBuf>,

    /// Where to additionally write the JavaScript client module
    #[arg(long = "client-output")]
    client_output: Option<PathBuf>,

    /// Only run the static checks and print every diagnostic
    #[arg(long)]
    validate: bool,

    /// Emit trace points in the generated code
    #[arg(long)]
    debug: bool,

    /// Language of `--output`
    #[arg(long, value_enum, default_value = "rust")]
    target: TargetCli,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse_from(normalize_args(std::env::args()));
    if let Err(message) = run(cli) {
        exit_with_error(&message);
    }
}

/// Accepts Go-style `-input` spellings by rewriting them to `--input`.
fn normalize_args(args: impl Iterator<Item = String>) -> Vec<String> {
    args.enumerate()
        .map(|(i, arg)| {
            let single_dash_long = i > 0
                && arg.len() > 2
                && arg.starts_with('-')
                && !arg.starts_with("--")
                && arg.chars().nth(1).is_some_and(|c| c.is_ascii_alphabetic());
            if single_dash_long {
                format!("-{arg}")
            } else {
                arg
            }
        })
        .collect()
}

fn read(path: &PathBuf, what: &str) -> Result<String, String> {
    fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {} file '{}': {}", what, path.display(), e))
}

fn write(path: &PathBuf, source: &str) -> Result<(), String> {
    fs::write(path, source)
        .map_err(|e| format!("Failed to write '{}': {}", path.display(), e))
}

fn run(cli: Cli) -> Result<(), String> {
    let started = Instant::now();
    let graph_json = read(&cli.input, "graph")?;
    let schema_json = cli
        .schema
        .as_ref()
        .map(|path| read(path, "schema"))
        .transpose()?;

    let compiler = Compiler::from_json(&graph_json, schema_json.as_deref())
        .map_err(|e| e.to_string())?
        .with_tracing(cli.debug)
        .with_target(cli.target.into())
        .build();

    if cli.validate {
        return match compiler.validate() {
            Ok(()) => {
                println!("{}: no problems found", cli.input.display());
                Ok(())
            }
            Err(errors) => {
                for error in errors.iter() {
                    println!("{}", error);
                }
                Err(format!("{} validation error(s)", errors.len()))
            }
        };
    }

    let output = cli
        .output
        .as_ref()
        .ok_or_else(|| "--output is required unless --validate is given".to_string())?;
    let source = compiler.compile().map_err(|e| e.to_string())?;
    write(output, &source)?;

    if let Some(client) = &cli.client_output {
        let source = compiler
            .compile_to(Target::JavaScript)
            .map_err(|e| e.to_string())?;
        write(client, &source)?;
    }

    tracing::info!(elapsed = ?started.elapsed(), "compilation finished");
    Ok(())
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}
