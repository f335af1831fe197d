//! # `vague` CLI
//!
//! A thin, narrow-contract collaborator: read a source file, compile it, and
//! print the resulting dataset map as JSON. No watch mode, no CSV/NDJSON
//! output, no mock server — those are named Non-goals. Logging is wired up
//! here and nowhere else in the crate, matching the teacher's convention
//! that the library stays silent unless a binary opts it in.

use clap::Parser as ClapParser;
use std::path::PathBuf;
use std::process::ExitCode;
use vague::{compile, Config, Seed};

#[derive(ClapParser, Debug)]
#[command(name = "vague", about = "Generate a constraint-respecting synthetic dataset from a .vague source file")]
struct Cli {
    /// Path to a `.vague` source file.
    source: PathBuf,

    /// Deterministic RNG seed. Omit for non-reproducible output.
    #[arg(long)]
    seed: Option<u64>,

    /// Path to a `vague.toml` configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Pretty-print the JSON output.
    #[arg(long)]
    pretty: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let source = std::fs::read_to_string(&cli.source)
        .map_err(|e| anyhow::anyhow!("reading '{}': {e}", cli.source.display()))?;
    let config = Config::load(cli.config.as_ref().and_then(|p| p.to_str()))?;
    let seed = cli.seed.map(Seed::Value).unwrap_or(Seed::None);

    let output = compile(&source, seed, config, &Default::default())
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let stdout = std::io::stdout();
    if cli.pretty {
        serde_json::to_writer_pretty(stdout, &output)?;
    } else {
        serde_json::to_writer(stdout, &output)?;
    }
    println!();

    for warning in &output.warnings {
        eprintln!("warning: {warning}");
    }
    Ok(())
}
