use std::io;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use crest_audio::DefaultCodec;
use crest_normalizer::{execute, NormalizeArgs, RunError, RunSummary};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = NormalizeArgs::parse();
    match run(&cli) {
        Ok(summary) => {
            if let Some(copied) = summary.backed_up {
                println!("Backup complete: {copied} files backed up");
            }
            if summary.backup_failures > 0 {
                println!("{} files could not be backed up", summary.backup_failures);
            }
            println!("{summary}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Error: {err:#}");
            let code = err.downcast_ref::<RunError>().map_or(1, RunError::exit_code);
            ExitCode::from(code)
        }
    }
}

fn run(cli: &NormalizeArgs) -> anyhow::Result<RunSummary> {
    let stdin = io::stdin();
    let config = cli
        .resolve(&mut stdin.lock(), &mut io::stdout())
        .map_err(RunError::from)?;
    let summary = execute(&config, DefaultCodec)
        .with_context(|| format!("normalizing {}", config.input.display()))?;
    Ok(summary)
}
