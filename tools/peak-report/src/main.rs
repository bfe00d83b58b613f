use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::Parser;
use crest_audio::{measure_peak_dbfs, AudioCodec, DefaultCodec};
use crest_domain::{AudioFormat, SampleFormat};
use crest_normalizer::ledger::relative_key;
use crest_normalizer::scan::candidate_files;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Report the peak level of every audio file in a folder"
)]
struct Args {
    /// Folder to scan recursively
    input: PathBuf,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum PeakRecord {
    Measured {
        path: String,
        /// `null` for silent files.
        peak_dbfs: Option<f64>,
        sample_rate: u32,
        channels: u16,
        format: Option<AudioFormat>,
        sample_format: SampleFormat,
    },
    Failed {
        path: String,
        error: String,
    },
}

fn measure(root: &Path, path: &Path, codec: &impl AudioCodec) -> PeakRecord {
    let key = relative_key(root, path).unwrap_or_else(|| path.display().to_string());
    match codec.decode(path) {
        Ok(buffer) => {
            let peak = measure_peak_dbfs(&buffer);
            PeakRecord::Measured {
                path: key,
                peak_dbfs: peak.is_finite().then_some(peak),
                sample_rate: buffer.sample_rate(),
                channels: buffer.channels(),
                format: AudioFormat::from_path(path),
                sample_format: buffer.format(),
            }
        }
        Err(err) => PeakRecord::Failed {
            path: key,
            error: err.to_string(),
        },
    }
}

/// Writes one JSON line per candidate under `root`, `Backup/` excluded.
fn write_report<W: Write>(root: &Path, codec: &impl AudioCodec, out: &mut W) -> Result<usize> {
    let mut count = 0;
    for path in candidate_files(root) {
        serde_json::to_writer(&mut *out, &measure(root, &path, codec))?;
        writeln!(out)?;
        count += 1;
    }
    Ok(count)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    if !args.input.is_dir() {
        bail!("input directory {:?} not found", args.input);
    }

    let count = write_report(&args.input, &DefaultCodec, &mut io::stdout().lock())?;
    info!(count, "measured files");
    Ok(())
}
