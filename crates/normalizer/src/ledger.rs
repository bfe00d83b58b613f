//! Durable record of files that were normalized successfully.
//!
//! The on-disk form is plain UTF-8 text, one path per line, each path relative
//! to the scan root and joined with `/`. Lines are only ever appended.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Component, Path, PathBuf};

use clap::ValueEnum;
use tracing::{debug, info};

use crate::error::LedgerError;

pub const DEFAULT_LEDGER_FILE: &str = "processed_files.log";

/// When newly normalized paths are written to the ledger file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LedgerSync {
    /// One append after the whole tree has been walked.
    #[default]
    EndOfRun,
    /// An append after every successful file.
    PerFile,
}

/// Reads the ledger at `path`. With `reset`, deletes it instead and returns nothing.
/// A missing file is an empty ledger.
pub fn load_entries(path: &Path, reset: bool) -> Result<HashSet<String>, LedgerError> {
    if reset {
        match fs::remove_file(path) {
            Ok(()) => info!(?path, "ledger reset"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(LedgerError::Reset {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
        return Ok(HashSet::new());
    }

    let read_err = |source| LedgerError::Read {
        path: path.to_path_buf(),
        source,
    };
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(HashSet::new()),
        Err(err) => return Err(read_err(err)),
    };
    let mut entries = HashSet::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(read_err)?;
        let entry = line.trim();
        if !entry.is_empty() {
            entries.insert(entry.to_string());
        }
    }
    Ok(entries)
}

/// Appends `entries`, one per line, creating the file when needed. The whole batch
/// goes out in a single write.
pub fn append_all(path: &Path, entries: &[String]) -> Result<(), LedgerError> {
    if entries.is_empty() {
        return Ok(());
    }
    let append_err = |source| LedgerError::Append {
        path: path.to_path_buf(),
        source,
    };
    let mut batch = String::new();
    for entry in entries {
        batch.push_str(entry);
        batch.push('\n');
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(append_err)?;
    file.write_all(batch.as_bytes()).map_err(append_err)?;
    file.sync_data().map_err(append_err)?;
    Ok(())
}

/// Ledger key for `file`: its path relative to `root`, components joined with `/`.
///
/// `None` when `file` is not under `root`, a component is not valid UTF-8, or the key
/// could not be stored on one line.
pub fn relative_key(root: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            parts.push(part.to_str()?);
        }
    }
    if parts.is_empty() {
        return None;
    }
    let key = parts.join("/");
    if key.contains(['\n', '\r']) || key.trim() != key {
        return None;
    }
    Some(key)
}

#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    entries: HashSet<String>,
    pending: Vec<String>,
}

impl Ledger {
    pub fn open<P: Into<PathBuf>>(path: P, reset: bool) -> Result<Self, LedgerError> {
        let path = path.into();
        let entries = load_entries(&path, reset)?;
        debug!(?path, count = entries.len(), "ledger loaded");
        Ok(Self {
            path,
            entries,
            pending: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Marks `key` as done. It reaches the file on the next [`Ledger::flush`].
    pub fn record(&mut self, key: String) {
        if self.entries.insert(key.clone()) {
            self.pending.push(key);
        }
    }

    pub fn pending(&self) -> &[String] {
        &self.pending
    }

    /// Appends everything recorded since the last flush and returns how many lines were written.
    pub fn flush(&mut self) -> Result<usize, LedgerError> {
        append_all(&self.path, &self.pending)?;
        let written = self.pending.len();
        self.pending.clear();
        Ok(written)
    }
}
