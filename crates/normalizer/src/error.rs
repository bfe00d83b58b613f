use std::io;
use std::path::PathBuf;

use crest_domain::DomainError;
use thiserror::Error;

/// Problems with the invocation itself. Raised before any file is read or written.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("conflicting backup options: --backup and --no-backup were both given")]
    ConflictingBackupFlags,
    #[error("input directory {0:?} not found")]
    InputNotFound(PathBuf),
    #[error("invalid target dBFS: {0}")]
    InvalidTarget(#[from] DomainError),
    #[error("could not read an answer to the backup prompt: {0}")]
    Prompt(#[source] io::Error),
}

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("failed to create backup folder {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to read ledger {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to reset ledger {path:?}: {source}")]
    Reset {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to append to ledger {path:?}: {source}")]
    Append {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Failures that stop a whole run. Per-file problems never surface here.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Backup(#[from] BackupError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl RunError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Backup(_) => 3,
            Self::Ledger(_) => 4,
        }
    }
}
