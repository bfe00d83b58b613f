use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use tracing::{info, instrument, warn};

use crate::error::BackupError;
use crate::scan::candidate_files;

pub const BACKUP_DIR_NAME: &str = "Backup";

#[derive(Debug)]
pub struct CopyFailure {
    pub file: PathBuf,
    pub error: io::Error,
}

#[derive(Debug)]
pub struct BackupReport {
    pub directory: PathBuf,
    pub copied: usize,
    pub failures: Vec<CopyFailure>,
}

pub fn backup_dir(scan_root: &Path) -> PathBuf {
    scan_root.join(BACKUP_DIR_NAME)
}

/// Copies every candidate file under `scan_root` into `<scan_root>/Backup`, keeping
/// its relative path and modification time. A failed copy is logged and recorded; the rest still run.
#[instrument(skip_all, fields(root = %scan_root.display()))]
pub fn backup_all(scan_root: &Path) -> Result<BackupReport, BackupError> {
    let directory = backup_dir(scan_root);
    fs::create_dir_all(&directory).map_err(|source| BackupError::CreateDir {
        path: directory.clone(),
        source,
    })?;
    info!("backup folder ready at {}", directory.display());

    let mut report = BackupReport {
        directory,
        copied: 0,
        failures: Vec::new(),
    };
    for file in candidate_files(scan_root) {
        let Ok(relative) = file.strip_prefix(scan_root) else {
            continue;
        };
        let target = report.directory.join(relative);
        match copy_into(&file, &target) {
            Ok(()) => report.copied += 1,
            Err(error) => {
                warn!(file = %file.display(), %error, "failed to copy");
                report.failures.push(CopyFailure { file, error });
            }
        }
    }

    if report.copied > 0 {
        info!(count = report.copied, "backup complete");
    } else {
        info!("no audio files found for backup");
    }
    Ok(report)
}

fn copy_into(file: &Path, target: &Path) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(file, target)?;
    let modified = FileTime::from_last_modification_time(&fs::metadata(file)?);
    filetime::set_file_mtime(target, modified)
}
