use std::path::{Path, PathBuf};

use crest_domain::is_candidate;
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

use crate::backup::BACKUP_DIR_NAME;

/// Regular `.wav`/`.mp3` files under `root`, sorted by name within each directory.
/// The top-level backup folder is never descended into.
pub fn candidate_files(root: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_backup_dir(entry))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(error = %err, "skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_candidate(entry.path()))
        .map(DirEntry::into_path)
}

fn is_backup_dir(entry: &DirEntry) -> bool {
    entry.depth() == 1 && entry.file_type().is_dir() && entry.file_name() == BACKUP_DIR_NAME
}
