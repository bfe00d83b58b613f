use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Parser;
use crest_domain::TargetLevel;
use tracing::warn;

use crate::error::ConfigError;
use crate::ledger::{LedgerSync, DEFAULT_LEDGER_FILE};

#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Normalize audio files to a target peak level, with backup and a processing ledger",
    long_about = None
)]
pub struct NormalizeArgs {
    /// Input folder to scan recursively
    #[arg(short, long)]
    pub input: PathBuf,
    /// Target peak level in dBFS, e.g. -3dB
    #[arg(short, long, allow_hyphen_values = true)]
    pub target: String,
    /// Back up audio files into <input>/Backup before normalizing
    #[arg(long)]
    pub backup: bool,
    /// Skip the backup without asking
    #[arg(long)]
    pub no_backup: bool,
    /// Ledger file tracking already processed files
    #[arg(long, default_value = DEFAULT_LEDGER_FILE)]
    pub log_file: PathBuf,
    /// Delete the ledger and reprocess every file
    #[arg(long)]
    pub reset_log: bool,
    /// When newly processed files are written to the ledger
    #[arg(long, value_enum, default_value_t = LedgerSync::EndOfRun)]
    pub ledger_sync: LedgerSync,
}

/// Backup decision as far as the flags alone can tell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackupChoice {
    Enabled,
    Disabled,
    Ask,
}

/// Everything a run needs, settled before any file is touched.
#[derive(Clone, Debug, PartialEq)]
pub struct RunConfig {
    pub input: PathBuf,
    pub target: TargetLevel,
    pub backup: bool,
    pub ledger_path: PathBuf,
    pub reset_ledger: bool,
    pub ledger_sync: LedgerSync,
}

impl NormalizeArgs {
    pub fn backup_choice(&self) -> Result<BackupChoice, ConfigError> {
        match (self.backup, self.no_backup) {
            (true, true) => Err(ConfigError::ConflictingBackupFlags),
            (true, false) => Ok(BackupChoice::Enabled),
            (false, true) => Ok(BackupChoice::Disabled),
            (false, false) => Ok(BackupChoice::Ask),
        }
    }

    /// Validates the flags and settles the backup question, prompting on
    /// `prompt_in`/`prompt_out` only when neither backup flag was given.
    pub fn resolve<R: BufRead, W: Write>(
        &self,
        prompt_in: &mut R,
        prompt_out: &mut W,
    ) -> Result<RunConfig, ConfigError> {
        let choice = self.backup_choice()?;
        if !self.input.is_dir() {
            return Err(ConfigError::InputNotFound(self.input.clone()));
        }
        let target: TargetLevel = self.target.parse()?;
        if target.exceeds_full_scale() {
            warn!(%target, "target is above 0 dBFS, integer formats will clip");
        }
        let backup = match choice {
            BackupChoice::Enabled => true,
            BackupChoice::Disabled => false,
            BackupChoice::Ask => prompt_backup(prompt_in, prompt_out)?,
        };
        Ok(RunConfig {
            input: self.input.clone(),
            target,
            backup,
            ledger_path: self.log_file.clone(),
            reset_ledger: self.reset_log,
            ledger_sync: self.ledger_sync,
        })
    }
}

/// Asks `Create backup? (y/n):` until the answer is `y` or `n`, in any case.
pub fn prompt_backup<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Result<bool, ConfigError> {
    let mut question = "Create backup? (y/n): ";
    loop {
        write!(output, "{question}").map_err(ConfigError::Prompt)?;
        output.flush().map_err(ConfigError::Prompt)?;

        let mut answer = String::new();
        let read = input.read_line(&mut answer).map_err(ConfigError::Prompt)?;
        if read == 0 {
            return Err(ConfigError::Prompt(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "input closed before an answer was given",
            )));
        }
        match answer.trim().to_ascii_lowercase().as_str() {
            "y" => return Ok(true),
            "n" => return Ok(false),
            _ => question = "Enter 'y' or 'n': ",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn args(extra: &[&str]) -> NormalizeArgs {
        let mut argv = vec!["crest-normalize"];
        argv.extend_from_slice(extra);
        NormalizeArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn parses_short_flags_and_negative_target() {
        let parsed = args(&["-i", "music", "-t", "-3dB"]);
        assert_eq!(parsed.input, PathBuf::from("music"));
        assert_eq!(parsed.target, "-3dB");
        assert_eq!(parsed.log_file, PathBuf::from(DEFAULT_LEDGER_FILE));
        assert_eq!(parsed.ledger_sync, LedgerSync::EndOfRun);
        assert!(!parsed.reset_log);
    }

    #[test]
    fn parses_long_flags() {
        let parsed = args(&[
            "--input",
            "music",
            "--target=-1.5",
            "--no-backup",
            "--log-file",
            "done.log",
            "--reset-log",
            "--ledger-sync",
            "per-file",
        ]);
        assert!(parsed.no_backup);
        assert!(parsed.reset_log);
        assert_eq!(parsed.log_file, PathBuf::from("done.log"));
        assert_eq!(parsed.ledger_sync, LedgerSync::PerFile);
    }

    #[test]
    fn input_and_target_are_required() {
        assert!(NormalizeArgs::try_parse_from(["crest-normalize", "-i", "x"]).is_err());
        assert!(NormalizeArgs::try_parse_from(["crest-normalize", "-t", "-3dB"]).is_err());
    }

    #[test]
    fn conflicting_backup_flags_fail_first() {
        let parsed = args(&["-i", "/definitely/missing", "-t", "bogus", "--backup", "--no-backup"]);
        let err = parsed
            .resolve(&mut Cursor::new(""), &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, ConfigError::ConflictingBackupFlags));
    }

    #[test]
    fn missing_input_is_reported() {
        let parsed = args(&["-i", "/definitely/missing", "-t", "-3dB", "--no-backup"]);
        let err = parsed
            .resolve(&mut Cursor::new(""), &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, ConfigError::InputNotFound(_)));
    }

    #[test]
    fn bad_target_is_reported() {
        let dir = tempdir().unwrap();
        let input = dir.path().to_str().unwrap();
        let parsed = args(&["-i", input, "-t", "loud", "--no-backup"]);
        let err = parsed
            .resolve(&mut Cursor::new(""), &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTarget(_)));
    }

    #[test]
    fn forced_flags_skip_the_prompt() {
        let dir = tempdir().unwrap();
        let input = dir.path().to_str().unwrap();
        let mut out = Vec::new();
        let config = args(&["-i", input, "-t", "-3dB", "--backup"])
            .resolve(&mut Cursor::new(""), &mut out)
            .unwrap();
        assert!(config.backup);
        assert_eq!(config.target.dbfs(), -3.0);
        assert!(out.is_empty());
    }

    #[test]
    fn prompt_repeats_until_yes_or_no() {
        let mut out = Vec::new();
        let answer = prompt_backup(&mut Cursor::new("maybe\n\nY\n"), &mut out).unwrap();
        assert!(answer);
        let shown = String::from_utf8(out).unwrap();
        assert!(shown.starts_with("Create backup? (y/n): "));
        assert_eq!(shown.matches("Enter 'y' or 'n': ").count(), 2);

        assert!(!prompt_backup(&mut Cursor::new("N\n"), &mut Vec::new()).unwrap());
    }

    #[test]
    fn prompt_fails_on_closed_input() {
        let err = prompt_backup(&mut Cursor::new("what\n"), &mut Vec::new()).unwrap_err();
        assert!(matches!(err, ConfigError::Prompt(_)));
    }
}
