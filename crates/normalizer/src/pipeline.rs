use std::fmt;
use std::path::Path;

use crest_audio::{apply_gain, measure_peak_dbfs, AudioCodec, CodecError};
use crest_domain::TargetLevel;
use tracing::{debug, info, instrument, warn};

use crate::backup::backup_all;
use crate::config::RunConfig;
use crate::error::{LedgerError, RunError};
use crate::ledger::{relative_key, Ledger, LedgerSync};
use crate::scan::candidate_files;

/// Terminal state of one candidate file.
#[derive(Debug)]
pub enum FileOutcome {
    Normalized { peak_dbfs: f64, gain_db: f64 },
    AlreadyProcessed,
    Silent,
    /// Decoded, but a sample was infinite so no finite gain exists.
    InvalidPeak { peak_dbfs: f64 },
    DecodeFailed(CodecError),
    EncodeFailed(CodecError),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub normalized: usize,
    pub already_processed: usize,
    pub silent: usize,
    /// Files whose relative path cannot be written to the ledger.
    pub ignored: usize,
    pub invalid_peak: usize,
    pub decode_failed: usize,
    pub encode_failed: usize,
    pub ledger_appended: usize,
    pub backed_up: Option<usize>,
    pub backup_failures: usize,
}

impl RunSummary {
    pub fn skipped(&self) -> usize {
        self.already_processed + self.silent + self.ignored
    }

    pub fn errored(&self) -> usize {
        self.invalid_peak + self.decode_failed + self.encode_failed
    }

    fn count(&mut self, outcome: &FileOutcome) {
        match outcome {
            FileOutcome::Normalized { .. } => self.normalized += 1,
            FileOutcome::AlreadyProcessed => self.already_processed += 1,
            FileOutcome::Silent => self.silent += 1,
            FileOutcome::InvalidPeak { .. } => self.invalid_peak += 1,
            FileOutcome::DecodeFailed(_) => self.decode_failed += 1,
            FileOutcome::EncodeFailed(_) => self.encode_failed += 1,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} normalized, {} skipped ({} already processed, {} silent, {} ignored), {} errors",
            self.normalized,
            self.skipped(),
            self.already_processed,
            self.silent,
            self.ignored,
            self.errored()
        )
    }
}

/// Walks a tree and brings every unprocessed candidate to the target peak.
pub struct BatchOrchestrator<C> {
    codec: C,
    target: TargetLevel,
    sync: LedgerSync,
}

impl<C: AudioCodec> BatchOrchestrator<C> {
    pub fn new(codec: C, target: TargetLevel, sync: LedgerSync) -> Self {
        Self {
            codec,
            target,
            sync,
        }
    }

    /// Processes every candidate under `root`. Only ledger I/O can fail the run;
    /// per-file problems are logged and counted.
    #[instrument(skip_all, fields(root = %root.display(), target = %self.target))]
    pub fn run(&self, root: &Path, ledger: &mut Ledger) -> Result<RunSummary, LedgerError> {
        let mut summary = RunSummary::default();
        debug!(known = ledger.len(), "starting walk");
        for path in candidate_files(root) {
            let Some(key) = relative_key(root, &path) else {
                warn!(file = %path.display(), "path cannot be recorded in the ledger, skipping");
                summary.ignored += 1;
                continue;
            };
            let outcome = self.process_file(&path, &key, ledger);
            summary.count(&outcome);
            if let FileOutcome::Normalized { .. } = outcome {
                ledger.record(key);
                if self.sync == LedgerSync::PerFile {
                    summary.ledger_appended += ledger.flush()?;
                }
            }
        }
        summary.ledger_appended += ledger.flush()?;

        if summary.ledger_appended > 0 {
            info!(
                ledger = %ledger.path().display(),
                count = summary.ledger_appended,
                "ledger updated with new entries"
            );
        } else {
            info!("no new files processed");
        }
        Ok(summary)
    }

    /// Takes one file through ledger check, decode, measure, gain and encode.
    /// Never touches the ledger.
    pub fn process_file(&self, path: &Path, key: &str, ledger: &Ledger) -> FileOutcome {
        let name = display_name(path);
        if ledger.contains(key) {
            info!(file = %name, "skipping already processed file");
            return FileOutcome::AlreadyProcessed;
        }

        let buffer = match self.codec.decode(path) {
            Ok(buffer) => buffer,
            Err(err) => {
                warn!(file = %name, error = %err, "error loading file");
                return FileOutcome::DecodeFailed(err);
            }
        };
        let peak_dbfs = measure_peak_dbfs(&buffer);
        if peak_dbfs.is_nan() || peak_dbfs == f64::INFINITY {
            warn!(file = %name, peak_dbfs, "peak is not finite, leaving file untouched");
            return FileOutcome::InvalidPeak { peak_dbfs };
        }
        let Some(gain_db) = self.target.required_gain(peak_dbfs) else {
            info!(file = %name, "skipping silent file");
            return FileOutcome::Silent;
        };

        let normalized = apply_gain(&buffer, gain_db);
        match self.codec.encode(&normalized, path) {
            Ok(()) => {
                info!(file = %name, peak_dbfs, "normalized {name} ({gain_db:+.1} dB)");
                FileOutcome::Normalized { peak_dbfs, gain_db }
            }
            Err(err) => {
                warn!(file = %name, error = %err, "error normalizing file");
                FileOutcome::EncodeFailed(err)
            }
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Runs a resolved configuration end to end: ledger load or reset, optional backup,
/// then the normalization walk.
pub fn execute<C: AudioCodec>(config: &RunConfig, codec: C) -> Result<RunSummary, RunError> {
    let mut ledger = Ledger::open(&config.ledger_path, config.reset_ledger)?;
    let backup = if config.backup {
        Some(backup_all(&config.input)?)
    } else {
        None
    };

    let orchestrator = BatchOrchestrator::new(codec, config.target, config.ledger_sync);
    let mut summary = orchestrator.run(&config.input, &mut ledger)?;
    if let Some(report) = backup {
        summary.backed_up = Some(report.copied);
        summary.backup_failures = report.failures.len();
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::fs;
    use std::path::PathBuf;

    use approx::assert_abs_diff_eq;
    use crest_audio::AudioBuffer;
    use crest_domain::SampleFormat;
    use tempfile::tempdir;

    /// In-memory codec: decodes from a map, remembers what was encoded.
    #[derive(Default)]
    struct FakeCodec {
        inputs: HashMap<PathBuf, AudioBuffer>,
        fail_encode: bool,
        written: RefCell<Vec<(PathBuf, AudioBuffer)>>,
    }

    impl FakeCodec {
        fn with(mut self, path: PathBuf, samples: Vec<f64>) -> Self {
            let buffer = AudioBuffer::new(44_100, 1, SampleFormat::S16, samples);
            self.inputs.insert(path, buffer);
            self
        }
    }

    impl AudioCodec for &FakeCodec {
        fn decode(&self, path: &Path) -> Result<AudioBuffer, CodecError> {
            self.inputs
                .get(path)
                .cloned()
                .ok_or_else(|| CodecError::NoTrack {
                    path: path.to_path_buf(),
                })
        }

        fn encode(&self, buffer: &AudioBuffer, path: &Path) -> Result<(), CodecError> {
            if self.fail_encode {
                return Err(CodecError::Write {
                    path: path.to_path_buf(),
                    source: std::io::Error::other("disk full"),
                });
            }
            self.written
                .borrow_mut()
                .push((path.to_path_buf(), buffer.clone()));
            Ok(())
        }
    }

    fn touch(root: &Path, name: &str) -> PathBuf {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, b"stub").unwrap();
        path
    }

    fn target(db: f64) -> TargetLevel {
        TargetLevel::new(db).unwrap()
    }

    #[test]
    fn normalizes_and_records_relative_paths() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("music");
        let quiet = touch(&root, "quiet.wav");
        let nested = touch(&root, "b/c.wav");
        let codec = FakeCodec::default()
            .with(quiet.clone(), vec![3276.8, -10.0])
            .with(nested, vec![16384.0]);
        let ledger_path = dir.path().join("ledger.log");
        let mut ledger = Ledger::open(&ledger_path, false).unwrap();

        let summary = BatchOrchestrator::new(&codec, target(-3.0), LedgerSync::EndOfRun)
            .run(&root, &mut ledger)
            .unwrap();

        assert_eq!(summary.normalized, 2);
        assert_eq!(summary.ledger_appended, 2);
        assert_eq!(fs::read_to_string(&ledger_path).unwrap(), "b/c.wav\nquiet.wav\n");
        let written = codec.written.borrow();
        let (path, buffer) = written.iter().find(|(p, _)| *p == quiet).unwrap();
        assert_eq!(path, &quiet);
        assert_abs_diff_eq!(measure_peak_dbfs(buffer), -3.0, epsilon = 1e-9);
    }

    #[test]
    fn silent_and_undecodable_files_stay_out_of_ledger() {
        let dir = tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let silence = touch(&root, "silence.wav");
        touch(&root, "broken.mp3");
        touch(&root, "readme.txt");
        let codec = FakeCodec::default().with(silence, vec![0.0; 32]);
        let ledger_path = dir.path().join("ledger.log");
        let mut ledger = Ledger::open(&ledger_path, false).unwrap();

        let summary = BatchOrchestrator::new(&codec, target(-3.0), LedgerSync::EndOfRun)
            .run(&root, &mut ledger)
            .unwrap();

        assert_eq!(summary.silent, 1);
        assert_eq!(summary.decode_failed, 1);
        assert_eq!(summary.normalized, 0);
        assert!(codec.written.borrow().is_empty());
        assert!(!ledger_path.exists());
    }

    #[test]
    fn failed_encode_is_retried_next_time() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("in");
        let song = touch(&root, "song.wav");
        let codec = FakeCodec {
            fail_encode: true,
            ..FakeCodec::default()
        }
        .with(song, vec![1000.0]);
        let ledger_path = dir.path().join("ledger.log");
        let mut ledger = Ledger::open(&ledger_path, false).unwrap();

        let summary = BatchOrchestrator::new(&codec, target(-1.0), LedgerSync::PerFile)
            .run(&root, &mut ledger)
            .unwrap();

        assert_eq!(summary.encode_failed, 1);
        assert_eq!(summary.errored(), 1);
        assert!(!ledger.contains("song.wav"));
        assert!(!ledger_path.exists());
    }

    #[test]
    fn ledger_entries_are_skipped() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("in");
        let song = touch(&root, "song.wav");
        let codec = FakeCodec::default().with(song, vec![1000.0]);
        let ledger_path = dir.path().join("ledger.log");
        fs::write(&ledger_path, "song.wav\n").unwrap();
        let mut ledger = Ledger::open(&ledger_path, false).unwrap();

        let summary = BatchOrchestrator::new(&codec, target(-1.0), LedgerSync::EndOfRun)
            .run(&root, &mut ledger)
            .unwrap();

        assert_eq!(summary.already_processed, 1);
        assert_eq!(summary.ledger_appended, 0);
        assert!(codec.written.borrow().is_empty());
        assert_eq!(fs::read_to_string(&ledger_path).unwrap(), "song.wav\n");
    }

    #[test]
    fn per_file_sync_writes_as_it_goes() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("in");
        let a = touch(&root, "a.wav");
        let b = touch(&root, "b.wav");
        let codec = FakeCodec::default()
            .with(a, vec![100.0])
            .with(b, vec![200.0]);
        let ledger_path = dir.path().join("ledger.log");
        let mut ledger = Ledger::open(&ledger_path, false).unwrap();

        let summary = BatchOrchestrator::new(&codec, target(-6.0), LedgerSync::PerFile)
            .run(&root, &mut ledger)
            .unwrap();

        assert_eq!(summary.ledger_appended, 2);
        assert!(ledger.pending().is_empty());
        assert_eq!(fs::read_to_string(&ledger_path).unwrap(), "a.wav\nb.wav\n");
    }

    #[test]
    fn summary_display_reports_counts() {
        let summary = RunSummary {
            normalized: 3,
            already_processed: 2,
            silent: 1,
            decode_failed: 1,
            ..RunSummary::default()
        };
        assert_eq!(
            summary.to_string(),
            "3 normalized, 3 skipped (2 already processed, 1 silent, 0 ignored), 1 errors"
        );
        let with_ignored = RunSummary {
            ignored: 2,
            invalid_peak: 1,
            ..summary
        };
        assert_eq!(
            with_ignored.to_string(),
            "3 normalized, 5 skipped (2 already processed, 1 silent, 2 ignored), 2 errors"
        );
    }

    #[test]
    fn infinite_peak_is_an_error_not_silence() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("in");
        let hot = touch(&root, "hot.wav");
        let codec = FakeCodec::default().with(hot.clone(), vec![0.5, f64::INFINITY]);
        let ledger_path = dir.path().join("ledger.log");
        let mut ledger = Ledger::open(&ledger_path, false).unwrap();

        let orchestrator = BatchOrchestrator::new(&codec, target(-3.0), LedgerSync::EndOfRun);
        let outcome = orchestrator.process_file(&hot, "hot.wav", &ledger);
        assert!(matches!(
            outcome,
            FileOutcome::InvalidPeak { peak_dbfs } if peak_dbfs == f64::INFINITY
        ));

        let summary = orchestrator.run(&root, &mut ledger).unwrap();
        assert_eq!(summary.invalid_peak, 1);
        assert_eq!(summary.silent, 0);
        assert_eq!(summary.errored(), 1);
        assert!(codec.written.borrow().is_empty());
        assert!(!ledger_path.exists());
    }

    #[test]
    fn whitespace_padded_names_are_counted_as_ignored() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("in");
        let padded = touch(&root, " intro.wav");
        let plain = touch(&root, "song.wav");
        let codec = FakeCodec::default()
            .with(padded, vec![1000.0])
            .with(plain, vec![1000.0]);
        let mut ledger = Ledger::open(dir.path().join("ledger.log"), false).unwrap();

        let summary = BatchOrchestrator::new(&codec, target(-3.0), LedgerSync::EndOfRun)
            .run(&root, &mut ledger)
            .unwrap();

        assert_eq!(summary.ignored, 1);
        assert_eq!(summary.normalized, 1);
        assert!(summary.to_string().contains("1 ignored"));
    }
}
