pub mod backup;
pub mod config;
pub mod error;
pub mod ledger;
pub mod pipeline;
pub mod scan;

pub use backup::{backup_all, BackupReport, BACKUP_DIR_NAME};
pub use config::{NormalizeArgs, RunConfig};
pub use error::{BackupError, ConfigError, LedgerError, RunError};
pub use ledger::{Ledger, LedgerSync, DEFAULT_LEDGER_FILE};
pub use pipeline::{execute, BatchOrchestrator, FileOutcome, RunSummary};
