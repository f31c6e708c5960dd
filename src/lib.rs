//! datetidy - sort a flat directory into date-named subdirectories
//!
//! Each file is dated by a leading `YYYYMMDD` in its name or, failing that,
//! by its modification time. Files are grouped by that date, filtered by
//! extension, optionally backed up into `_BACKUP_`, and moved into
//! `<target>/<YYYY_MM_DD>/`. Re-running is safe: files whose destination
//! already exists are skipped, never overwritten.

pub mod backup;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod date_key;
pub mod mover;
pub mod output;
pub mod policy;
pub mod report;

pub use backup::BackupSink;
pub use classifier::{FileClassifier, FileEntry, GroupedFiles, UndatedFile};
pub use config::{ConfigError, RunSettings, SortConfig};
pub use date_key::{DateKey, DateKeyResolver};
pub use mover::{Mover, RunMode, RunTotals};
pub use policy::{SkipReason, TransferDecision, TransferPolicy};
pub use report::{RunEvent, RunReporter};

pub use cli::{Cli, run_cli, run_with_settings};
