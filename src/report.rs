//! Structured run events and the reporter seam.
//!
//! The sorting pipeline only produces [`RunEvent`] values. Turning them into
//! text, colours or log lines is up to a [`RunReporter`] implementation
//! (see [`crate::output`]).

use crate::date_key::DateKey;
use crate::mover::{RunMode, RunTotals};
use crate::policy::SkipReason;
use std::path::PathBuf;

/// Settings echoed at the start of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunHeader {
    pub source_dir: PathBuf,
    pub target_dir: PathBuf,
    pub log_file: PathBuf,
    pub backup: bool,
    /// Normalized include extensions; empty means all.
    pub include: Vec<String>,
    /// Normalized exclude extensions; empty means none.
    pub exclude: Vec<String>,
    pub strict_dates: bool,
    pub mode: RunMode,
}

/// One observable state transition of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    RunStarted(RunHeader),
    /// Number of files classified for this run.
    FilesFound { count: usize },
    /// The source directory held no files to sort.
    NothingToMove,
    /// The name's digit prefix was not a date; the modification time was used.
    DatePrefixIgnored { name: String, date: DateKey },
    DirectoryCreated { date: DateKey, path: PathBuf },
    DirectoryExisting { date: DateKey, path: PathBuf },
    FileSkipped {
        name: String,
        date: DateKey,
        reason: SkipReason,
        /// Lowercased extension with its dot, or `""`.
        extension: String,
    },
    FileMoved {
        name: String,
        date: DateKey,
        destination: PathBuf,
        backed_up: bool,
    },
    /// A per-file I/O failure; the run carried on.
    FileFailed {
        name: String,
        /// `None` when the file could not be dated at all.
        date: Option<DateKey>,
        error: String,
    },
    RunFinished(RunTotals),
    /// The run stopped before moving anything.
    Fatal { message: String },
}

impl RunEvent {
    /// Whether this event concludes the handling of a single file.
    pub fn is_file_outcome(&self) -> bool {
        matches!(
            self,
            RunEvent::FileSkipped { .. } | RunEvent::FileMoved { .. } | RunEvent::FileFailed { .. }
        )
    }
}

/// Receives run events in the order they happen.
pub trait RunReporter {
    fn report(&mut self, event: &RunEvent);
}

/// Collects events in memory.
impl RunReporter for Vec<RunEvent> {
    fn report(&mut self, event: &RunEvent) {
        self.push(event.clone());
    }
}

impl<R: RunReporter + ?Sized> RunReporter for &mut R {
    fn report(&mut self, event: &RunEvent) {
        (**self).report(event);
    }
}

impl<R: RunReporter + ?Sized> RunReporter for Box<R> {
    fn report(&mut self, event: &RunEvent) {
        (**self).report(event);
    }
}
