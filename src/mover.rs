//! Moves classified files into their date directories.
//!
//! For each date group the destination directory is created (or reused),
//! every file is checked against the [`TransferPolicy`], backed up when a
//! [`BackupSink`] is configured, and then moved. Per-file failures are
//! reported and counted; they never stop the run.

use crate::backup::{BackupSink, copy_preserving_times};
use crate::classifier::{FileEntry, GroupedFiles};
use crate::date_key::DateKey;
use crate::policy::{TransferDecision, TransferPolicy, extension_of};
use crate::report::{RunEvent, RunReporter};
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Whether a run touches the filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    Apply,
    /// Evaluate and report everything, but create, copy and move nothing.
    DryRun,
}

impl RunMode {
    pub fn is_dry_run(&self) -> bool {
        matches!(self, RunMode::DryRun)
    }
}

/// Per-run file accounting. `moved <= found` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunTotals {
    pub found: usize,
    pub moved: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunTotals {
    /// True when every file found was moved.
    pub fn is_complete(&self) -> bool {
        self.moved == self.found
    }
}

/// Errors raised while moving files.
#[derive(Debug, thiserror::Error)]
pub enum MoveError {
    #[error("failed to create directory {}: {source}", path.display())]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to back up {} into {}: {source}", file.display(), backup_dir.display())]
    Backup {
        file: PathBuf,
        backup_dir: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to move {} to {}: {source}", from.display(), to.display())]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Moves `from` to `to`, copying and deleting when they sit on different volumes.
pub fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
            debug!(from = %from.display(), to = %to.display(), "rename crosses devices, copying");
            copy_preserving_times(from, to)?;
            fs::remove_file(from)
        }
        Err(err) => Err(err),
    }
}

/// Orchestrates directory creation, policy checks, backups and moves.
#[derive(Debug, Clone)]
pub struct Mover {
    target_dir: PathBuf,
    policy: TransferPolicy,
    backup: Option<BackupSink>,
    mode: RunMode,
}

impl Mover {
    pub fn new(target_dir: impl Into<PathBuf>, policy: TransferPolicy) -> Self {
        Self {
            target_dir: target_dir.into(),
            policy,
            backup: None,
            mode: RunMode::Apply,
        }
    }

    pub fn with_backup(mut self, backup: Option<BackupSink>) -> Self {
        self.backup = backup;
        self
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    /// Moves every eligible file of `grouped` into `target/<YYYY_MM_DD>/<name>`.
    ///
    /// # Errors
    ///
    /// Only a failure to create the backup directory is fatal; it happens
    /// before any file is touched. Everything else is reported through
    /// `reporter` and counted in the returned totals.
    pub fn run(
        &self,
        grouped: &GroupedFiles,
        reporter: &mut dyn RunReporter,
    ) -> Result<RunTotals, MoveError> {
        let mut totals = RunTotals {
            found: grouped.total_files(),
            ..RunTotals::default()
        };
        reporter.report(&RunEvent::FilesFound {
            count: totals.found,
        });

        if totals.found == 0 {
            reporter.report(&RunEvent::NothingToMove);
            reporter.report(&RunEvent::RunFinished(totals));
            return Ok(totals);
        }

        for file in grouped.undated() {
            totals.failed += 1;
            reporter.report(&RunEvent::FileFailed {
                name: file.name.clone(),
                date: None,
                error: file.error.clone(),
            });
        }

        if let Some(sink) = &self.backup
            && !self.mode.is_dry_run()
        {
            sink.ensure_dir()
                .map_err(|source| MoveError::DirectoryCreation {
                    path: sink.dir().to_path_buf(),
                    source,
                })?;
        }

        for (date, files) in grouped.iter() {
            let date_dir = self.target_dir.join(date.dir_name());

            if let Err(err) = self.prepare_date_dir(*date, &date_dir, reporter) {
                warn!(error = %err, "skipping date group");
                for file in files {
                    totals.failed += 1;
                    reporter.report(&RunEvent::FileFailed {
                        name: file.name.clone(),
                        date: Some(*date),
                        error: err.to_string(),
                    });
                }
                continue;
            }

            for file in files {
                let destination = date_dir.join(file_name_of(file));

                match self.policy.evaluate(&file.name, &destination) {
                    TransferDecision::Skip(reason) => {
                        totals.skipped += 1;
                        reporter.report(&RunEvent::FileSkipped {
                            name: file.name.clone(),
                            date: *date,
                            reason,
                            extension: extension_of(&file.name),
                        });
                    }
                    TransferDecision::Eligible => match self.transfer(file, &destination) {
                        Ok(backed_up) => {
                            totals.moved += 1;
                            reporter.report(&RunEvent::FileMoved {
                                name: file.name.clone(),
                                date: *date,
                                destination,
                                backed_up,
                            });
                        }
                        Err(err) => {
                            warn!(file = %file.name, error = %err, "file left in place");
                            totals.failed += 1;
                            reporter.report(&RunEvent::FileFailed {
                                name: file.name.clone(),
                                date: Some(*date),
                                error: err.to_string(),
                            });
                        }
                    },
                }
            }
        }

        reporter.report(&RunEvent::RunFinished(totals));
        Ok(totals)
    }

    fn prepare_date_dir(
        &self,
        date: DateKey,
        path: &Path,
        reporter: &mut dyn RunReporter,
    ) -> Result<(), MoveError> {
        if path.is_dir() {
            reporter.report(&RunEvent::DirectoryExisting {
                date,
                path: path.to_path_buf(),
            });
            return Ok(());
        }

        if !self.mode.is_dry_run() {
            fs::create_dir_all(path).map_err(|source| MoveError::DirectoryCreation {
                path: path.to_path_buf(),
                source,
            })?;
        }
        reporter.report(&RunEvent::DirectoryCreated {
            date,
            path: path.to_path_buf(),
        });
        Ok(())
    }

    /// Backs up (when configured) and moves one eligible file. Returns whether a backup was taken.
    fn transfer(&self, file: &FileEntry, destination: &Path) -> Result<bool, MoveError> {
        if self.mode.is_dry_run() {
            return Ok(self.backup.is_some());
        }

        let backed_up = match &self.backup {
            Some(sink) => {
                sink.store(&file.path).map_err(|source| MoveError::Backup {
                    file: file.path.clone(),
                    backup_dir: sink.dir().to_path_buf(),
                    source,
                })?;
                true
            }
            None => false,
        };

        move_file(&file.path, destination).map_err(|source| MoveError::Move {
            from: file.path.clone(),
            to: destination.to_path_buf(),
            source,
        })?;
        Ok(backed_up)
    }
}

fn file_name_of(file: &FileEntry) -> &OsStr {
    file.path
        .file_name()
        .unwrap_or_else(|| OsStr::new(&file.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::BACKUP_DIR_NAME;
    use crate::classifier::{FileClassifier, UndatedFile};
    use crate::date_key::DateKeyResolver;
    use crate::policy::SkipReason;
    use chrono::{Local, TimeZone};
    use filetime::FileTime;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn write_with_mtime(dir: &Path, name: &str, content: &str, y: i32, m: u32, d: u32) {
        let path = dir.join(name);
        fs::write(&path, content).expect("Failed to write test file");
        let when = Local
            .with_ymd_and_hms(y, m, d, 12, 0, 0)
            .single()
            .expect("unambiguous local time");
        filetime::set_file_mtime(&path, FileTime::from_unix_time(when.timestamp(), 0))
            .expect("Failed to set mtime");
    }

    fn classify(dir: &Path) -> GroupedFiles {
        FileClassifier::new(dir, DateKeyResolver::new())
            .classify()
            .expect("classification failed")
    }

    fn exclude(items: &[&str]) -> TransferPolicy {
        TransferPolicy::new(
            BTreeSet::new(),
            items.iter().map(|s| s.to_string()).collect(),
        )
        .unwrap()
    }

    fn scenario(dir: &Path) {
        write_with_mtime(dir, "20230115_report.pdf", "report", 2024, 4, 4);
        write_with_mtime(dir, "photo.jpg", "photo", 2023, 2, 1);
        fs::create_dir(dir.join("archive")).unwrap();
    }

    #[test]
    fn test_moves_into_date_directories_with_backup() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        scenario(base);

        let mover = Mover::new(base, TransferPolicy::allow_all())
            .with_backup(Some(BackupSink::in_target(base)));
        let mut events = Vec::new();
        let totals = mover.run(&classify(base), &mut events).unwrap();

        assert_eq!(totals.found, 2);
        assert_eq!(totals.moved, 2);
        assert!(totals.is_complete());
        assert!(base.join("2023_01_15").join("20230115_report.pdf").is_file());
        assert!(base.join("2023_02_01").join("photo.jpg").is_file());
        assert!(!base.join("photo.jpg").exists());
        assert_eq!(
            fs::read_to_string(base.join(BACKUP_DIR_NAME).join("photo.jpg")).unwrap(),
            "photo"
        );
        assert!(base.join(BACKUP_DIR_NAME).join("20230115_report.pdf").is_file());
        assert!(base.join("archive").is_dir());

        assert_eq!(events.first(), Some(&RunEvent::FilesFound { count: 2 }));
        assert_eq!(events.last(), Some(&RunEvent::RunFinished(totals)));
        assert!(events.iter().any(|e| matches!(
            e,
            RunEvent::FileMoved { name, backed_up: true, .. } if name == "photo.jpg"
        )));
    }

    #[test]
    fn test_second_run_finds_nothing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        scenario(base);

        let mover = Mover::new(base, TransferPolicy::allow_all())
            .with_backup(Some(BackupSink::in_target(base)));
        mover.run(&classify(base), &mut Vec::new()).unwrap();

        let mut events = Vec::new();
        let totals = mover.run(&classify(base), &mut events).unwrap();

        assert_eq!(totals, RunTotals::default());
        assert!(events.contains(&RunEvent::NothingToMove));
    }

    #[test]
    fn test_existing_destination_is_skipped() {
        let source = TempDir::new().expect("Failed to create temp directory");
        let target = TempDir::new().expect("Failed to create temp directory");
        write_with_mtime(source.path(), "20230115_report.pdf", "new", 2023, 1, 15);
        fs::create_dir(target.path().join("2023_01_15")).unwrap();
        fs::write(target.path().join("2023_01_15").join("20230115_report.pdf"), "old").unwrap();

        let mover = Mover::new(target.path(), TransferPolicy::allow_all())
            .with_backup(Some(BackupSink::in_target(target.path())));
        let mut events = Vec::new();
        let totals = mover.run(&classify(source.path()), &mut events).unwrap();

        assert_eq!(totals.moved, 0);
        assert_eq!(totals.skipped, 1);
        assert!(!totals.is_complete());
        assert!(source.path().join("20230115_report.pdf").exists());
        assert_eq!(
            fs::read_to_string(target.path().join("2023_01_15").join("20230115_report.pdf"))
                .unwrap(),
            "old"
        );
        // Skipped files are never backed up.
        assert!(!target.path().join(BACKUP_DIR_NAME).join("20230115_report.pdf").exists());
        assert!(events.iter().any(|e| matches!(
            e,
            RunEvent::DirectoryExisting { .. }
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            RunEvent::FileSkipped { reason: SkipReason::Exists, .. }
        )));
    }

    #[test]
    fn test_excluded_extension_stays_in_place() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        scenario(base);

        let mover = Mover::new(base, exclude(&[".jpg"]));
        let mut events = Vec::new();
        let totals = mover.run(&classify(base), &mut events).unwrap();

        assert_eq!((totals.found, totals.moved, totals.skipped), (2, 1, 1));
        assert!(base.join("photo.jpg").exists());
        assert!(base.join("2023_01_15").join("20230115_report.pdf").exists());
        assert!(!base.join(BACKUP_DIR_NAME).exists());
        assert!(events.iter().any(|e| matches!(
            e,
            RunEvent::FileSkipped { name, reason: SkipReason::Excluded, extension, .. }
                if name == "photo.jpg" && extension == ".jpg"
        )));
    }

    #[test]
    fn test_dry_run_changes_nothing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        scenario(base);

        let mover = Mover::new(base, TransferPolicy::allow_all())
            .with_backup(Some(BackupSink::in_target(base)))
            .with_mode(RunMode::DryRun);
        let mut events = Vec::new();
        let totals = mover.run(&classify(base), &mut events).unwrap();

        assert_eq!(totals.moved, 2);
        assert!(base.join("photo.jpg").exists());
        assert!(base.join("20230115_report.pdf").exists());
        assert!(!base.join("2023_02_01").exists());
        assert!(!base.join(BACKUP_DIR_NAME).exists());
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, RunEvent::DirectoryCreated { .. }))
                .count(),
            2
        );
    }

    #[test]
    fn test_blocked_date_directory_fails_only_its_group() {
        let source = TempDir::new().expect("Failed to create temp directory");
        let target = TempDir::new().expect("Failed to create temp directory");
        write_with_mtime(source.path(), "20230115_a.txt", "a", 2023, 1, 15);
        write_with_mtime(source.path(), "20230115_b.txt", "b", 2023, 1, 15);
        write_with_mtime(source.path(), "20230116_c.txt", "c", 2023, 1, 16);
        // A plain file where the date directory should go.
        fs::write(target.path().join("2023_01_15"), "blocker").unwrap();

        let mover = Mover::new(target.path(), TransferPolicy::allow_all());
        let mut events = Vec::new();
        let totals = mover.run(&classify(source.path()), &mut events).unwrap();

        assert_eq!(totals.found, 3);
        assert_eq!(totals.failed, 2);
        assert_eq!(totals.moved, 1);
        assert!(source.path().join("20230115_a.txt").exists());
        assert!(target.path().join("2023_01_16").join("20230116_c.txt").exists());
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, RunEvent::FileFailed { .. }))
                .count(),
            2
        );
    }

    #[test]
    fn test_failed_backup_leaves_file_and_run_continues() {
        let source = TempDir::new().expect("Failed to create temp directory");
        let target = TempDir::new().expect("Failed to create temp directory");
        write_with_mtime(source.path(), "20230115_a.txt", "a", 2023, 1, 15);
        write_with_mtime(source.path(), "20230115_b.txt", "b", 2023, 1, 15);
        // A directory squatting on the backup name makes the copy fail.
        fs::create_dir_all(target.path().join(BACKUP_DIR_NAME).join("20230115_a.txt")).unwrap();

        let mover = Mover::new(target.path(), TransferPolicy::allow_all())
            .with_backup(Some(BackupSink::in_target(target.path())));
        let mut events = Vec::new();
        let totals = mover.run(&classify(source.path()), &mut events).unwrap();

        assert_eq!((totals.found, totals.moved, totals.failed), (2, 1, 1));
        assert!(source.path().join("20230115_a.txt").exists());
        assert!(!target.path().join("2023_01_15").join("20230115_a.txt").exists());
        assert!(target.path().join("2023_01_15").join("20230115_b.txt").is_file());
        assert!(target.path().join(BACKUP_DIR_NAME).join("20230115_b.txt").is_file());

        let failed = events
            .iter()
            .position(|e| matches!(e, RunEvent::FileFailed { name, .. } if name == "20230115_a.txt"))
            .expect("backup failure should be reported");
        let moved = events
            .iter()
            .position(|e| matches!(e, RunEvent::FileMoved { name, .. } if name == "20230115_b.txt"))
            .expect("later file should still move");
        assert!(failed < moved);
        assert!(matches!(
            &events[failed],
            RunEvent::FileFailed { date: Some(date), .. } if date.dir_name() == "2023_01_15"
        ));
    }

    #[test]
    fn test_undated_files_are_reported_as_failed() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        write_with_mtime(base, "20230115_report.pdf", "report", 2023, 1, 15);
        let grouped = classify(base).with_undated(vec![UndatedFile {
            name: "locked.txt".to_string(),
            path: base.join("locked.txt"),
            error: "permission denied".to_string(),
        }]);

        let mut events = Vec::new();
        let totals = Mover::new(base, TransferPolicy::allow_all())
            .run(&grouped, &mut events)
            .unwrap();

        assert_eq!((totals.found, totals.moved, totals.failed), (2, 1, 1));
        assert!(events.contains(&RunEvent::FileFailed {
            name: "locked.txt".to_string(),
            date: None,
            error: "permission denied".to_string(),
        }));
        assert!(base.join("2023_01_15").join("20230115_report.pdf").is_file());
    }

    #[test]
    fn test_events_follow_group_order() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        write_with_mtime(base, "20230301_b.txt", "b", 2020, 1, 1);
        write_with_mtime(base, "20230101_a.txt", "a", 2020, 1, 1);
        write_with_mtime(base, "20230301_a.txt", "a", 2020, 1, 1);

        let mut events = Vec::new();
        Mover::new(base, TransferPolicy::allow_all())
            .run(&classify(base), &mut events)
            .unwrap();

        let moved: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                RunEvent::FileMoved { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(moved, vec!["20230101_a.txt", "20230301_a.txt", "20230301_b.txt"]);
    }

    #[test]
    fn test_move_file_renames() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let from = temp_dir.path().join("a.txt");
        let to = temp_dir.path().join("b.txt");
        fs::write(&from, "data").unwrap();

        move_file(&from, &to).unwrap();

        assert!(!from.exists());
        assert_eq!(fs::read_to_string(&to).unwrap(), "data");
    }

    #[test]
    fn test_move_file_missing_source() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let result = move_file(
            &temp_dir.path().join("missing"),
            &temp_dir.path().join("elsewhere"),
        );
        assert!(result.is_err());
    }
}
