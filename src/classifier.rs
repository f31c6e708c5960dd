//! Scans a source directory and groups its files by date.
//!
//! The listing is read once. Subdirectories and the run log itself are
//! never classified; everything else lands in exactly one date group, in
//! the global order established by each file's resolved timestamp.

use crate::date_key::{DateKey, DateKeyResolver, DateParseError, DateSource};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A file found directly inside the source directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// The file name, as shown to the user.
    pub name: String,
    /// The absolute or source-relative path the entry was listed under.
    pub path: PathBuf,
    /// The timestamp the file sorts by.
    pub sort_key: NaiveDateTime,
    pub date_source: DateSource,
}

impl FileEntry {
    pub fn date_key(&self) -> DateKey {
        DateKey::from(self.sort_key)
    }
}

/// A file whose modification time could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndatedFile {
    pub name: String,
    pub path: PathBuf,
    pub error: String,
}

/// Files bucketed by date, ascending by key, each bucket in global sort order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupedFiles {
    groups: BTreeMap<DateKey, Vec<FileEntry>>,
    undated: Vec<UndatedFile>,
}

impl GroupedFiles {
    /// Buckets `entries`, which must already be in global sort order.
    pub fn from_sorted(entries: Vec<FileEntry>) -> Self {
        let mut groups: BTreeMap<DateKey, Vec<FileEntry>> = BTreeMap::new();
        for entry in entries {
            groups.entry(entry.date_key()).or_default().push(entry);
        }
        Self {
            groups,
            undated: Vec::new(),
        }
    }

    pub fn with_undated(mut self, undated: Vec<UndatedFile>) -> Self {
        self.undated = undated;
        self
    }

    /// Total number of files found, undated ones included.
    pub fn total_files(&self) -> usize {
        self.groups.values().map(Vec::len).sum::<usize>() + self.undated.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.undated.is_empty()
    }

    /// Files left out of every group because they could not be dated.
    pub fn undated(&self) -> &[UndatedFile] {
        &self.undated
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn get(&self, key: &DateKey) -> Option<&[FileEntry]> {
        self.groups.get(key).map(Vec::as_slice)
    }

    /// File names of one group, in processing order.
    pub fn names(&self, key: &DateKey) -> Vec<&str> {
        self.get(key)
            .map(|files| files.iter().map(|f| f.name.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn keys(&self) -> impl Iterator<Item = &DateKey> {
        self.groups.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DateKey, &[FileEntry])> {
        self.groups.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// All entries, group after group.
    pub fn entries(&self) -> impl Iterator<Item = &FileEntry> {
        self.groups.values().flatten()
    }
}

/// Errors that stop classification.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("failed to read directory {}: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Date(#[from] DateParseError),
}

/// Groups the files of one directory by their date key.
#[derive(Debug, Clone)]
pub struct FileClassifier {
    source_dir: PathBuf,
    log_file: Option<PathBuf>,
    resolver: DateKeyResolver,
}

impl FileClassifier {
    pub fn new(source_dir: impl Into<PathBuf>, resolver: DateKeyResolver) -> Self {
        Self {
            source_dir: source_dir.into(),
            log_file: None,
            resolver,
        }
    }

    /// Sets the run log path so the log is never classified as a file to sort.
    pub fn with_log_file(mut self, log_file: impl Into<PathBuf>) -> Self {
        self.log_file = Some(log_file.into());
        self
    }

    /// Lists the source directory and returns its files grouped by date.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be listed, or on an invalid prefix in
    /// strict mode. A file whose modification time cannot be read is kept
    /// aside in [`GroupedFiles::undated`] instead.
    pub fn classify(&self) -> Result<GroupedFiles, ClassifyError> {
        let listing = fs::read_dir(&self.source_dir).map_err(|source| ClassifyError::ReadDir {
            path: self.source_dir.clone(),
            source,
        })?;

        let log_identity = self.log_identity();
        let mut files = Vec::new();
        let mut undated = Vec::new();

        for entry in listing {
            let entry = entry.map_err(|source| ClassifyError::ReadDir {
                path: self.source_dir.clone(),
                source,
            })?;
            let path = entry.path();

            // Follows symlinks, so a link to a directory is skipped too.
            if path.is_dir() {
                debug!(path = %path.display(), "skipping directory");
                continue;
            }
            if is_same_file(&path, log_identity.as_ref()) {
                debug!(path = %path.display(), "skipping run log");
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            // A symlink is dated by the link, so a dangling one still sorts.
            let resolved = match self
                .resolver
                .resolve(&name, || fs::symlink_metadata(&path).and_then(|m| m.modified()))
            {
                Ok(resolved) => resolved,
                Err(DateParseError::ModifiedTime { name, source }) => {
                    warn!(file = %name, error = %source, "could not read modification time");
                    undated.push(UndatedFile {
                        name,
                        path,
                        error: source.to_string(),
                    });
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            if resolved.source == DateSource::InvalidPrefix {
                warn!(file = %name, "digit prefix is not a valid date, using modification time");
            }

            files.push(FileEntry {
                name,
                path,
                sort_key: resolved.timestamp,
                date_source: resolved.source,
            });
        }

        files.sort_by(|a, b| {
            a.sort_key
                .cmp(&b.sort_key)
                .then_with(|| a.name.cmp(&b.name))
        });

        let grouped = GroupedFiles::from_sorted(files).with_undated(undated);
        debug!(
            files = grouped.total_files(),
            groups = grouped.group_count(),
            "classified source directory"
        );
        Ok(grouped)
    }

    fn log_identity(&self) -> Option<LogIdentity> {
        let log_file = self.log_file.as_ref()?;
        Some(LogIdentity {
            file_name: log_file.file_name()?.to_os_string(),
            canonical: fs::canonicalize(log_file).ok()?,
        })
    }
}

struct LogIdentity {
    file_name: std::ffi::OsString,
    canonical: PathBuf,
}

/// Compares resolved paths; only entries sharing the log's file name are canonicalized.
fn is_same_file(path: &Path, log: Option<&LogIdentity>) -> bool {
    let Some(log) = log else {
        return false;
    };
    if path.file_name() != Some(log.file_name.as_os_str()) {
        return false;
    }
    fs::canonicalize(path).is_ok_and(|resolved| resolved == log.canonical)
}
