//! Flat, last-write-wins backup copies taken before a file is moved.

use filetime::FileTime;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the backup directory created inside the target directory.
pub const BACKUP_DIR_NAME: &str = "_BACKUP_";

/// Copies `source` to `destination` and carries over its access and modification times.
///
/// `fs::copy` already preserves permission bits.
pub fn copy_preserving_times(source: &Path, destination: &Path) -> io::Result<u64> {
    let bytes = fs::copy(source, destination)?;
    let metadata = fs::metadata(source)?;
    filetime::set_file_times(
        destination,
        FileTime::from_last_access_time(&metadata),
        FileTime::from_last_modification_time(&metadata),
    )?;
    Ok(bytes)
}

/// A single directory holding the most recent pre-move copy of each file, by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupSink {
    dir: PathBuf,
}

impl BackupSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The conventional `<target>/_BACKUP_` sink.
    pub fn in_target(target_dir: &Path) -> Self {
        Self::new(target_dir.join(BACKUP_DIR_NAME))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates the backup directory if it is missing.
    pub fn ensure_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.dir)
    }

    /// Copies `source` into the backup directory under its own file name,
    /// replacing any older copy.
    pub fn store(&self, source: &Path) -> io::Result<PathBuf> {
        let name = source.file_name().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "file has no name component")
        })?;
        self.ensure_dir()?;
        let destination = self.dir.join(name);
        copy_preserving_times(source, &destination)?;
        Ok(destination)
    }
}
