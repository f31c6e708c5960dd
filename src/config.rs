//! Run configuration.
//!
//! Settings come from an optional TOML file and are then overridden by
//! command-line values. The merged [`SortConfig`] is resolved into an
//! immutable [`RunSettings`], which validates directories and extension
//! filters before any file is touched.
//!
//! # Configuration File Format
//!
//! ```toml
//! [run]
//! source = "/home/me/Downloads"
//! target = "/home/me/Sorted"     # defaults to source
//! log_file = "/home/me/log.txt"  # defaults to <source>/log.txt
//! backup = true
//! strict_dates = false
//!
//! [filters]
//! include = []                   # empty means every type
//! exclude = [".mp4", ".exe"]
//! ```

use crate::backup::BackupSink;
use crate::date_key::DateKeyResolver;
use crate::mover::RunMode;
use crate::policy::{TransferPolicy, normalize_extension};
use crate::report::RunHeader;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Default name of the run log, created inside the source directory.
pub const DEFAULT_LOG_FILE_NAME: &str = "log.txt";

/// Name of the configuration file looked up in the working directory.
pub const LOCAL_CONFIG_FILE_NAME: &str = ".datetidyrc.toml";

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),
    #[error("IO error reading configuration {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no source directory given (pass one or set [run] source)")]
    MissingSource,
    #[error("{role} directory does not exist: {}", path.display())]
    MissingDirectory { role: &'static str, path: PathBuf },
    #[error("extensions listed in both include and exclude: {}", .0.join(", "))]
    OverlappingExtensions(Vec<String>),
}

/// Settings loaded from a configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SortConfig {
    #[serde(default)]
    pub run: RunSection,
    #[serde(default)]
    pub filters: ExtensionFilters,
}

/// The `[run]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSection {
    #[serde(default)]
    pub source: Option<PathBuf>,
    #[serde(default)]
    pub target: Option<PathBuf>,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    /// Whether to copy every file into `_BACKUP_` before moving it. Defaults to true.
    #[serde(default = "default_backup")]
    pub backup: bool,
    /// Fail instead of falling back to the mtime when a digit prefix is not a date.
    #[serde(default)]
    pub strict_dates: bool,
}

fn default_backup() -> bool {
    true
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            source: None,
            target: None,
            log_file: None,
            backup: default_backup(),
            strict_dates: false,
        }
    }
}

/// The `[filters]` table. Extensions may be written with or without the dot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtensionFilters {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Values supplied on the command line; `None` and empty lists leave the file value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub source: Option<PathBuf>,
    pub target: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub backup: Option<bool>,
    pub strict_dates: Option<bool>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl SortConfig {
    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.datetidyrc.toml` in the current directory
    /// 3. Look for `~/.config/datetidy/config.toml` in home directory
    /// 4. Fall back to default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is explicitly provided but
    /// cannot be read, or if any discovered file is not valid TOML.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE_NAME);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("datetidy")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Applies command-line overrides on top of the loaded values.
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if overrides.source.is_some() {
            self.run.source = overrides.source;
        }
        if overrides.target.is_some() {
            self.run.target = overrides.target;
        }
        if overrides.log_file.is_some() {
            self.run.log_file = overrides.log_file;
        }
        if let Some(backup) = overrides.backup {
            self.run.backup = backup;
        }
        if let Some(strict) = overrides.strict_dates {
            self.run.strict_dates = strict;
        }
        if !overrides.include.is_empty() {
            self.filters.include = overrides.include;
        }
        if !overrides.exclude.is_empty() {
            self.filters.exclude = overrides.exclude;
        }
        self
    }

    /// Validates the configuration and fixes it for one run.
    ///
    /// # Errors
    ///
    /// Fails when no source is configured, when the source or target is not
    /// an existing directory, or when an extension is both included and
    /// excluded.
    pub fn resolve(self, mode: RunMode) -> Result<RunSettings, ConfigError> {
        let source_dir = self.run.source.ok_or(ConfigError::MissingSource)?;
        let target_dir = self.run.target.unwrap_or_else(|| source_dir.clone());

        require_dir("source", &source_dir)?;
        require_dir("target", &target_dir)?;

        let log_file = self
            .run
            .log_file
            .unwrap_or_else(|| source_dir.join(DEFAULT_LOG_FILE_NAME));

        let include = normalize_all(&self.filters.include);
        let exclude = normalize_all(&self.filters.exclude);
        let policy =
            TransferPolicy::new(include, exclude).map_err(ConfigError::OverlappingExtensions)?;

        Ok(RunSettings {
            source_dir,
            target_dir,
            log_file,
            backup: self.run.backup,
            strict_dates: self.run.strict_dates,
            policy,
            mode,
        })
    }
}

fn require_dir(role: &'static str, path: &Path) -> Result<(), ConfigError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(ConfigError::MissingDirectory {
            role,
            path: path.to_path_buf(),
        })
    }
}

fn normalize_all(raw: &[String]) -> BTreeSet<String> {
    raw.iter().filter_map(|ext| normalize_extension(ext)).collect()
}

/// Validated, immutable settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub source_dir: PathBuf,
    pub target_dir: PathBuf,
    pub log_file: PathBuf,
    pub backup: bool,
    pub strict_dates: bool,
    pub policy: TransferPolicy,
    pub mode: RunMode,
}

impl RunSettings {
    pub fn resolver(&self) -> DateKeyResolver {
        if self.strict_dates {
            DateKeyResolver::strict()
        } else {
            DateKeyResolver::new()
        }
    }

    /// The backup sink, when backups are enabled.
    pub fn backup_sink(&self) -> Option<BackupSink> {
        self.backup.then(|| BackupSink::in_target(&self.target_dir))
    }

    /// The settings block echoed at the start of a run.
    pub fn header(&self) -> RunHeader {
        RunHeader {
            source_dir: self.source_dir.clone(),
            target_dir: self.target_dir.clone(),
            log_file: self.log_file.clone(),
            backup: self.backup,
            include: self.policy.include().iter().cloned().collect(),
            exclude: self.policy.exclude().iter().cloned().collect(),
            strict_dates: self.strict_dates,
            mode: self.mode,
        }
    }
}
