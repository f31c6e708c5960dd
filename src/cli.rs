//! Command-line interface module for datetidy.
//!
//! This module handles:
//! - Argument parsing (clap)
//! - Merging command-line values over the configuration file
//! - Wiring the classifier, mover and reporters into one run

use crate::classifier::{ClassifyError, FileClassifier};
use crate::config::{ConfigError, ConfigOverrides, RunSettings, SortConfig};
use crate::date_key::DateSource;
use crate::mover::{MoveError, Mover, RunMode, RunTotals};
use crate::output::{ConsoleReporter, LogFileReporter, TeeReporter};
use crate::report::{RunEvent, RunReporter};
use clap::Parser;
use std::path::PathBuf;

/// Sort files into YYYY_MM_DD directories by name prefix or modification date.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "datetidy", version, about)]
pub struct Cli {
    /// Directory whose files are sorted (overrides `[run] source`)
    pub source: Option<PathBuf>,

    /// Directory that receives the date folders; defaults to the source
    #[arg(short, long, value_name = "DIR")]
    pub target: Option<PathBuf>,

    /// Configuration file to load instead of the default lookup
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Run log to append to; defaults to <SOURCE>/log.txt
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Copy each file into <TARGET>/_BACKUP_ before moving it
    #[arg(long, overrides_with = "no_backup")]
    pub backup: bool,

    /// Move files without taking backups
    #[arg(long, overrides_with = "backup")]
    pub no_backup: bool,

    /// Only move files with these extensions (comma separated)
    #[arg(short, long, value_name = "EXT", value_delimiter = ',')]
    pub include: Vec<String>,

    /// Never move files with these extensions (comma separated)
    #[arg(short = 'x', long, value_name = "EXT", value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Abort when a name starts with eight digits that are not a valid date
    #[arg(long)]
    pub strict_dates: bool,

    /// Show what would happen without creating, copying or moving anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Only write the run log, no console output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// The configuration values this invocation overrides.
    pub fn overrides(&self) -> ConfigOverrides {
        let backup = if self.no_backup {
            Some(false)
        } else if self.backup {
            Some(true)
        } else {
            None
        };

        ConfigOverrides {
            source: self.source.clone(),
            target: self.target.clone(),
            log_file: self.log_file.clone(),
            backup,
            strict_dates: self.strict_dates.then_some(true),
            include: self.include.clone(),
            exclude: self.exclude.clone(),
        }
    }

    pub fn mode(&self) -> RunMode {
        if self.dry_run {
            RunMode::DryRun
        } else {
            RunMode::Apply
        }
    }
}

/// Errors that abort a run after configuration succeeded.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Classify(#[from] ClassifyError),
    #[error(transparent)]
    Move(#[from] MoveError),
}

/// Everything that can make the binary fail.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to open run log {}: {source}", path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Run(#[from] RunError),
}

impl AppError {
    /// Process exit code: 2 for configuration problems, 1 for run failures.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Config(_) | AppError::LogFile { .. } => 2,
            AppError::Run(_) => 1,
        }
    }

    /// Run errors have already been delivered to the reporters as a fatal event.
    pub fn is_reported(&self) -> bool {
        matches!(self, AppError::Run(_))
    }
}

/// Runs the CLI application with the given arguments.
///
/// Loads configuration, applies the command-line overrides, opens the run
/// log and performs the run, printing to the console unless `quiet` is set.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use datetidy::cli::{Cli, run_cli};
///
/// let cli = Cli::parse_from(["datetidy", "/path/to/downloads", "--exclude", ".exe"]);
/// match run_cli(&cli) {
///     Ok(totals) => println!("moved {} of {}", totals.moved, totals.found),
///     Err(e) => eprintln!("Error: {}", e),
/// }
/// ```
pub fn run_cli(cli: &Cli) -> Result<RunTotals, AppError> {
    let settings = SortConfig::load(cli.config.as_deref())?
        .with_overrides(cli.overrides())
        .resolve(cli.mode())?;

    let log = LogFileReporter::open(&settings.log_file).map_err(|source| AppError::LogFile {
        path: settings.log_file.clone(),
        source,
    })?;

    let mut reporter = TeeReporter::new();
    if !cli.quiet {
        reporter = reporter.with(ConsoleReporter::new());
    }
    reporter = reporter.with(log);

    Ok(run_with_settings(&settings, &mut reporter)?)
}

/// Classifies the source directory and moves its files according to `settings`.
///
/// Every step is reported to `reporter`; a fatal error is reported as
/// [`RunEvent::Fatal`] before it is returned.
pub fn run_with_settings(
    settings: &RunSettings,
    reporter: &mut dyn RunReporter,
) -> Result<RunTotals, RunError> {
    reporter.report(&RunEvent::RunStarted(settings.header()));

    let classifier = FileClassifier::new(&settings.source_dir, settings.resolver())
        .with_log_file(&settings.log_file);
    let grouped = match classifier.classify() {
        Ok(grouped) => grouped,
        Err(err) => {
            reporter.report(&RunEvent::Fatal {
                message: err.to_string(),
            });
            return Err(err.into());
        }
    };

    for entry in grouped
        .entries()
        .filter(|e| e.date_source == DateSource::InvalidPrefix)
    {
        reporter.report(&RunEvent::DatePrefixIgnored {
            name: entry.name.clone(),
            date: entry.date_key(),
        });
    }

    let mover = Mover::new(&settings.target_dir, settings.policy.clone())
        .with_backup(settings.backup_sink())
        .with_mode(settings.mode);

    mover.run(&grouped, &mut *reporter).map_err(|err| {
        reporter.report(&RunEvent::Fatal {
            message: err.to_string(),
        });
        RunError::from(err)
    })
}
