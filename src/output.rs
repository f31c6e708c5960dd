//! Output formatting and styling module.
//!
//! Turns [`RunEvent`]s into human-readable text. [`ConsoleReporter`] styles
//! lines with colours and a progress bar; [`LogFileReporter`] appends
//! timestamped plain text to the run log; [`TeeReporter`] feeds several
//! reporters at once.

use crate::mover::RunTotals;
use crate::policy::SkipReason;
use crate::report::{RunEvent, RunHeader, RunReporter};
use chrono::Local;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

const BANNER_RULE: &str = "**************************************************";
const SETTINGS_RULE: &str = "--------------------------------------------------";
const CLOSING_RULE: &str = "==================================================";

/// How a status line should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Info,
    Success,
    Warning,
    Error,
}

/// Formats the status line for a per-step event.
///
/// Returns `None` for events that are rendered as blocks (run header and
/// totals) rather than single lines.
pub fn status_line(event: &RunEvent, backup: bool) -> Option<(Tone, String)> {
    let not_backed_up = if backup { " Backup not created." } else { "" };

    let line = match event {
        RunEvent::NothingToMove => (Tone::Info, "No files to move.".to_string()),
        RunEvent::DatePrefixIgnored { name, date } => (
            Tone::Warning,
            format!("File '{name}' has a digit prefix that is not a date. Using modification date {date}."),
        ),
        RunEvent::DirectoryCreated { date, .. } => {
            (Tone::Info, format!("New directory created: {date}"))
        }
        RunEvent::DirectoryExisting { date, .. } => {
            (Tone::Info, format!("Using existing directory: {date}"))
        }
        RunEvent::FileSkipped {
            name,
            date,
            reason,
            extension,
        } => {
            let why = match reason {
                SkipReason::Exists => format!("File '{name}' already exists in '{date}'."),
                SkipReason::NotIncluded => {
                    format!("File '{name}' excluded ({} not in include list).", shown(extension))
                }
                SkipReason::Excluded => {
                    format!("File '{name}' excluded ({} in exclude list).", shown(extension))
                }
            };
            let tone = match reason {
                SkipReason::Exists => Tone::Warning,
                SkipReason::NotIncluded | SkipReason::Excluded => Tone::Info,
            };
            (tone, format!("{why} Skipping move.{not_backed_up}"))
        }
        RunEvent::FileMoved {
            name,
            date,
            backed_up,
            ..
        } => {
            let note = if *backed_up { " Backup created." } else { "" };
            (Tone::Success, format!("Moving file '{name}' to '{date}'.{note}"))
        }
        RunEvent::FileFailed { name, error, .. } => {
            (Tone::Error, format!("Could not move '{name}': {error}"))
        }
        RunEvent::Fatal { message } => (Tone::Error, message.clone()),
        RunEvent::RunStarted(_) | RunEvent::FilesFound { .. } | RunEvent::RunFinished(_) => {
            return None;
        }
    };
    Some(line)
}

fn shown(extension: &str) -> &str {
    if extension.is_empty() {
        "no extension"
    } else {
        extension
    }
}

fn list_or(items: &[String], empty: &str) -> String {
    if items.is_empty() {
        empty.to_string()
    } else {
        items.join(", ")
    }
}

fn settings_lines(header: &RunHeader) -> Vec<String> {
    let mut lines = vec![
        format!("  - Source Directory: {}", header.source_dir.display()),
        format!("  - Target Directory: {}", header.target_dir.display()),
        format!(
            "  - Backup: {}",
            if header.backup { "enabled" } else { "disabled" }
        ),
        format!(
            "  - File Types To Include: {}",
            list_or(&header.include, "All")
        ),
        format!(
            "  - File Types To Exclude: {}",
            list_or(&header.exclude, "None")
        ),
        format!(
            "  - Invalid Date Prefixes: {}",
            if header.strict_dates {
                "abort run"
            } else {
                "use modification date"
            }
        ),
    ];
    if header.mode.is_dry_run() {
        lines.push("  - Mode: dry run (no files are changed)".to_string());
    }
    lines
}

/// Renders events to the terminal with colours and a progress bar.
///
/// - Success messages (green with ✓)
/// - Error messages (red with ✗, on stderr)
/// - Warning messages (yellow with ⚠)
/// - Info messages (cyan)
#[derive(Default)]
pub struct ConsoleReporter {
    backup: bool,
    dry_run: bool,
    progress: Option<ProgressBar>,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the progress bar shown while files are processed.
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        pb.set_style(style);
        pb
    }

    /// Prints above the progress bar, if one is active.
    fn emit(&self, print: impl FnOnce()) {
        match &self.progress {
            Some(pb) => pb.suspend(print),
            None => print(),
        }
    }

    fn print_line(&self, tone: Tone, text: &str) {
        let text = if self.dry_run {
            format!("[DRY RUN] {text}")
        } else {
            text.to_string()
        };
        self.emit(|| match tone {
            Tone::Success => println!("{} {}", "✓".green(), text),
            Tone::Warning => println!("{} {}", "⚠".yellow(), text),
            Tone::Error => eprintln!("{} {}", "✗".red(), text),
            Tone::Info => println!("{}", text.cyan()),
        });
    }

    fn print_header(&mut self, header: &RunHeader) {
        self.backup = header.backup;
        self.dry_run = header.mode.is_dry_run();

        println!("\n{}", "datetidy".bold());
        for line in settings_lines(header) {
            println!("{line}");
        }
        if self.dry_run {
            println!("{}", "[DRY RUN] Nothing will be created, copied or moved.".yellow());
        }
        println!();
    }

    fn print_totals(&mut self, totals: &RunTotals) {
        if let Some(pb) = self.progress.take() {
            pb.finish_and_clear();
        }

        let verb = if self.dry_run { "would be moved" } else { "moved" };
        let summary = format!("{} of {} files {verb}", totals.moved, totals.found);
        if totals.is_complete() {
            println!("\n{} {}", "✓".green(), summary.bold());
        } else {
            println!("\n{} {}", "⚠".yellow(), summary.bold());
        }
        if totals.skipped > 0 {
            println!("  Skipped: {}", totals.skipped.to_string().yellow());
        }
        if totals.failed > 0 {
            println!("  Failed: {}", totals.failed.to_string().red());
        }
    }
}

impl RunReporter for ConsoleReporter {
    fn report(&mut self, event: &RunEvent) {
        match event {
            RunEvent::RunStarted(header) => self.print_header(header),
            RunEvent::FilesFound { count } => {
                println!("{}", format!("Files found: {count}").cyan());
                if *count > 0 {
                    self.progress = Some(Self::create_progress_bar(*count as u64));
                }
            }
            RunEvent::RunFinished(totals) => self.print_totals(totals),
            other => {
                if let Some((tone, text)) = status_line(other, self.backup) {
                    self.print_line(tone, &text);
                }
                if other.is_file_outcome()
                    && let Some(pb) = &self.progress
                {
                    pb.inc(1);
                }
            }
        }
    }
}

/// Appends plain, timestamped lines to the run log.
#[derive(Debug)]
pub struct LogFileReporter<W: Write = File> {
    writer: W,
    backup: bool,
    write_failed: bool,
}

impl LogFileReporter<File> {
    /// Opens `path` for appending, creating it if needed.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(file))
    }
}

impl<W: Write> LogFileReporter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            backup: false,
            write_failed: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn timestamp() -> String {
        Local::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
    }

    fn write_event(&mut self, event: &RunEvent) -> io::Result<()> {
        match event {
            RunEvent::RunStarted(header) => {
                self.backup = header.backup;
                writeln!(self.writer, "{BANNER_RULE}")?;
                writeln!(self.writer, "New Log Entry - {}", Self::timestamp())?;
                writeln!(self.writer, "{BANNER_RULE}")?;
                writeln!(self.writer, "Settings:")?;
                for line in settings_lines(header) {
                    writeln!(self.writer, "{line}")?;
                }
                writeln!(self.writer, "{SETTINGS_RULE}")?;
                writeln!(self.writer)?;
            }
            RunEvent::FilesFound { count } => {
                writeln!(self.writer, "TOTAL FILES FOUND: {count}")?;
            }
            RunEvent::RunFinished(totals) => {
                writeln!(
                    self.writer,
                    "TOTAL FILES MOVED: {} of {}",
                    totals.moved, totals.found
                )?;
                writeln!(self.writer, "\n{CLOSING_RULE}\n\n")?;
            }
            other => {
                if let Some((tone, text)) = status_line(other, self.backup) {
                    let ts = Self::timestamp();
                    match tone {
                        Tone::Info => writeln!(self.writer, "{ts}: {text}")?,
                        Tone::Success => writeln!(self.writer, "{ts}:  --> {text}")?,
                        Tone::Warning => writeln!(self.writer, "{ts}:  --> Warning: {text}")?,
                        Tone::Error => writeln!(self.writer, "{ts}:  --> Error: {text}")?,
                    }
                }
            }
        }
        self.writer.flush()
    }
}

impl<W: Write> RunReporter for LogFileReporter<W> {
    fn report(&mut self, event: &RunEvent) {
        if let Err(err) = self.write_event(event)
            && !self.write_failed
        {
            self.write_failed = true;
            tracing::warn!(error = %err, "could not write to run log");
        }
    }
}

/// Sends every event to each of its reporters, in order.
#[derive(Default)]
pub struct TeeReporter<'a> {
    reporters: Vec<Box<dyn RunReporter + 'a>>,
}

impl<'a> TeeReporter<'a> {
    pub fn new() -> Self {
        Self {
            reporters: Vec::new(),
        }
    }

    pub fn with(mut self, reporter: impl RunReporter + 'a) -> Self {
        self.reporters.push(Box::new(reporter));
        self
    }

    pub fn len(&self) -> usize {
        self.reporters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reporters.is_empty()
    }
}

impl RunReporter for TeeReporter<'_> {
    fn report(&mut self, event: &RunEvent) {
        for reporter in &mut self.reporters {
            reporter.report(event);
        }
    }
}
