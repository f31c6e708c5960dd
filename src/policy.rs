//! Per-file transfer eligibility.
//!
//! Rules are evaluated in a fixed order, first match wins:
//! 1. Destination already exists - skip, so re-runs never overwrite
//! 2. Include set is non-empty and the extension is not in it - skip
//! 3. Extension is in the exclude set - skip
//! 4. Otherwise eligible
//!
//! Extensions are compared lowercased with their leading dot (`".jpg"`).
//! A file without an extension has the empty extension `""`.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

/// Why a file was left in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// A file with the same name is already in the date directory.
    Exists,
    /// The include set is non-empty and does not list the extension.
    NotIncluded,
    /// The exclude set lists the extension.
    Excluded,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::Exists => "already exists",
            SkipReason::NotIncluded => "not included",
            SkipReason::Excluded => "excluded",
        };
        f.write_str(text)
    }
}

/// Outcome of evaluating one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDecision {
    Eligible,
    Skip(SkipReason),
}

impl TransferDecision {
    pub fn is_eligible(&self) -> bool {
        matches!(self, TransferDecision::Eligible)
    }
}

/// Normalizes a configured extension: trimmed, lowercased, with a leading dot.
///
/// Returns `None` for blank input.
///
/// ```
/// use datetidy::policy::normalize_extension;
///
/// assert_eq!(normalize_extension("JPG"), Some(".jpg".to_string()));
/// assert_eq!(normalize_extension(" .Pdf "), Some(".pdf".to_string()));
/// assert_eq!(normalize_extension("  "), None);
/// ```
pub fn normalize_extension(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        return None;
    }
    Some(format!(".{}", trimmed.to_lowercase()))
}

/// Returns the lowercased extension of `name` with its dot, or `""`.
///
/// Leading dots do not start an extension, so `.bashrc` has none.
pub fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}

/// Include/exclude extension filters plus the destination-exists check.
///
/// Construct through [`crate::config::RunSettings`] or [`TransferPolicy::new`];
/// both reject overlapping sets, so a policy never lists an extension twice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferPolicy {
    include: BTreeSet<String>,
    exclude: BTreeSet<String>,
}

impl TransferPolicy {
    /// Builds a policy from already-normalized extension sets.
    ///
    /// # Errors
    ///
    /// Returns the sorted list of extensions present in both sets.
    pub fn new(include: BTreeSet<String>, exclude: BTreeSet<String>) -> Result<Self, Vec<String>> {
        let overlap: Vec<String> = include.intersection(&exclude).cloned().collect();
        if !overlap.is_empty() {
            return Err(overlap);
        }
        Ok(Self { include, exclude })
    }

    /// A policy that allows every extension.
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn include(&self) -> &BTreeSet<String> {
        &self.include
    }

    pub fn exclude(&self) -> &BTreeSet<String> {
        &self.exclude
    }

    /// Decides whether `name` may be moved to `destination`.
    pub fn evaluate(&self, name: &str, destination: &Path) -> TransferDecision {
        if destination.exists() {
            return TransferDecision::Skip(SkipReason::Exists);
        }
        self.evaluate_extension(&extension_of(name))
    }

    /// Applies only the extension rules.
    pub fn evaluate_extension(&self, extension: &str) -> TransferDecision {
        if !self.include.is_empty() && !self.include.contains(extension) {
            return TransferDecision::Skip(SkipReason::NotIncluded);
        }
        if self.exclude.contains(extension) {
            return TransferDecision::Skip(SkipReason::Excluded);
        }
        TransferDecision::Eligible
    }
}
