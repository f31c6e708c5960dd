//! Date keys derived from file names or modification times.
//!
//! A file whose name starts with eight ASCII digits is dated by that
//! `YYYYMMDD` prefix. Every other file is dated by its modification time,
//! interpreted in local time.
//!
//! # Examples
//!
//! ```
//! use datetidy::date_key::{DateKeyResolver, DateSource};
//! use std::time::SystemTime;
//!
//! let resolver = DateKeyResolver::default();
//! let resolved = resolver
//!     .resolve("20230115_report.pdf", || Ok(SystemTime::now()))
//!     .unwrap();
//! assert_eq!(resolved.source, DateSource::NamePrefix);
//! assert_eq!(resolved.key().dir_name(), "2023_01_15");
//! ```

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use std::fmt;
use std::io;
use std::sync::LazyLock;
use std::time::SystemTime;

static DATE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{4})([0-9]{2})([0-9]{2})").expect("date prefix pattern is valid")
});

/// A calendar date used as a grouping bucket and as a destination directory name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey(NaiveDate);

impl DateKey {
    /// Builds a key from its parts, returning `None` for impossible dates.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    /// Returns the canonical `YYYY_MM_DD` directory name for this date.
    ///
    /// ```
    /// use datetidy::date_key::DateKey;
    ///
    /// let key = DateKey::from_ymd(2023, 2, 1).unwrap();
    /// assert_eq!(key.dir_name(), "2023_02_01");
    /// ```
    pub fn dir_name(&self) -> String {
        self.0.format("%Y_%m_%d").to_string()
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dir_name())
    }
}

impl From<NaiveDateTime> for DateKey {
    fn from(value: NaiveDateTime) -> Self {
        Self(value.date())
    }
}

/// Where a resolved date came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSource {
    /// The `YYYYMMDD` prefix of the file name.
    NamePrefix,
    /// The file's modification time.
    ModifiedTime,
    /// The modification time, because the name's digit prefix is not a real date.
    InvalidPrefix,
}

/// The full timestamp a file sorts by, plus its origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedDate {
    /// Name-prefixed files resolve to midnight of their date.
    pub timestamp: NaiveDateTime,
    pub source: DateSource,
}

impl ResolvedDate {
    pub fn key(&self) -> DateKey {
        DateKey::from(self.timestamp)
    }
}

/// Errors raised while dating a single file.
#[derive(Debug, thiserror::Error)]
pub enum DateParseError {
    /// The name starts with eight digits that do not form a calendar date.
    #[error("file '{name}' starts with '{prefix}', which is not a valid YYYYMMDD date")]
    InvalidPrefix { name: String, prefix: String },
    /// The modification time could not be read.
    #[error("could not read modification time of '{name}': {source}")]
    ModifiedTime {
        name: String,
        #[source]
        source: io::Error,
    },
}

enum NamePrefix<'a> {
    Date(NaiveDate),
    Invalid(&'a str),
    Absent,
}

fn parse_name_prefix(name: &str) -> NamePrefix<'_> {
    let Some(caps) = DATE_PREFIX.captures(name) else {
        return NamePrefix::Absent;
    };
    let prefix = caps.get(0).map_or("", |m| m.as_str());

    let year = caps[1].parse::<i32>().ok();
    let month = caps[2].parse::<u32>().ok();
    let day = caps[3].parse::<u32>().ok();

    match (year, month, day) {
        (Some(y), Some(m), Some(d)) => match NaiveDate::from_ymd_opt(y, m, d) {
            Some(date) => NamePrefix::Date(date),
            None => NamePrefix::Invalid(prefix),
        },
        _ => NamePrefix::Invalid(prefix),
    }
}

/// Converts a filesystem timestamp into a naive local date-time.
pub fn local_timestamp(time: SystemTime) -> NaiveDateTime {
    DateTime::<Local>::from(time).naive_local()
}

/// Derives the date of a file from its name, falling back to its modification time.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateKeyResolver {
    strict: bool,
}

impl DateKeyResolver {
    /// A resolver that falls back to the modification time for invalid prefixes.
    pub fn new() -> Self {
        Self::default()
    }

    /// A resolver that rejects names whose digit prefix is not a real date.
    pub fn strict() -> Self {
        Self { strict: true }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Resolves the date of `name`.
    ///
    /// `modified` is only called when the name carries no usable prefix, so
    /// prefixed files never cost a `stat`.
    ///
    /// # Errors
    ///
    /// Returns `DateParseError::InvalidPrefix` in strict mode when the digit
    /// prefix is not a calendar date, and `DateParseError::ModifiedTime` when
    /// the fallback timestamp cannot be read.
    pub fn resolve<F>(&self, name: &str, modified: F) -> Result<ResolvedDate, DateParseError>
    where
        F: FnOnce() -> io::Result<SystemTime>,
    {
        let source = match parse_name_prefix(name) {
            NamePrefix::Date(date) => {
                return Ok(ResolvedDate {
                    timestamp: date.and_time(NaiveTime::MIN),
                    source: DateSource::NamePrefix,
                });
            }
            NamePrefix::Invalid(prefix) if self.strict => {
                return Err(DateParseError::InvalidPrefix {
                    name: name.to_string(),
                    prefix: prefix.to_string(),
                });
            }
            NamePrefix::Invalid(_) => DateSource::InvalidPrefix,
            NamePrefix::Absent => DateSource::ModifiedTime,
        };

        let time = modified().map_err(|source| DateParseError::ModifiedTime {
            name: name.to_string(),
            source,
        })?;

        Ok(ResolvedDate {
            timestamp: local_timestamp(time),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn local_noon(year: i32, month: u32, day: u32) -> SystemTime {
        let dt = Local
            .with_ymd_and_hms(year, month, day, 12, 0, 0)
            .single()
            .expect("unambiguous local time");
        SystemTime::from(dt)
    }

    #[test]
    fn test_name_prefix_wins_over_mtime() {
        let resolver = DateKeyResolver::new();
        let resolved = resolver
            .resolve("20230115_report.pdf", || Ok(local_noon(2020, 6, 30)))
            .unwrap();

        assert_eq!(resolved.source, DateSource::NamePrefix);
        assert_eq!(resolved.key(), DateKey::from_ymd(2023, 1, 15).unwrap());
        assert_eq!(resolved.timestamp.time(), NaiveTime::MIN);
    }

    #[test]
    fn test_name_prefix_does_not_stat() {
        let resolver = DateKeyResolver::new();
        let resolved = resolver.resolve("19991231.txt", || {
            Err(io::Error::new(io::ErrorKind::NotFound, "should not be read"))
        });

        assert_eq!(
            resolved.unwrap().key(),
            DateKey::from_ymd(1999, 12, 31).unwrap()
        );
    }

    #[test]
    fn test_mtime_used_without_prefix() {
        let resolver = DateKeyResolver::new();
        let resolved = resolver
            .resolve("photo.jpg", || Ok(local_noon(2023, 2, 1)))
            .unwrap();

        assert_eq!(resolved.source, DateSource::ModifiedTime);
        assert_eq!(resolved.key().dir_name(), "2023_02_01");
    }

    #[test]
    fn test_short_or_partial_digit_names_use_mtime() {
        let resolver = DateKeyResolver::new();
        for name in ["2023.txt", "2023011_x.txt", "2023-01-15.txt", "1234567"] {
            let resolved = resolver
                .resolve(name, || Ok(local_noon(2021, 3, 4)))
                .unwrap();
            assert_eq!(resolved.source, DateSource::ModifiedTime, "{name}");
            assert_eq!(resolved.key().dir_name(), "2021_03_04", "{name}");
        }
    }

    #[test]
    fn test_non_ascii_digits_are_not_a_prefix() {
        let resolver = DateKeyResolver::new();
        let resolved = resolver
            .resolve("٢٠٢٣٠١١٥_scan.png", || Ok(local_noon(2022, 8, 9)))
            .unwrap();

        assert_eq!(resolved.source, DateSource::ModifiedTime);
    }

    #[test]
    fn test_invalid_prefix_falls_back_when_lenient() {
        let resolver = DateKeyResolver::new();
        let resolved = resolver
            .resolve("20231301_scan.png", || Ok(local_noon(2022, 8, 9)))
            .unwrap();

        assert_eq!(resolved.source, DateSource::InvalidPrefix);
        assert_eq!(resolved.key().dir_name(), "2022_08_09");
    }

    #[test]
    fn test_invalid_prefix_rejected_when_strict() {
        let resolver = DateKeyResolver::strict();
        let err = resolver
            .resolve("20230230_scan.png", || Ok(local_noon(2022, 8, 9)))
            .unwrap_err();

        match err {
            DateParseError::InvalidPrefix { name, prefix } => {
                assert_eq!(name, "20230230_scan.png");
                assert_eq!(prefix, "20230230");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_mtime_error_is_reported() {
        let resolver = DateKeyResolver::new();
        let err = resolver
            .resolve("notes.txt", || {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
            })
            .unwrap_err();

        assert!(matches!(err, DateParseError::ModifiedTime { .. }));
    }

    #[test]
    fn test_dir_name_is_zero_padded() {
        let key = DateKey::from_ymd(2024, 3, 7).unwrap();
        assert_eq!(key.dir_name(), "2024_03_07");
        assert_eq!(key.to_string(), "2024_03_07");
        assert!(DateKey::from_ymd(2023, 2, 29).is_none());
    }
}
