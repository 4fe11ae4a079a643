//! Dotted `major.minor.patch` version handling.
//!
//! Components compare numerically, never lexicographically, so `10.0.0`
//! sorts above `2.0.0` and `1.2.10` above `1.2.9`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A parsed `major.minor.patch` version.
///
/// Field order matters: the derived `Ord` compares major, then minor, then
/// patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SemVer {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

#[derive(Debug, Error)]
#[error("invalid version string: {0:?}")]
pub struct InvalidVersion(pub String);

impl SemVer {
    /// Strict `\d+.\d+.\d+` check; the publication workflow rejects
    /// anything else before a version string reaches storage or the
    /// comparator.
    pub fn is_valid(version: &str) -> bool {
        version.parse::<SemVer>().is_ok()
    }

    /// Order two well-formed version strings. Malformed input that slipped
    /// past validation falls back to plain string ordering rather than
    /// panicking.
    pub fn compare(a: &str, b: &str) -> Ordering {
        match (a.parse::<SemVer>(), b.parse::<SemVer>()) {
            (Ok(left), Ok(right)) => left.cmp(&right),
            _ => a.cmp(b),
        }
    }
}

impl FromStr for SemVer {
    type Err = InvalidVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('.');
        let (major, minor, patch) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(major), Some(minor), Some(patch), None) => (major, minor, patch),
            _ => return Err(InvalidVersion(s.to_string())),
        };

        let parse = |part: &str| -> Result<u64, InvalidVersion> {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(InvalidVersion(s.to_string()));
            }
            part.parse().map_err(|_| InvalidVersion(s.to_string()))
        };

        Ok(SemVer {
            major: parse(major)?,
            minor: parse(minor)?,
            patch: parse(patch)?,
        })
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_versions() {
        let version: SemVer = "1.2.3".parse().unwrap();
        assert_eq!(
            version,
            SemVer {
                major: 1,
                minor: 2,
                patch: 3
            }
        );
        assert_eq!(version.to_string(), "1.2.3");

        assert!(SemVer::is_valid("0.0.0"));
        assert!(SemVer::is_valid("10.20.30"));
        assert!(SemVer::is_valid("01.2.3")); // leading zeros are digits too
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(!SemVer::is_valid(""));
        assert!(!SemVer::is_valid("1.2"));
        assert!(!SemVer::is_valid("1.2.3.4"));
        assert!(!SemVer::is_valid("1.2.x"));
        assert!(!SemVer::is_valid("v1.2.3"));
        assert!(!SemVer::is_valid("1.2.-3"));
        assert!(!SemVer::is_valid("1..3"));
        assert!(!SemVer::is_valid("1.2.3-beta"));
    }

    #[test]
    fn test_numeric_not_lexicographic() {
        assert_eq!(SemVer::compare("10.0.0", "2.0.0"), Ordering::Greater);
        assert_eq!(SemVer::compare("1.2.10", "1.2.9"), Ordering::Greater);
        assert_eq!(SemVer::compare("2.0.0", "10.0.0"), Ordering::Less);
    }

    #[test]
    fn test_component_precedence() {
        assert_eq!(SemVer::compare("1.0.0", "1.0.0"), Ordering::Equal);
        assert_eq!(SemVer::compare("2.0.0", "1.9.9"), Ordering::Greater);
        assert_eq!(SemVer::compare("1.3.0", "1.2.99"), Ordering::Greater);
        assert_eq!(SemVer::compare("1.2.3", "1.2.4"), Ordering::Less);
    }

    #[test]
    fn test_descending_sort() {
        let mut versions = vec!["1.0.0", "10.0.0", "2.0.0", "1.5.2"];
        versions.sort_by(|a, b| SemVer::compare(b, a));
        assert_eq!(versions, vec!["10.0.0", "2.0.0", "1.5.2", "1.0.0"]);
    }
}
