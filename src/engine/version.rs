//! Engine version negotiation
//!
//! `libtesseract.so.3` is usually a symlink that may point at any installed
//! release, so the version reported at runtime is the only one that counts.

use std::fmt;

use super::error::{EngineError, EngineResult};

/// Oldest release that ships the C API
pub const MIN_SUPPORTED_VERSION: f64 = 3.02;

/// Last release whose `TessBaseAPIProcessPages` returns the text directly
const LEGACY_PROCESS_PAGES_MAX: f64 = 3.02;

/// Version reported by `TessVersion()`, reduced to `MAJOR.MINOR`
#[derive(Debug, Clone, PartialEq)]
pub struct EngineVersion {
    raw: String,
    trimmed: String,
    value: f64,
}

impl EngineVersion {
    /// Parse a version string such as "3.02.02", "4.1.1" or "5.3.0-rc1"
    pub fn parse(raw: &str) -> EngineResult<Self> {
        let raw = raw.trim();
        let mut parts = raw.split('.');

        let major = parts.next().map(leading_digits).unwrap_or_default();
        if major.is_empty() {
            return Err(unparsable(raw));
        }

        let minor = parts.next().map(leading_digits).unwrap_or_default();
        let trimmed = if minor.is_empty() {
            major.to_string()
        } else {
            format!("{}.{}", major, minor)
        };

        let value: f64 = trimmed.parse().map_err(|_| unparsable(raw))?;

        Ok(Self {
            raw: raw.to_string(),
            trimmed,
            value,
        })
    }

    /// Full string as reported by the engine
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// `MAJOR.MINOR` form used for comparison
    pub fn trimmed(&self) -> &str {
        &self.trimmed
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn is_supported(&self) -> bool {
        self.value >= MIN_SUPPORTED_VERSION
    }

    /// Fails with `UnsupportedVersion` below the minimum
    pub fn ensure_supported(&self) -> EngineResult<()> {
        if self.is_supported() {
            Ok(())
        } else {
            Err(EngineError::UnsupportedVersion {
                found: self.raw.clone(),
                minimum: format!("{:.2}", MIN_SUPPORTED_VERSION),
            })
        }
    }

    /// Whether `TessBaseAPIProcessPages` uses the 3.02 signature
    pub fn has_legacy_process_pages(&self) -> bool {
        self.value <= LEGACY_PROCESS_PAGES_MAX
    }
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn leading_digits(s: &str) -> &str {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    &s[..end]
}

fn unparsable(raw: &str) -> EngineError {
    EngineError::UnsupportedVersion {
        found: format!("'{}' (unparsable)", raw),
        minimum: format!("{:.2}", MIN_SUPPORTED_VERSION),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rich_version_is_trimmed() {
        let v = EngineVersion::parse("3.02.02").unwrap();
        assert_eq!(v.trimmed(), "3.02");
        assert_eq!(v.raw(), "3.02.02");
        assert!(v.is_supported());
    }

    #[test]
    fn test_old_version_rejected() {
        let v = EngineVersion::parse("3.0").unwrap();
        assert_eq!(v.trimmed(), "3.0");
        assert!(!v.is_supported());

        let err = v.ensure_supported().unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedVersion { .. }));
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn test_newer_versions_accepted() {
        let v = EngineVersion::parse("4.1.1").unwrap();
        assert_eq!(v.trimmed(), "4.1");
        assert!(v.ensure_supported().is_ok());

        let v = EngineVersion::parse("5.3.0").unwrap();
        assert!((v.value() - 5.3).abs() < f64::EPSILON);
        assert!(v.is_supported());
    }

    #[test]
    fn test_suffixes_are_ignored() {
        let v = EngineVersion::parse("4.1.1-rc2-21-gf4ef").unwrap();
        assert_eq!(v.trimmed(), "4.1");

        let v = EngineVersion::parse("5.0.0-alpha-20201231\n").unwrap();
        assert_eq!(v.trimmed(), "5.0");
    }

    #[test]
    fn test_boundary() {
        assert!(EngineVersion::parse("3.02").unwrap().is_supported());
        assert!(!EngineVersion::parse("3.01.99").unwrap().is_supported());
        assert!(!EngineVersion::parse("2").unwrap().is_supported());
    }

    #[test]
    fn test_garbage_is_unsupported() {
        assert!(EngineVersion::parse("").is_err());
        assert!(EngineVersion::parse("unknown").is_err());
    }

    #[test]
    fn test_process_pages_signature_selection() {
        assert!(EngineVersion::parse("3.02.02").unwrap().has_legacy_process_pages());
        assert!(!EngineVersion::parse("3.03").unwrap().has_legacy_process_pages());
        assert!(!EngineVersion::parse("4.1.1").unwrap().has_legacy_process_pages());
    }
}
