//! Shim version negotiation.
//!
//! Two protocol generations exist: up to SciDB 15.7 the shim has real
//! login/logout endpoints and prefixes result tables with a CSV header
//! row; afterwards login/logout are gone (an opaque token is adopted
//! unconditionally) and tables carry no header. All dialect decisions
//! funnel through [`Dialect`], selected once per client.

use scidb_common::{ShimError, ShimResult};
use std::fmt;

/// Parsed `v<major>.<minor>` shim version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ShimVersion {
    pub major: u32,
    pub minor: u32,
}

impl ShimVersion {
    /// Parse a raw version string of the form `v<major>.<minor>[-...]`.
    ///
    /// Fails when fewer than two dot/dash separated components exist.
    pub fn parse(s: &str) -> ShimResult<Self> {
        let trimmed = s.trim();
        let mut parts = trimmed.split(['.', '-']);
        let major_part = parts.next().unwrap_or("");
        let minor_part = parts
            .next()
            .ok_or_else(|| ShimError::VersionParse(s.to_string()))?;

        let major = major_part
            .trim_start_matches('v')
            .parse()
            .map_err(|_| ShimError::VersionParse(s.to_string()))?;
        let minor = minor_part
            .parse()
            .map_err(|_| ShimError::VersionParse(s.to_string()))?;
        Ok(Self { major, minor })
    }

    /// Strict greater-than comparison on the (major, minor) tuple.
    pub fn is_newer_than(&self, major: u32, minor: u32) -> bool {
        self.major > major || (self.major == major && self.minor > minor)
    }
}

impl fmt::Display for ShimVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}", self.major, self.minor)
    }
}

/// The version-dependent protocol behaviors, decided in one place.
#[derive(Debug, Clone, Copy)]
pub struct Dialect {
    /// Result tables saved as CSV start with a header row.
    pub csv_header: bool,
    /// The login endpoint exists; otherwise an opaque token is adopted.
    pub has_login: bool,
    /// The logout endpoint exists.
    pub has_logout: bool,
}

impl Dialect {
    pub fn for_version(version: ShimVersion) -> Self {
        Self {
            csv_header: !version.is_newer_than(15, 7),
            has_login: !version.is_newer_than(15, 7),
            // Logout disappeared with 15.12 itself.
            has_logout: !(version.major > 15 || (version.major == 15 && version.minor >= 12)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain() {
        let v = ShimVersion::parse("v15.7").unwrap();
        assert_eq!((v.major, v.minor), (15, 7));
    }

    #[test]
    fn test_parse_with_suffix() {
        let v = ShimVersion::parse("v16.9-alpha").unwrap();
        assert_eq!((v.major, v.minor), (16, 9));
        let v = ShimVersion::parse("v15.12.1\n").unwrap();
        assert_eq!((v.major, v.minor), (15, 12));
    }

    #[test]
    fn test_parse_errors() {
        assert!(ShimVersion::parse("v15").is_err());
        assert!(ShimVersion::parse("").is_err());
        assert!(ShimVersion::parse("va.b").is_err());
    }

    #[test]
    fn test_is_newer_than_is_strict() {
        let v = ShimVersion::parse("v15.7").unwrap();
        assert!(v.is_newer_than(15, 6));
        assert!(v.is_newer_than(14, 12));
        assert!(!v.is_newer_than(15, 7));
        assert!(!v.is_newer_than(16, 0));
    }

    #[test]
    fn test_dialect_generations() {
        let old = Dialect::for_version(ShimVersion::parse("v15.7").unwrap());
        assert!(old.csv_header);
        assert!(old.has_login);
        assert!(old.has_logout);

        let mid = Dialect::for_version(ShimVersion::parse("v15.11").unwrap());
        assert!(!mid.csv_header);
        assert!(!mid.has_login);
        assert!(mid.has_logout);

        let new = Dialect::for_version(ShimVersion::parse("v15.12").unwrap());
        assert!(!new.has_logout);
        let newer = Dialect::for_version(ShimVersion::parse("v16.9").unwrap());
        assert!(!newer.csv_header);
        assert!(!newer.has_login);
        assert!(!newer.has_logout);
    }
}
