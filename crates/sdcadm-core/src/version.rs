//! Version string helpers

use std::cmp::Ordering;
use std::fmt;

/// Dotted numeric agent version, e.g. `1.4.0`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version {
    /// Major
    pub major: u64,
    /// Minor
    pub minor: u64,
    /// Patch
    pub patch: u64,
}

impl Version {
    /// Parse `MAJOR[.MINOR[.PATCH]]`, ignoring any `-pre` or `+build` suffix
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let core = s.trim().split(['-', '+']).next()?;
        let mut parts = core.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next().map_or(Some(0), |p| p.parse().ok())?;
        let patch = parts.next().map_or(Some(0), |p| p.parse().ok())?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self {
            major,
            minor,
            patch,
        })
    }

    /// Whether `self` is at least `min`
    #[inline]
    #[must_use]
    pub fn satisfies_min(&self, min: &Version) -> bool {
        self >= min
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Build timestamp of an image version string.
///
/// Image versions look like `master-20160310T201235Z-g1234567`: the
/// timestamp is the second-to-last dash-separated field. This is
/// brittle against version format changes and is not otherwise
/// validated beyond being non-empty.
#[must_use]
pub fn build_timestamp(version: &str) -> Option<&str> {
    let fields: Vec<&str> = version.split('-').collect();
    if fields.len() < 2 {
        return None;
    }
    let stamp = fields[fields.len() - 2];
    (!stamp.is_empty()).then_some(stamp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_versions() {
        assert_eq!(Version::parse("1.4.0"), Some(Version { major: 1, minor: 4, patch: 0 }));
        assert_eq!(Version::parse("2.1"), Some(Version { major: 2, minor: 1, patch: 0 }));
        assert_eq!(Version::parse("1.5.3-pre"), Some(Version { major: 1, minor: 5, patch: 3 }));
        assert!(Version::parse("").is_none());
        assert!(Version::parse("x.y").is_none());
        assert!(Version::parse("1.2.3.4").is_none());
    }

    #[test]
    fn orders_numerically() {
        let min = Version::parse("1.4.0").unwrap();
        assert!(Version::parse("1.10.0").unwrap().satisfies_min(&min));
        assert!(Version::parse("1.4.0").unwrap().satisfies_min(&min));
        assert!(!Version::parse("1.2.0").unwrap().satisfies_min(&min));
        assert!(Version::parse("2.0.0").unwrap() > min);
    }

    #[test]
    fn build_timestamp_is_second_to_last_field() {
        assert_eq!(
            build_timestamp("master-20160310T201235Z-g1234567"),
            Some("20160310T201235Z")
        );
        assert_eq!(
            build_timestamp("release-20160707-20160707T172016Z-g5b4c9a1"),
            Some("20160707T172016Z")
        );
        assert_eq!(build_timestamp("1.0.0"), None);
        assert_eq!(build_timestamp("a--b"), None);
    }
}
