//! Version policy: parsing stored version strings and computing the next one.
//!
//! Versions are strictly three numeric components. Anything that is not a
//! digit or a dot is stripped before splitting, so `"v2.4.9"` and `"2.4.9"`
//! parse to the same value.

use std::str::FromStr;

use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors from version operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    /// The release type is not one of `major`, `minor`, `patch`.
    #[error("invalid release type `{0}` (expected major, minor, or patch)")]
    InvalidReleaseType(String),

    /// The version string does not hold exactly three numeric components.
    #[error("invalid version `{input}`: {reason}")]
    InvalidVersionFormat {
        /// The raw input as read from the store.
        input: String,
        /// What was wrong with it.
        reason: String,
    },
}

/// Result alias for version operations.
pub type VersionResult<T> = Result<T, VersionError>;

/// Which version component a release increments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseType {
    /// Breaking release (X.0.0).
    Major,
    /// Feature release (x.Y.0).
    #[default]
    Minor,
    /// Fix release (x.y.Z).
    Patch,
}

impl ReleaseType {
    /// All release types, highest impact first.
    pub const ALL: [Self; 3] = [Self::Major, Self::Minor, Self::Patch];

    /// The literal name used on the command line and in config.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Patch => "patch",
        }
    }
}

impl std::fmt::Display for ReleaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReleaseType {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "major" => Ok(Self::Major),
            "minor" => Ok(Self::Minor),
            "patch" => Ok(Self::Patch),
            _ => Err(VersionError::InvalidReleaseType(s.to_string())),
        }
    }
}

/// Parse a stored version string into a three-component version.
///
/// Non-digit, non-dot characters are dropped first (so a `v` prefix is
/// fine), then the remainder must split into exactly three non-empty
/// numeric components.
pub fn parse_version(input: &str) -> VersionResult<Version> {
    let invalid = |reason: &str| VersionError::InvalidVersionFormat {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let cleaned: String = input
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    let parts: Vec<&str> = cleaned.split('.').collect();
    if parts.len() < 3 {
        return Err(invalid("expected three components (major.minor.patch)"));
    }
    if parts.len() > 3 {
        return Err(invalid("more than three components"));
    }

    let mut numbers = [0u64; 3];
    for (slot, part) in numbers.iter_mut().zip(&parts) {
        if part.is_empty() {
            return Err(invalid("empty component"));
        }
        *slot = part
            .parse()
            .map_err(|_| invalid("component is not a non-negative integer"))?;
    }

    let [major, minor, patch] = numbers;
    Ok(Version::new(major, minor, patch))
}

/// Apply a release type to a version.
///
/// Lower-order components reset to zero. Fails only when the incremented
/// component would overflow.
pub fn increment(current: &Version, release_type: ReleaseType) -> VersionResult<Version> {
    let overflow = || VersionError::InvalidVersionFormat {
        input: current.to_string(),
        reason: format!("{release_type} component overflows"),
    };

    let next = match release_type {
        ReleaseType::Major => Version::new(
            current.major.checked_add(1).ok_or_else(overflow)?,
            0,
            0,
        ),
        ReleaseType::Minor => Version::new(
            current.major,
            current.minor.checked_add(1).ok_or_else(overflow)?,
            0,
        ),
        ReleaseType::Patch => Version::new(
            current.major,
            current.minor,
            current.patch.checked_add(1).ok_or_else(overflow)?,
        ),
    };
    Ok(next)
}

/// Parse `current` and compute the version a `release_type` release produces.
#[instrument(level = "debug")]
pub fn next_version(current: &str, release_type: ReleaseType) -> VersionResult<Version> {
    let parsed = parse_version(current)?;
    let next = increment(&parsed, release_type)?;
    debug!(%parsed, %next, "computed next version");
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn bump_patch() {
        let v = Version::new(1, 2, 3);
        assert_eq!(
            increment(&v, ReleaseType::Patch).unwrap(),
            Version::new(1, 2, 4)
        );
    }

    #[test]
    fn bump_minor() {
        let v = Version::new(1, 2, 3);
        assert_eq!(
            increment(&v, ReleaseType::Minor).unwrap(),
            Version::new(1, 3, 0)
        );
    }

    #[test]
    fn bump_major() {
        let v = Version::new(1, 2, 3);
        assert_eq!(
            increment(&v, ReleaseType::Major).unwrap(),
            Version::new(2, 0, 0)
        );
    }

    #[test]
    fn bump_from_zero() {
        let v = Version::new(0, 0, 0);
        assert_eq!(increment(&v, ReleaseType::Patch).unwrap(), Version::new(0, 0, 1));
        assert_eq!(increment(&v, ReleaseType::Minor).unwrap(), Version::new(0, 1, 0));
        assert_eq!(increment(&v, ReleaseType::Major).unwrap(), Version::new(1, 0, 0));
    }

    #[test]
    fn parse_with_v_prefix() {
        assert_eq!(parse_version("v2.4.9").unwrap(), Version::new(2, 4, 9));
    }

    #[test]
    fn parse_without_prefix() {
        assert_eq!(parse_version("1.2.3").unwrap(), Version::new(1, 2, 3));
    }

    #[test]
    fn parse_strips_arbitrary_prefix() {
        assert_eq!(
            parse_version("release-10.0.1").unwrap(),
            Version::new(10, 0, 1)
        );
    }

    #[test]
    fn parse_two_components_fails() {
        let err = parse_version("1.2").unwrap_err();
        assert!(matches!(err, VersionError::InvalidVersionFormat { .. }));
    }

    #[test]
    fn parse_four_components_fails() {
        // "1.2.3-rc.1" strips to "1.2.3.1"
        assert!(parse_version("1.2.3-rc.1").is_err());
    }

    #[test]
    fn parse_empty_component_fails() {
        assert!(parse_version("1..3").is_err());
        assert!(parse_version("").is_err());
        assert!(parse_version("not-a-version").is_err());
    }

    #[test]
    fn parse_overflowing_component_fails() {
        assert!(parse_version("99999999999999999999.0.0").is_err());
    }

    #[test]
    fn increment_overflow_is_reported() {
        let v = Version::new(u64::MAX, 0, 0);
        assert!(increment(&v, ReleaseType::Major).is_err());
        // Other components are still fine
        assert!(increment(&v, ReleaseType::Minor).is_ok());
    }

    #[test]
    fn next_version_from_string() {
        assert_eq!(
            next_version("1.2.3", ReleaseType::Minor).unwrap(),
            Version::new(1, 3, 0)
        );
    }

    #[test]
    fn next_version_rejects_bad_input_before_increment() {
        let err = next_version("1.2", ReleaseType::Major).unwrap_err();
        assert!(matches!(err, VersionError::InvalidVersionFormat { .. }));
    }

    #[test]
    fn release_type_parses_literals() {
        assert_eq!("major".parse::<ReleaseType>().unwrap(), ReleaseType::Major);
        assert_eq!("minor".parse::<ReleaseType>().unwrap(), ReleaseType::Minor);
        assert_eq!(" Patch ".parse::<ReleaseType>().unwrap(), ReleaseType::Patch);
    }

    #[test]
    fn release_type_rejects_unknown() {
        let err = "prerelease".parse::<ReleaseType>().unwrap_err();
        assert_eq!(err, VersionError::InvalidReleaseType("prerelease".into()));
    }

    #[test]
    fn release_type_default_is_minor() {
        assert_eq!(ReleaseType::default(), ReleaseType::Minor);
    }

    #[test]
    fn release_type_display_round_trips() {
        for rt in ReleaseType::ALL {
            assert_eq!(rt.to_string().parse::<ReleaseType>().unwrap(), rt);
        }
    }

    // Keep components below u64::MAX so increments never overflow.
    fn component() -> impl Strategy<Value = u64> {
        0..u64::MAX / 2
    }

    proptest! {
        #[test]
        fn major_resets_lower_components(a in component(), b in component(), c in component()) {
            let next = increment(&Version::new(a, b, c), ReleaseType::Major).unwrap();
            prop_assert_eq!(next, Version::new(a + 1, 0, 0));
        }

        #[test]
        fn minor_resets_patch(a in component(), b in component(), c in component()) {
            let next = increment(&Version::new(a, b, c), ReleaseType::Minor).unwrap();
            prop_assert_eq!(next, Version::new(a, b + 1, 0));
        }

        #[test]
        fn patch_only_touches_patch(a in component(), b in component(), c in component()) {
            let next = increment(&Version::new(a, b, c), ReleaseType::Patch).unwrap();
            prop_assert_eq!(next, Version::new(a, b, c + 1));
        }

        #[test]
        fn increment_is_deterministic(a in component(), b in component(), c in component()) {
            let v = Version::new(a, b, c);
            for rt in ReleaseType::ALL {
                prop_assert_eq!(increment(&v, rt).unwrap(), increment(&v, rt).unwrap());
            }
            // Input untouched
            prop_assert_eq!(v, Version::new(a, b, c));
        }

        #[test]
        fn next_is_strictly_greater(a in component(), b in component(), c in component()) {
            let v = Version::new(a, b, c);
            for rt in ReleaseType::ALL {
                prop_assert!(increment(&v, rt).unwrap() > v);
            }
        }

        #[test]
        fn parse_accepts_v_prefixed_display(a in component(), b in component(), c in component()) {
            let text = format!("v{a}.{b}.{c}");
            prop_assert_eq!(parse_version(&text).unwrap(), Version::new(a, b, c));
        }
    }
}
