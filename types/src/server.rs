//! Server identity: flavor (SonarQube vs SonarCloud) and version.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerFlavor {
    SonarQube,
    SonarCloud,
}

impl ServerFlavor {
    #[must_use]
    pub const fn from_is_sonar_cloud(is_sonar_cloud: bool) -> Self {
        if is_sonar_cloud {
            Self::SonarCloud
        } else {
            Self::SonarQube
        }
    }

    #[must_use]
    pub const fn is_sonar_cloud(self) -> bool {
        matches!(self, Self::SonarCloud)
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::SonarQube => "SonarQube",
            Self::SonarCloud => "SonarCloud",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid server version: {input:?}")]
pub struct VersionParseError {
    input: String,
}

/// Dotted server version, e.g. `9.9.0.65466` or `10.2`.
///
/// Missing components compare as zero, so `10.2` == `10.2.0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ServerVersion {
    major: u32,
    minor: u32,
    patch: u32,
    build: u32,
}

impl ServerVersion {
    #[must_use]
    pub const fn new(major: u32, minor: u32) -> Self {
        Self {
            major,
            minor,
            patch: 0,
            build: 0,
        }
    }

    #[must_use]
    pub const fn with_patch(mut self, patch: u32) -> Self {
        self.patch = patch;
        self
    }

    #[must_use]
    pub const fn major(&self) -> u32 {
        self.major
    }

    #[must_use]
    pub const fn minor(&self) -> u32 {
        self.minor
    }
}

impl FromStr for ServerVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || VersionParseError {
            input: s.to_string(),
        };
        let trimmed = s.trim();
        // Pre-release suffixes ("10.0-SNAPSHOT") are ignored.
        let numeric = trimmed.split(['-', ' ']).next().unwrap_or_default();
        let mut parts = [0u32; 4];
        let mut count = 0;
        for (slot, component) in parts.iter_mut().zip(numeric.split('.')) {
            *slot = component.parse().map_err(|_| err())?;
            count += 1;
        }
        if count == 0 || numeric.split('.').count() > 4 {
            return Err(err());
        }
        Ok(Self {
            major: parts[0],
            minor: parts[1],
            patch: parts[2],
            build: parts[3],
        })
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if self.build != 0 {
            write!(f, ".{}", self.build)?;
        }
        Ok(())
    }
}

/// What the client learned about the server when connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerInfo {
    pub version: ServerVersion,
    pub flavor: ServerFlavor,
}

impl ServerInfo {
    #[must_use]
    pub const fn new(version: ServerVersion, flavor: ServerFlavor) -> Self {
        Self { version, flavor }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_version() {
        let v: ServerVersion = "9.9.0.65466".parse().unwrap();
        assert_eq!(v.major(), 9);
        assert_eq!(v.minor(), 9);
        assert_eq!(v.to_string(), "9.9.0.65466");
    }

    #[test]
    fn short_version_equals_zero_padded() {
        let short: ServerVersion = "10.2".parse().unwrap();
        assert_eq!(short, ServerVersion::new(10, 2));
    }

    #[test]
    fn ordering_is_numeric_not_lexical() {
        let old: ServerVersion = "9.9".parse().unwrap();
        let new: ServerVersion = "10.0".parse().unwrap();
        assert!(old < new);
    }

    #[test]
    fn snapshot_suffix_is_ignored() {
        let v: ServerVersion = "10.4-SNAPSHOT".parse().unwrap();
        assert_eq!(v, ServerVersion::new(10, 4));
    }

    #[test]
    fn rejects_garbage() {
        assert!("".parse::<ServerVersion>().is_err());
        assert!("abc".parse::<ServerVersion>().is_err());
        assert!("1.2.3.4.5".parse::<ServerVersion>().is_err());
    }

    #[test]
    fn flavor_from_flag() {
        assert_eq!(ServerFlavor::from_is_sonar_cloud(true), ServerFlavor::SonarCloud);
        assert!(!ServerFlavor::from_is_sonar_cloud(false).is_sonar_cloud());
    }
}
