use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use regex::Regex;
use semver::Version;
use serde::{Deserialize, Deserializer, Serialize};
use crate::error::{Error, Result};

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+\.\d+\.\d+)-([A-Za-z0-9]+)-v(\d+)$").expect("distribution name regex")
});

static FULL_VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+\.\d+\.\d+$").expect("full version regex")
});

/// A build variant of `istioctl`.
///
/// The declaration order is the stable order used when sorting distributions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flavor {
    /// The vendor's primary build. This is the default flavor.
    Vendor,
    /// The vendor build compiled against a hardened (FIPS-style) toolchain.
    Hardened,
    /// The unmodified upstream build.
    Base,
}

impl Flavor {
    pub const ALL: [Flavor; 3] = [Flavor::Vendor, Flavor::Hardened, Flavor::Base];
    pub const DEFAULT: Flavor = Flavor::Vendor;

    pub fn as_str(&self) -> &'static str {
        match self {
            Flavor::Vendor => "vendor",
            Flavor::Hardened => "hardened",
            Flavor::Base => "base",
        }
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Flavor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Flavor::ALL
            .into_iter()
            .find(|flavor| flavor.as_str() == s)
            .ok_or_else(|| Error::MalformedName {
                name: s.to_string(),
                reason: format!("unknown flavor '{s}'"),
            })
    }
}

/// A `major.minor` pair, e.g. `1.8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MinorVersion {
    pub major: u64,
    pub minor: u64,
}

impl MinorVersion {
    pub fn of(version: &Version) -> Self {
        MinorVersion { major: version.major, minor: version.minor }
    }

    /// Parses a `major.minor` string. Anything else yields `None`.
    pub fn parse(s: &str) -> Option<Self> {
        let (major, minor) = s.split_once('.')?;
        Some(MinorVersion {
            major: major.parse().ok()?,
            minor: minor.parse().ok()?,
        })
    }

    pub fn contains(&self, version: &Version) -> bool {
        version.major == self.major && version.minor == self.minor
    }
}

impl fmt::Display for MinorVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Parses a full `major.minor.patch` version without pre-release or build suffixes.
pub fn parse_full_version(s: &str) -> Option<Version> {
    if !FULL_VERSION_RE.is_match(s) {
        return None;
    }
    Version::parse(s).ok()
}

fn deserialize_full_version<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Version, D::Error> {
    let s = String::deserialize(deserializer)?;
    parse_full_version(&s).ok_or_else(|| {
        serde::de::Error::custom(format!("invalid version '{s}', expected major.minor.patch"))
    })
}

/// Identifies exactly one build: `{version}-{flavor}-v{flavor_version}`.
///
/// Distributions order by version (numerically per segment), then by flavor,
/// then by flavor version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Distribution {
    #[serde(deserialize_with = "deserialize_full_version")]
    pub version: Version,
    pub flavor: Flavor,
    pub flavor_version: u64,
}

impl Distribution {
    pub fn new(version: Version, flavor: Flavor, flavor_version: u64) -> Self {
        Distribution { version, flavor, flavor_version }
    }

    pub fn minor(&self) -> MinorVersion {
        MinorVersion::of(&self.version)
    }

    /// The canonical name, also used as the installation directory name.
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-v{}", self.version, self.flavor, self.flavor_version)
    }
}

impl FromStr for Distribution {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = |reason: &str| Error::MalformedName {
            name: s.to_string(),
            reason: reason.to_string(),
        };
        let caps = NAME_RE
            .captures(s)
            .ok_or_else(|| malformed("expected <major.minor.patch>-<flavor>-v<flavor version>"))?;
        let version = parse_full_version(&caps[1]).ok_or_else(|| malformed("invalid version"))?;
        let flavor = caps[2].parse::<Flavor>().map_err(|_| {
            malformed(&format!("unknown flavor '{}'", &caps[2]))
        })?;
        let flavor_version = caps[3]
            .parse::<u64>()
            .map_err(|_| malformed("flavor version out of range"))?;
        Ok(Distribution { version, flavor, flavor_version })
    }
}
