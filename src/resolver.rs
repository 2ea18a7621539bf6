//! Turns a partial user request into exactly one [`Distribution`].
//!
//! Resolution is a pure function of the manifest, the request and the
//! currently active distribution. Every default that had to be filled in is
//! reported back as a [`Fallback`] so the caller can tell the user about it.

use std::fmt;
use semver::Version;
use crate::distribution::{parse_full_version, Distribution, Flavor, MinorVersion};
use crate::error::{Error, Result};
use crate::manifest::Manifest;

/// What the user asked for. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    /// Canonical name, e.g. `1.8.6-vendor-v0`. Overrides all other fields.
    pub name: Option<String>,
    /// `major.minor` or `major.minor.patch`.
    pub version: Option<String>,
    pub flavor: Option<String>,
    pub flavor_version: Option<u64>,
}

impl Request {
    pub fn by_name(name: &str) -> Self {
        Request { name: Some(name.to_string()), ..Request::default() }
    }

    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.version.is_none()
            && self.flavor.is_none()
            && self.flavor_version.is_none()
    }
}

/// A default the resolver applied on the caller's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fallback {
    /// The flavor was missing or not recognised.
    DefaultFlavor { requested: Option<String>, flavor: Flavor },
    /// Version, flavor or flavor version were taken from the active distribution.
    ActiveDefaults { active: Distribution },
    /// No version given; the preferred manifest entry of the flavor was used.
    PreferredVersion { flavor: Flavor, version: Version },
    /// Only `major.minor` given; the latest patch was picked.
    LatestPatch { requested: String, version: Version },
    /// No flavor version given; the latest one for the pair was picked.
    LatestFlavorVersion { version: Version, flavor: Flavor, flavor_version: u64 },
}

impl fmt::Display for Fallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fallback::DefaultFlavor { requested: None, flavor } => {
                write!(f, "fallback to the {flavor} flavor since --flavor is not given")
            }
            Fallback::DefaultFlavor { requested: Some(requested), flavor } => {
                write!(f, "fallback to the {flavor} flavor since '{requested}' is not supported")
            }
            Fallback::ActiveDefaults { active } => {
                write!(f, "unset fields default to the active distribution {active}")
            }
            Fallback::PreferredVersion { flavor, version } => {
                write!(f, "fallback to {version} which is the latest {flavor} version")
            }
            Fallback::LatestPatch { requested, version } => {
                write!(f, "fallback to {version} which is the latest patch version in {requested}")
            }
            Fallback::LatestFlavorVersion { version, flavor, flavor_version } => {
                write!(f, "fallback to flavor version {flavor_version} which is the latest one in {version}-{flavor}")
            }
        }
    }
}

/// The resolved distribution plus the defaults applied to get there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub distribution: Distribution,
    pub fallbacks: Vec<Fallback>,
}

/// Resolves `request` against `manifest`.
///
/// Precedence is: explicit request fields, then the `active` distribution,
/// then manifest-wide defaults. A `name` short-circuits everything and must be
/// listed in the manifest. An explicit flavor version is not checked against
/// the manifest here; fetching validates it.
pub fn resolve(
    manifest: &Manifest,
    request: &Request,
    active: Option<&Distribution>,
) -> Result<Resolution> {
    if let Some(name) = non_empty(&request.name) {
        let distribution: Distribution = name.parse()?;
        if !manifest.contains(&distribution) {
            return Err(Error::UnknownDistribution { name: distribution.to_string() });
        }
        return Ok(Resolution { distribution, fallbacks: Vec::new() });
    }

    let mut fallbacks = Vec::new();
    let mut used_active = false;

    let flavor = match non_empty(&request.flavor) {
        Some(requested) => match requested.parse::<Flavor>() {
            Ok(flavor) => flavor,
            Err(_) => {
                fallbacks.push(Fallback::DefaultFlavor {
                    requested: Some(requested.to_string()),
                    flavor: Flavor::DEFAULT,
                });
                Flavor::DEFAULT
            }
        },
        None => match active {
            Some(active) => {
                used_active = true;
                active.flavor
            }
            None => {
                fallbacks.push(Fallback::DefaultFlavor { requested: None, flavor: Flavor::DEFAULT });
                Flavor::DEFAULT
            }
        },
    };
    let flavor_from_active = used_active;

    let version = match non_empty(&request.version) {
        Some(requested) if requested.matches('.').count() == 1 => {
            let version = latest_patch(manifest, requested, flavor)?;
            fallbacks.push(Fallback::LatestPatch {
                requested: requested.to_string(),
                version: version.clone(),
            });
            version
        }
        Some(requested) => parse_full_version(requested).ok_or_else(|| Error::InvalidVersion {
            version: requested.to_string(),
        })?,
        None => match active {
            Some(active) => {
                used_active = true;
                // Same version and flavor as the active one: keep its flavor version too.
                if flavor_from_active && request.flavor_version.is_none() {
                    fallbacks.push(Fallback::ActiveDefaults { active: active.clone() });
                    return Ok(Resolution { distribution: active.clone(), fallbacks });
                }
                active.version.clone()
            }
            None => {
                let preferred = manifest.preferred(flavor).ok_or_else(|| Error::NoMatchingVersion {
                    version: "latest".to_string(),
                    flavor: flavor.to_string(),
                })?;
                let version = preferred.distribution.version.clone();
                fallbacks.push(Fallback::PreferredVersion { flavor, version: version.clone() });
                let flavor_version = request
                    .flavor_version
                    .unwrap_or(preferred.distribution.flavor_version);
                return Ok(Resolution {
                    distribution: Distribution::new(version, flavor, flavor_version),
                    fallbacks,
                });
            }
        },
    };

    if used_active {
        if let Some(active) = active {
            fallbacks.push(Fallback::ActiveDefaults { active: active.clone() });
        }
    }

    let flavor_version = match request.flavor_version {
        Some(flavor_version) => flavor_version,
        None => {
            let flavor_version = latest_flavor_version(manifest, &version, flavor).ok_or_else(|| {
                Error::UnsupportedVersionFlavor {
                    version: version.to_string(),
                    flavor: flavor.to_string(),
                }
            })?;
            fallbacks.push(Fallback::LatestFlavorVersion {
                version: version.clone(),
                flavor,
                flavor_version,
            });
            flavor_version
        }
    };

    Ok(Resolution {
        distribution: Distribution::new(version, flavor, flavor_version),
        fallbacks,
    })
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Greatest version of `flavor` within the `major.minor` given by `requested`.
/// Equal versions are ranked by flavor version.
fn latest_patch(manifest: &Manifest, requested: &str, flavor: Flavor) -> Result<Version> {
    let minor = MinorVersion::parse(requested).ok_or_else(|| Error::InvalidVersion {
        version: requested.to_string(),
    })?;
    manifest
        .entries()
        .iter()
        .map(|e| &e.distribution)
        .filter(|d| d.flavor == flavor && minor.contains(&d.version))
        .max_by(|a, b| (&a.version, a.flavor_version).cmp(&(&b.version, b.flavor_version)))
        .map(|d| d.version.clone())
        .ok_or_else(|| Error::NoMatchingVersion {
            version: requested.to_string(),
            flavor: flavor.to_string(),
        })
}

fn latest_flavor_version(manifest: &Manifest, version: &Version, flavor: Flavor) -> Option<u64> {
    manifest
        .entries()
        .iter()
        .map(|e| &e.distribution)
        .filter(|d| &d.version == version && d.flavor == flavor)
        .map(|d| d.flavor_version)
        .max()
}
