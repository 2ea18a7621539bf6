//! End-of-life and security-patch advisories for the active distribution.
//!
//! All checks are read-only queries over the manifest.

use std::fmt;
use chrono::{NaiveDate, Utc};
use crate::distribution::{Distribution, MinorVersion};
use crate::manifest::Manifest;

/// Source of "today".
pub trait Clock {
    fn today(&self) -> NaiveDate;
}

/// Reads the system clock (UTC).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// Always returns the same date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// The active minor version reached its end of life.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOfLife {
    pub minor: MinorVersion,
    pub date: NaiveDate,
    /// Every newer minor version in the manifest, ascending.
    pub suggested_upgrades: Vec<MinorVersion>,
}

/// A newer release with security fixes exists for the active minor version and flavor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityPatchAvailable {
    pub target: Distribution,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    EndOfLife(EndOfLife),
    SecurityPatchAvailable {
        active: Distribution,
        patch: SecurityPatchAvailable,
    },
    /// A newer patch release without the security flag.
    LatestPatch {
        active: Distribution,
        target: Distribution,
    },
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advisory::EndOfLife(eol) => {
                let upgrades: Vec<_> = eol.suggested_upgrades.iter().map(|m| m.to_string()).collect();
                write!(
                    f,
                    "Your current active minor version {} is reaching the end of life on {}. \
                     We strongly recommend you to upgrade to the available higher minor versions: {}.",
                    eol.minor,
                    eol.date,
                    upgrades.join(", ")
                )
            }
            Advisory::SecurityPatchAvailable { active, patch } => write!(
                f,
                "The locally installed minor version {}-{} has a latest version {} including security patches. \
                 We strongly recommend you to download {} by \"meshver fetch\".",
                active.minor(),
                active.flavor,
                patch.target,
                patch.target
            ),
            Advisory::LatestPatch { active, target } => write!(
                f,
                "There is a newer patch version {} available for {}. Consider running \"meshver fetch --name {}\".",
                target, active, target
            ),
        }
    }
}

/// Reports end of life when `today` is on or after the minor version's EOL date.
pub fn check_end_of_life(active: &Distribution, manifest: &Manifest, clock: &dyn Clock) -> Option<EndOfLife> {
    let minor = active.minor();
    let date = manifest.eol_date(minor)?;
    if clock.today() < date {
        return None;
    }
    let suggested_upgrades = manifest
        .minor_versions()
        .into_iter()
        .filter(|m| *m > minor)
        .collect();
    Some(EndOfLife { minor, date, suggested_upgrades })
}

/// Greatest security-flagged release in the active minor version and flavor, if newer.
pub fn check_security_patch(active: &Distribution, manifest: &Manifest) -> Option<SecurityPatchAvailable> {
    newer_in_minor(active, manifest, true).map(|target| SecurityPatchAvailable { target })
}

/// Greatest release in the active minor version and flavor, if newer.
pub fn check_latest_patch(active: &Distribution, manifest: &Manifest) -> Option<Distribution> {
    newer_in_minor(active, manifest, false)
}

fn newer_in_minor(active: &Distribution, manifest: &Manifest, security_only: bool) -> Option<Distribution> {
    let minor = active.minor();
    manifest
        .entries()
        .iter()
        .filter(|e| !security_only || e.is_security_patch)
        .map(|e| &e.distribution)
        .filter(|d| d.flavor == active.flavor && minor.contains(&d.version) && d.version > active.version)
        .max()
        .cloned()
}

/// Runs every check. A security patch supersedes the plain latest-patch notice.
pub fn advise(active: &Distribution, manifest: &Manifest, clock: &dyn Clock) -> Vec<Advisory> {
    let mut advisories = Vec::new();
    if let Some(eol) = check_end_of_life(active, manifest, clock) {
        advisories.push(Advisory::EndOfLife(eol));
    }
    if let Some(patch) = check_security_patch(active, manifest) {
        advisories.push(Advisory::SecurityPatchAvailable { active: active.clone(), patch });
    } else if let Some(target) = check_latest_patch(active, manifest) {
        advisories.push(Advisory::LatestPatch { active: active.clone(), target });
    }
    advisories
}
