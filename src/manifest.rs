use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use crate::distribution::{Distribution, Flavor, MinorVersion};
use crate::error::{Error, Result};

/// A distribution as listed in the manifest, with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    #[serde(flatten)]
    pub distribution: Distribution,
    /// Supported Kubernetes versions, e.g. `["1.17", "1.18"]`.
    #[serde(default)]
    pub k8s_versions: Vec<String>,
    /// Release notes or links to them.
    #[serde(default)]
    pub release_notes: Vec<String>,
    /// Whether this release carries security fixes.
    #[serde(default)]
    pub is_security_patch: bool,
    /// Optional SHA-256 of the downloadable archive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl ManifestEntry {
    pub fn new(distribution: Distribution) -> Self {
        ManifestEntry {
            distribution,
            k8s_versions: Vec::new(),
            release_notes: Vec::new(),
            is_security_patch: false,
            sha256: None,
        }
    }
}

/// The catalog of fetchable distributions.
///
/// Entries keep their declaration order: the first entry of a flavor is the
/// preferred one for that flavor. A manifest is never mutated once loaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    distributions: Vec<ManifestEntry>,
    /// End-of-life dates keyed by `major.minor`, written as `YYYY-MM-DD`.
    #[serde(default)]
    minor_version_eol_dates: BTreeMap<String, NaiveDate>,
}

impl Manifest {
    pub fn new(distributions: Vec<ManifestEntry>, minor_version_eol_dates: BTreeMap<String, NaiveDate>) -> Self {
        Manifest { distributions, minor_version_eol_dates }
    }

    /// Decodes a manifest, rejecting entries that identify the same distribution.
    pub fn from_json(json: &str) -> Result<Self> {
        let manifest: Manifest = serde_json::from_str(json)?;
        let mut seen = HashSet::new();
        for entry in &manifest.distributions {
            if !seen.insert(&entry.distribution) {
                return Err(Error::ManifestUnavailable {
                    detail: format!("{} is listed more than once", entry.distribution),
                });
            }
        }
        Ok(manifest)
    }

    /// Entries in declaration order.
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.distributions
    }

    pub fn find(&self, distribution: &Distribution) -> Option<&ManifestEntry> {
        self.distributions.iter().find(|e| &e.distribution == distribution)
    }

    pub fn contains(&self, distribution: &Distribution) -> bool {
        self.find(distribution).is_some()
    }

    /// The first declared entry of the flavor.
    pub fn preferred(&self, flavor: Flavor) -> Option<&ManifestEntry> {
        self.distributions.iter().find(|e| e.distribution.flavor == flavor)
    }

    pub fn eol_date(&self, minor: MinorVersion) -> Option<NaiveDate> {
        self.minor_version_eol_dates.get(&minor.to_string()).copied()
    }

    /// Distinct minor versions present in the manifest, ascending.
    pub fn minor_versions(&self) -> Vec<MinorVersion> {
        let mut minors: Vec<_> = self.distributions
            .iter()
            .map(|e| e.distribution.minor())
            .collect();
        minors.sort();
        minors.dedup();
        minors
    }
}

/// Supplies the manifest. Any failure is reported as [`Error::ManifestUnavailable`].
pub trait ManifestSource {
    fn fetch(&self) -> Result<Manifest>;
}

/// Reads the manifest from a local JSON file.
#[derive(Debug, Clone)]
pub struct FileManifestSource {
    path: PathBuf,
}

impl FileManifestSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        FileManifestSource { path: path.as_ref().to_path_buf() }
    }
}

impl ManifestSource for FileManifestSource {
    fn fetch(&self) -> Result<Manifest> {
        let unavailable = |detail: String| Error::ManifestUnavailable {
            detail: format!("{}: {detail}", self.path.display()),
        };
        let body = std::fs::read_to_string(&self.path).map_err(|e| unavailable(e.to_string()))?;
        Manifest::from_json(&body).map_err(|e| unavailable(e.to_string()))
    }
}

/// Downloads the manifest over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpManifestSource {
    url: String,
    timeout: Duration,
}

impl HttpManifestSource {
    pub fn new(url: &str, timeout: Duration) -> Self {
        HttpManifestSource { url: url.to_string(), timeout }
    }

    fn download(&self) -> anyhow::Result<String> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("meshver/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let body = client
            .get(&self.url)
            .send()?
            .error_for_status()?
            .text()?;
        Ok(body)
    }
}

impl ManifestSource for HttpManifestSource {
    fn fetch(&self) -> Result<Manifest> {
        let unavailable = |detail: String| Error::ManifestUnavailable {
            detail: format!("{}: {detail}", self.url),
        };
        let body = self.download().map_err(|e| unavailable(format!("{e:#}")))?;
        Manifest::from_json(&body).map_err(|e| unavailable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semver::Version;
    use tempfile::tempdir;

    const MANIFEST: &str = r#"{
        "distributions": [
            {"version": "1.9.5", "flavor": "vendor", "flavor_version": 0,
             "k8s_versions": ["1.17", "1.18"], "release_notes": ["https://example.com/1.9.5"]},
            {"version": "1.9.5", "flavor": "base", "flavor_version": 0},
            {"version": "1.8.6", "flavor": "vendor", "flavor_version": 0, "is_security_patch": true},
            {"version": "1.8.3", "flavor": "hardened", "flavor_version": 1}
        ],
        "minor_version_eol_dates": {"1.8": "2021-05-12"}
    }"#;

    fn dist(version: &str, flavor: Flavor, flavor_version: u64) -> Distribution {
        Distribution::new(Version::parse(version).unwrap(), flavor, flavor_version)
    }

    #[test]
    fn test_from_json_keeps_declaration_order() {
        let manifest = Manifest::from_json(MANIFEST).unwrap();
        let names: Vec<_> = manifest.entries()
            .iter()
            .map(|e| e.distribution.to_string())
            .collect();
        assert_eq!(names, vec!["1.9.5-vendor-v0", "1.9.5-base-v0", "1.8.6-vendor-v0", "1.8.3-hardened-v1"]);
        let first = &manifest.entries()[0];
        assert_eq!(first.k8s_versions, vec!["1.17", "1.18"]);
        assert_eq!(first.release_notes.len(), 1);
        assert!(!first.is_security_patch);
        assert!(manifest.entries()[2].is_security_patch);
    }

    #[test]
    fn test_preferred_is_first_of_flavor() {
        let manifest = Manifest::from_json(MANIFEST).unwrap();
        assert_eq!(manifest.preferred(Flavor::Vendor).unwrap().distribution, dist("1.9.5", Flavor::Vendor, 0));
        assert_eq!(manifest.preferred(Flavor::Hardened).unwrap().distribution, dist("1.8.3", Flavor::Hardened, 1));
    }

    #[test]
    fn test_lookups() {
        let manifest = Manifest::from_json(MANIFEST).unwrap();
        assert!(manifest.contains(&dist("1.8.6", Flavor::Vendor, 0)));
        assert!(!manifest.contains(&dist("1.8.6", Flavor::Vendor, 1)));
        assert_eq!(manifest.eol_date(MinorVersion { major: 1, minor: 8 }), NaiveDate::from_ymd_opt(2021, 5, 12));
        assert_eq!(manifest.eol_date(MinorVersion { major: 1, minor: 9 }), None);
        let minors: Vec<_> = manifest.minor_versions().iter().map(|m| m.to_string()).collect();
        assert_eq!(minors, vec!["1.8", "1.9"]);
    }

    #[test]
    fn test_unknown_flavor_is_rejected() {
        let json = r#"{"distributions": [{"version": "1.8.6", "flavor": "nope", "flavor_version": 0}]}"#;
        assert!(Manifest::from_json(json).is_err());
    }

    #[test]
    fn test_pre_release_version_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        let json = r#"{"distributions": [{"version": "1.9.0-beta.1", "flavor": "vendor", "flavor_version": 0}]}"#;
        std::fs::write(&path, json).unwrap();
        let err = FileManifestSource::new(&path).fetch().unwrap_err();
        match err {
            Error::ManifestUnavailable { detail } => assert!(detail.contains("1.9.0-beta.1"), "{detail}"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_malformed_eol_dates_are_rejected() {
        for bad in ["2021/05/12", "2021-02-30", "soon"] {
            let json = format!(
                r#"{{"distributions": [{{"version": "1.8.6", "flavor": "vendor", "flavor_version": 0}}],
                    "minor_version_eol_dates": {{"1.8": "{bad}"}}}}"#
            );
            assert!(Manifest::from_json(&json).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_duplicate_entries_are_rejected() {
        let json = r#"{"distributions": [
            {"version": "1.8.6", "flavor": "vendor", "flavor_version": 0, "k8s_versions": ["1.17"]},
            {"version": "1.8.6", "flavor": "base", "flavor_version": 0},
            {"version": "1.8.6", "flavor": "vendor", "flavor_version": 0}
        ]}"#;
        let err = Manifest::from_json(json).unwrap_err();
        assert!(matches!(err, Error::ManifestUnavailable { ref detail } if detail.contains("1.8.6-vendor-v0")));
    }

    #[test]
    fn test_file_source() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        std::fs::write(&path, MANIFEST).unwrap();
        let manifest = FileManifestSource::new(&path).fetch().unwrap();
        assert_eq!(manifest.entries().len(), 4);

        let missing = FileManifestSource::new(dir.path().join("missing.json")).fetch();
        assert!(matches!(missing, Err(Error::ManifestUnavailable { .. })));

        std::fs::write(&path, "not json").unwrap();
        let broken = FileManifestSource::new(&path).fetch();
        assert!(matches!(broken, Err(Error::ManifestUnavailable { .. })));
    }
}
