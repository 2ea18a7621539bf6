use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::error::Result;
use crate::manifest::{FileManifestSource, HttpManifestSource, ManifestSource};
use crate::transport::HttpTransport;

pub const CONFIG_FILE: &str = "config.toml";
pub const MANIFEST_PATH_ENV: &str = "MESHVER_MANIFEST_PATH";
pub const DOWNLOAD_URL_ENV: &str = "MESHVER_DOWNLOAD_URL";

/// Represents the contents of `<home>/config.toml`.
///
/// Every key is optional; missing keys take their default.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct MeshverConfig {
    /// Where the manifest JSON is downloaded from.
    pub manifest_url: String,
    /// Base URL of the `istioctl` archives. `file://` bases are read from disk.
    pub download_url: String,
    /// Timeout for every HTTP request, in seconds.
    pub timeout_secs: u64,
    /// Local manifest file overriding `manifest_url`. Only set from the environment.
    #[serde(skip)]
    pub manifest_path: Option<PathBuf>,
}

impl Default for MeshverConfig {
    fn default() -> Self {
        MeshverConfig {
            manifest_url: "https://dl.meshver.dev/manifest.json".to_string(),
            download_url: "https://dl.meshver.dev/istioctl".to_string(),
            timeout_secs: 60,
            manifest_path: None,
        }
    }
}

impl MeshverConfig {
    /// Saves the config to the given file path in pretty TOML format.
    ///
    /// # Errors
    /// Returns an error if the file can't be written or serialization fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }
    /// Loads the config from a file path.
    ///
    /// # Errors
    /// Returns an error if the file can't be read or deserialized.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<MeshverConfig> {
        let toml = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&toml)?)
    }
    /// Loads the config, or returns the defaults if the file does not exist.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<MeshverConfig> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(MeshverConfig::default())
        }
    }
    /// Applies `MESHVER_MANIFEST_PATH` and `MESHVER_DOWNLOAD_URL`.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var_os(MANIFEST_PATH_ENV).map(PathBuf::from),
            std::env::var(DOWNLOAD_URL_ENV).ok(),
        )
    }

    fn with_overrides(mut self, manifest_path: Option<PathBuf>, download_url: Option<String>) -> Self {
        if let Some(path) = manifest_path.filter(|p| !p.as_os_str().is_empty()) {
            self.manifest_path = Some(path);
        }
        if let Some(url) = download_url.filter(|u| !u.is_empty()) {
            self.download_url = url;
        }
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn manifest_source(&self) -> Box<dyn ManifestSource> {
        match &self.manifest_path {
            Some(path) => Box::new(FileManifestSource::new(path)),
            None => Box::new(HttpManifestSource::new(&self.manifest_url, self.timeout())),
        }
    }

    pub fn transport(&self) -> HttpTransport {
        HttpTransport::new(&self.download_url, self.timeout())
    }
}
