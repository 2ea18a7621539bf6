use std::io::Read;
use std::path::Path;
use std::time::Duration;
use anyhow::{anyhow, Context};
use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};
use crate::distribution::Distribution;
use crate::error::{Error, Result};
use crate::manifest::ManifestEntry;
use crate::util::{current_platform, format_hash, set_executable, BINARY_NAME};

/// Downloads the executable of a manifest entry to a caller-chosen path.
///
/// Implementations report failures as [`Error::TransportFailure`] (or
/// [`Error::IntegrityFailure`]) and must not retry on behalf of the caller's caller.
pub trait Transport {
    fn download(&self, entry: &ManifestEntry, dest: &Path) -> Result<()>;
}

/// Fetches `istioctl` tarballs from a base URL.
///
/// Artifacts live at `{base}/{name}/istioctl-{name}-{platform}.tar.gz`.
/// A `file://` base reads the archives from local disk instead.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        HttpTransport {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn artifact_url(&self, distribution: &Distribution) -> String {
        let name = distribution.name();
        format!("{}/{name}/istioctl-{name}-{}.tar.gz", self.base_url, current_platform())
    }

    fn fetch_bytes(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        if let Some(path) = url.strip_prefix("file://") {
            return std::fs::read(path).with_context(|| format!("could not read {path}"));
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("meshver/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let bytes = client
            .get(url)
            .send()?
            .error_for_status()?
            .bytes()?;
        Ok(bytes.to_vec())
    }
}

impl Transport for HttpTransport {
    fn download(&self, entry: &ManifestEntry, dest: &Path) -> Result<()> {
        let name = entry.distribution.name();
        let failure = |e: anyhow::Error| Error::TransportFailure {
            name: name.clone(),
            detail: format!("{e:#}"),
        };
        let url = self.artifact_url(&entry.distribution);
        let bytes = self.fetch_bytes(&url).map_err(failure)?;
        if let Some(expected) = &entry.sha256 {
            verify_checksum(&name, &bytes, expected)?;
        }
        extract_binary(&bytes, dest).map_err(failure)?;
        set_executable(dest)?;
        Ok(())
    }
}

/// Compares the SHA-256 of `bytes` against `expected` (hex, optional `sha256:` prefix).
pub fn verify_checksum(name: &str, bytes: &[u8], expected: &str) -> Result<()> {
    let actual = hex::encode(Sha256::digest(bytes).as_slice());
    let expected = format_hash(expected);
    if actual != expected {
        return Err(Error::IntegrityFailure {
            name: name.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

/// Extracts the `istioctl` entry of a gzipped tarball into `dest`.
fn extract_binary(archive: &[u8], dest: &Path) -> anyhow::Result<()> {
    let mut tar = tar::Archive::new(GzDecoder::new(archive));
    for entry in tar.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();
        if !entry.header().entry_type().is_file() {
            continue;
        }
        if path.file_name().and_then(|n| n.to_str()) == Some(BINARY_NAME) {
            let mut content = Vec::new();
            entry.read_to_end(&mut content)?;
            std::fs::write(dest, content)
                .with_context(|| format!("could not write {}", dest.display()))?;
            return Ok(());
        }
    }
    Err(anyhow!("archive does not contain {BINARY_NAME}"))
}
