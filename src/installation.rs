//! The local installation directory and the fetch, switch and prune lifecycle.
//!
//! Layout:
//! ```text
//! <root>/
//!   versions/
//!     <version>-<flavor>-v<flavor version>/
//!       istioctl        the fetched executable
//!   active              canonical name of the active distribution
//!   bin/
//!     istioctl          shim pointing at the active executable
//! ```
//!
//! Every mutation is a rename: fetched artifacts are staged in a hidden
//! directory under `versions/`, the `active` pointer is written to a temp file
//! first, and pruned directories are moved aside before deletion. Concurrent
//! invocations therefore never observe a half-written distribution.

use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;
use crate::distribution::Distribution;
use crate::error::{Error, Result};
use crate::manifest::Manifest;
use crate::shims::{remove_shim, replace_shim};
use crate::transport::Transport;
use crate::util::BINARY_NAME;

const VERSIONS_DIR: &str = "versions";
const BIN_DIR: &str = "bin";
const ACTIVE_FILE: &str = "active";

/// Result of [`Installation::fetch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Fetched,
    AlreadyInstalled,
}

/// An installed distribution and whether it is the active one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledDistribution {
    pub distribution: Distribution,
    pub active: bool,
}

/// Handle over an installation directory.
///
/// Built once per invocation and passed to whatever needs it; it holds no
/// state besides the root path, everything else is read from disk.
#[derive(Debug, Clone)]
pub struct Installation {
    root: PathBuf,
}

impl Installation {
    /// Opens the installation at `root`, creating the directory structure if needed.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join(VERSIONS_DIR))?;
        std::fs::create_dir_all(root.join(BIN_DIR))?;
        Ok(Installation { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn versions_dir(&self) -> PathBuf {
        self.root.join(VERSIONS_DIR)
    }

    fn active_file(&self) -> PathBuf {
        self.root.join(ACTIVE_FILE)
    }

    pub fn distribution_dir(&self, distribution: &Distribution) -> PathBuf {
        self.versions_dir().join(distribution.name())
    }

    /// Path of the executable of `distribution`, installed or not.
    pub fn binary_path(&self, distribution: &Distribution) -> PathBuf {
        self.distribution_dir(distribution).join(BINARY_NAME)
    }

    /// Path of the stable shim that always targets the active executable.
    pub fn shim_path(&self) -> PathBuf {
        self.root.join(BIN_DIR).join("istioctl")
    }

    pub fn is_installed(&self, distribution: &Distribution) -> bool {
        self.binary_path(distribution).is_file()
    }

    /// Downloads and installs `distribution`.
    ///
    /// Already installed distributions are left untouched. The artifact is
    /// downloaded into a hidden staging directory and renamed into place only
    /// once complete; on failure nothing is left behind.
    pub fn fetch(
        &self,
        manifest: &Manifest,
        distribution: &Distribution,
        transport: &dyn Transport,
    ) -> Result<FetchOutcome> {
        if self.is_installed(distribution) {
            return Ok(FetchOutcome::AlreadyInstalled);
        }
        let entry = manifest
            .find(distribution)
            .ok_or_else(|| Error::UnknownDistribution { name: distribution.name() })?;

        let staging = tempfile::Builder::new()
            .prefix(".fetch-")
            .tempdir_in(self.versions_dir())?;
        transport.download(entry, &staging.path().join(BINARY_NAME))?;

        let target = self.distribution_dir(distribution);
        if target.exists() && !self.is_installed(distribution) {
            // Leftover without an executable, e.g. from a manual copy.
            std::fs::remove_dir_all(&target)?;
        }
        match std::fs::rename(staging.path(), &target) {
            Ok(()) => Ok(FetchOutcome::Fetched),
            // Another invocation finished the same fetch first.
            Err(_) if self.is_installed(distribution) => Ok(FetchOutcome::AlreadyInstalled),
            Err(e) => Err(e.into()),
        }
    }

    /// Points the shim and then the active pointer at `distribution`.
    ///
    /// The pointer is persisted last. If the shim cannot be replaced the
    /// pointer is untouched, and if persisting the pointer fails the shim is
    /// put back to the previous active distribution.
    pub fn switch_active(&self, distribution: &Distribution) -> Result<()> {
        if !self.is_installed(distribution) {
            return Err(Error::NotInstalled { name: distribution.name() });
        }
        let previous = self.active().ok().flatten();
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        tmp.write_all(distribution.name().as_bytes())?;
        tmp.as_file().sync_all()?;

        replace_shim(self.binary_path(distribution), self.shim_path())?;
        if let Err(e) = tmp.persist(self.active_file()) {
            let restored = match &previous {
                Some(previous) => replace_shim(self.binary_path(previous), self.shim_path()),
                None => remove_shim(self.shim_path()),
            };
            if let Err(restore) = restored {
                warn!("could not restore the shim after a failed switch: {restore}");
            }
            return Err(e.error.into());
        }
        Ok(())
    }

    /// The active distribution, if any.
    ///
    /// Fails with [`Error::DanglingActive`] when the pointer names something
    /// that is not installed; see [`Installation::repair_active`].
    pub fn active(&self) -> Result<Option<Distribution>> {
        let name = match std::fs::read_to_string(self.active_file()) {
            Ok(name) => name.trim().to_string(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if name.is_empty() {
            return Ok(None);
        }
        match name.parse::<Distribution>() {
            Ok(distribution) if self.is_installed(&distribution) => Ok(Some(distribution)),
            _ => Err(Error::DanglingActive { name }),
        }
    }

    /// Clears a dangling active pointer.
    ///
    /// Returns the name the pointer held if it had to be cleared.
    pub fn repair_active(&self) -> Result<Option<String>> {
        match self.active() {
            Err(Error::DanglingActive { name }) => {
                std::fs::remove_file(self.active_file())?;
                remove_shim(self.shim_path())?;
                Ok(Some(name))
            }
            Err(e) => Err(e),
            Ok(_) => Ok(None),
        }
    }

    /// Installed distributions in ascending order.
    pub fn installed(&self) -> Result<Vec<Distribution>> {
        let mut installed = Vec::new();
        for entry in WalkDir::new(self.versions_dir()).min_depth(1).max_depth(1) {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            if let Ok(distribution) = name.parse::<Distribution>() {
                if self.is_installed(&distribution) {
                    installed.push(distribution);
                }
            }
        }
        installed.sort();
        Ok(installed)
    }

    /// Installed distributions in ascending order, the active one marked.
    pub fn list_installed(&self) -> Result<Vec<InstalledDistribution>> {
        let active = self.active()?;
        Ok(self
            .installed()?
            .into_iter()
            .map(|distribution| InstalledDistribution {
                active: active.as_ref() == Some(&distribution),
                distribution,
            })
            .collect())
    }

    /// Removes `target`, or every installed distribution except the active one.
    ///
    /// Returns what was removed.
    pub fn prune(&self, target: Option<&Distribution>) -> Result<Vec<Distribution>> {
        let active = self.active()?;
        match target {
            Some(target) => {
                if active.as_ref() == Some(target) {
                    return Err(Error::CannotPruneActive { name: target.name() });
                }
                if !self.is_installed(target) {
                    return Err(Error::NotInstalled { name: target.name() });
                }
                self.remove(target)?;
                Ok(vec![target.clone()])
            }
            None => {
                let mut removed = Vec::new();
                for distribution in self.installed()? {
                    if active.as_ref() == Some(&distribution) {
                        continue;
                    }
                    self.remove(&distribution)?;
                    removed.push(distribution);
                }
                Ok(removed)
            }
        }
    }

    fn remove(&self, distribution: &Distribution) -> Result<()> {
        let trash = tempfile::Builder::new()
            .prefix(".prune-")
            .tempdir_in(self.versions_dir())?;
        std::fs::rename(self.distribution_dir(distribution), trash.path().join("dist"))?;
        trash.close()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::BTreeMap;
    use tempfile::tempdir;
    use crate::manifest::ManifestEntry;

    /// Writes a stub executable and counts calls.
    #[derive(Default)]
    struct FakeTransport {
        calls: Cell<usize>,
        fail: bool,
    }

    impl Transport for FakeTransport {
        fn download(&self, entry: &ManifestEntry, dest: &Path) -> Result<()> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                std::fs::write(dest, "partial")?;
                return Err(Error::TransportFailure {
                    name: entry.distribution.name(),
                    detail: "connection reset".to_string(),
                });
            }
            std::fs::write(dest, format!("#!/bin/sh\necho {}\n", entry.distribution))?;
            Ok(())
        }
    }

    fn dist(name: &str) -> Distribution {
        name.parse().unwrap()
    }

    fn manifest() -> Manifest {
        let entries = ["1.9.0-vendor-v0", "1.8.6-vendor-v0", "1.8.6-base-v0", "1.7.8-hardened-v0"]
            .iter()
            .map(|n| ManifestEntry::new(dist(n)))
            .collect();
        Manifest::new(entries, BTreeMap::new())
    }

    fn fetched(install: &Installation, names: &[&str]) {
        let transport = FakeTransport::default();
        for name in names {
            install.fetch(&manifest(), &dist(name), &transport).unwrap();
        }
    }

    #[test]
    fn test_open_creates_layout() {
        let dir = tempdir().unwrap();
        let install = Installation::open(dir.path().join("home")).unwrap();
        assert!(install.root().join("versions").is_dir());
        assert!(install.root().join("bin").is_dir());
        assert_eq!(install.active().unwrap(), None);
        assert!(install.installed().unwrap().is_empty());
    }

    #[test]
    fn test_fetch_is_idempotent() {
        let dir = tempdir().unwrap();
        let install = Installation::open(dir.path()).unwrap();
        let transport = FakeTransport::default();
        let d = dist("1.8.6-vendor-v0");

        assert_eq!(install.fetch(&manifest(), &d, &transport).unwrap(), FetchOutcome::Fetched);
        assert_eq!(install.fetch(&manifest(), &d, &transport).unwrap(), FetchOutcome::AlreadyInstalled);
        assert_eq!(transport.calls.get(), 1);
        assert_eq!(install.installed().unwrap(), vec![d.clone()]);
        assert!(install.binary_path(&d).is_file());
    }

    #[test]
    fn test_fetch_unknown_distribution() {
        let dir = tempdir().unwrap();
        let install = Installation::open(dir.path()).unwrap();
        let transport = FakeTransport::default();
        let err = install.fetch(&manifest(), &dist("1.70.4-vendor-v0"), &transport).unwrap_err();
        assert!(matches!(err, Error::UnknownDistribution { .. }));
        assert_eq!(transport.calls.get(), 0);
    }

    #[test]
    fn test_failed_fetch_leaves_nothing_behind() {
        let dir = tempdir().unwrap();
        let install = Installation::open(dir.path()).unwrap();
        let transport = FakeTransport { fail: true, ..FakeTransport::default() };
        let d = dist("1.8.6-vendor-v0");

        let err = install.fetch(&manifest(), &d, &transport).unwrap_err();
        assert!(matches!(err, Error::TransportFailure { .. }));
        assert!(!install.is_installed(&d));
        assert!(!install.distribution_dir(&d).exists());
        let leftovers = std::fs::read_dir(install.root().join("versions")).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_switch_requires_installed() {
        let dir = tempdir().unwrap();
        let install = Installation::open(dir.path()).unwrap();
        fetched(&install, &["1.8.6-vendor-v0"]);
        install.switch_active(&dist("1.8.6-vendor-v0")).unwrap();

        let err = install.switch_active(&dist("1.9.0-vendor-v0")).unwrap_err();
        assert!(matches!(err, Error::NotInstalled { name } if name == "1.9.0-vendor-v0"));
        assert_eq!(install.active().unwrap(), Some(dist("1.8.6-vendor-v0")));
    }

    #[test]
    fn test_switch_retargets_pointer_and_shim() {
        let dir = tempdir().unwrap();
        let install = Installation::open(dir.path()).unwrap();
        fetched(&install, &["1.8.6-vendor-v0", "1.9.0-vendor-v0"]);

        install.switch_active(&dist("1.8.6-vendor-v0")).unwrap();
        assert_eq!(install.active().unwrap(), Some(dist("1.8.6-vendor-v0")));
        install.switch_active(&dist("1.9.0-vendor-v0")).unwrap();
        assert_eq!(install.active().unwrap(), Some(dist("1.9.0-vendor-v0")));
        #[cfg(unix)]
        assert_eq!(
            std::fs::read_link(install.shim_path()).unwrap(),
            install.binary_path(&dist("1.9.0-vendor-v0"))
        );

        let listed = install.list_installed().unwrap();
        assert_eq!(
            listed,
            vec![
                InstalledDistribution { distribution: dist("1.8.6-vendor-v0"), active: false },
                InstalledDistribution { distribution: dist("1.9.0-vendor-v0"), active: true },
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_shim_keeps_previous_active() {
        let dir = tempdir().unwrap();
        let install = Installation::open(dir.path()).unwrap();
        fetched(&install, &["1.8.6-vendor-v0", "1.9.0-vendor-v0"]);
        install.switch_active(&dist("1.8.6-vendor-v0")).unwrap();

        // a directory in place of the shim cannot be renamed over
        std::fs::remove_file(install.shim_path()).unwrap();
        std::fs::create_dir_all(install.shim_path().join("occupied")).unwrap();

        assert!(install.switch_active(&dist("1.9.0-vendor-v0")).is_err());
        assert_eq!(install.active().unwrap(), Some(dist("1.8.6-vendor-v0")));
        assert!(install.shim_path().is_dir());
    }

    #[test]
    fn test_fetch_loses_rename_race() {
        /// Installs the same distribution behind our back while we download it.
        struct RacingTransport<'a> {
            install: &'a Installation,
        }

        impl Transport for RacingTransport<'_> {
            fn download(&self, entry: &ManifestEntry, dest: &Path) -> Result<()> {
                std::fs::write(dest, "ours")?;
                let theirs = self.install.distribution_dir(&entry.distribution);
                std::fs::create_dir_all(&theirs)?;
                std::fs::write(theirs.join(BINARY_NAME), "theirs")?;
                Ok(())
            }
        }

        let dir = tempdir().unwrap();
        let install = Installation::open(dir.path()).unwrap();
        let d = dist("1.8.6-vendor-v0");
        let transport = RacingTransport { install: &install };

        assert_eq!(install.fetch(&manifest(), &d, &transport).unwrap(), FetchOutcome::AlreadyInstalled);
        assert_eq!(install.installed().unwrap(), vec![d.clone()]);
        assert_eq!(std::fs::read_to_string(install.binary_path(&d)).unwrap(), "theirs");
        let names: Vec<_> = std::fs::read_dir(install.root().join("versions"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec![d.name()]);
    }

    #[test]
    fn test_fetch_replaces_leftover_without_executable() {
        let dir = tempdir().unwrap();
        let install = Installation::open(dir.path()).unwrap();
        let d = dist("1.8.6-vendor-v0");
        let leftover = install.distribution_dir(&d);
        std::fs::create_dir_all(&leftover).unwrap();
        std::fs::write(leftover.join("README"), "copied by hand").unwrap();

        let transport = FakeTransport::default();
        assert_eq!(install.fetch(&manifest(), &d, &transport).unwrap(), FetchOutcome::Fetched);
        assert!(install.is_installed(&d));
        assert!(!leftover.join("README").exists());
        assert_eq!(install.installed().unwrap(), vec![d]);
        assert_eq!(std::fs::read_dir(install.root().join("versions")).unwrap().count(), 1);
    }

    #[test]
    fn test_prune_all_keeps_active() {
        let dir = tempdir().unwrap();
        let install = Installation::open(dir.path()).unwrap();
        fetched(&install, &["1.9.0-vendor-v0", "1.8.6-vendor-v0", "1.8.6-base-v0", "1.7.8-hardened-v0"]);
        install.switch_active(&dist("1.8.6-base-v0")).unwrap();

        let removed = install.prune(None).unwrap();
        assert_eq!(removed.len(), 3);
        let listed = install.list_installed().unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].active);
        assert_eq!(listed[0].distribution, dist("1.8.6-base-v0"));
    }

    #[test]
    fn test_prune_specific() {
        let dir = tempdir().unwrap();
        let install = Installation::open(dir.path()).unwrap();
        fetched(&install, &["1.9.0-vendor-v0", "1.8.6-vendor-v0"]);
        install.switch_active(&dist("1.9.0-vendor-v0")).unwrap();

        let err = install.prune(Some(&dist("1.9.0-vendor-v0"))).unwrap_err();
        assert!(matches!(err, Error::CannotPruneActive { .. }));

        install.prune(Some(&dist("1.8.6-vendor-v0"))).unwrap();
        assert_eq!(install.installed().unwrap(), vec![dist("1.9.0-vendor-v0")]);

        let err = install.prune(Some(&dist("1.8.6-vendor-v0"))).unwrap_err();
        assert!(matches!(err, Error::NotInstalled { .. }));
    }

    #[test]
    fn test_prune_empty_installation() {
        let dir = tempdir().unwrap();
        let install = Installation::open(dir.path()).unwrap();
        assert!(install.prune(None).unwrap().is_empty());
    }

    #[test]
    fn test_dangling_active_is_surfaced_and_repaired() {
        let dir = tempdir().unwrap();
        let install = Installation::open(dir.path()).unwrap();
        fetched(&install, &["1.8.6-vendor-v0"]);
        install.switch_active(&dist("1.8.6-vendor-v0")).unwrap();
        std::fs::remove_dir_all(install.distribution_dir(&dist("1.8.6-vendor-v0"))).unwrap();

        assert!(matches!(install.active(), Err(Error::DanglingActive { .. })));
        assert!(matches!(install.prune(None), Err(Error::DanglingActive { .. })));

        assert_eq!(install.repair_active().unwrap(), Some("1.8.6-vendor-v0".to_string()));
        assert_eq!(install.active().unwrap(), None);
        assert_eq!(install.repair_active().unwrap(), None);
    }

    #[test]
    fn test_installed_ignores_foreign_entries() {
        let dir = tempdir().unwrap();
        let install = Installation::open(dir.path()).unwrap();
        fetched(&install, &["1.8.6-vendor-v0"]);
        let versions = install.root().join("versions");
        std::fs::create_dir_all(versions.join("not-a-distribution")).unwrap();
        std::fs::create_dir_all(versions.join("1.9.0-vendor-v0")).unwrap();
        std::fs::write(versions.join("notes.txt"), "x").unwrap();
        assert_eq!(install.installed().unwrap(), vec![dist("1.8.6-vendor-v0")]);
    }
}
