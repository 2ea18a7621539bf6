use std::path::Path;
use crate::error::Result;

/// Creates or replaces a platform-specific "shim" that forwards execution to `target`.
///
/// On Unix systems, this creates a symbolic link at `shim_path` pointing to `target`.
/// On Windows, it creates a `.bat` script at `shim_path` (with a `.bat` extension) that calls the `target`.
///
/// The shim is first created under a temporary name next to `shim_path` and then
/// renamed over it, so a concurrent invocation sees either the old or the new shim.
///
/// # Errors
///
/// Returns an error if the symlink (on Unix) or file write (on Windows) fails.
///
/// # Examples
///
/// ```no_run
/// use std::path::PathBuf;
/// use meshver::replace_shim;
///
/// let target = PathBuf::from("/home/me/.meshver/versions/1.8.6-vendor-v0/istioctl");
/// let shim = PathBuf::from("/home/me/.meshver/bin/istioctl");
/// replace_shim(target, shim).unwrap();
/// ```
pub fn replace_shim<P: AsRef<Path>>(
    target: P,
    shim_path: P
) -> Result<()> {
    let shim_path = shim_path.as_ref();
    let dir = shim_path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::symlink;
        let tmp = tempfile::Builder::new()
            .prefix(".shim-")
            .tempdir_in(dir)?;
        let staged = tmp.path().join("link");
        symlink(target.as_ref(), &staged)?;
        std::fs::rename(&staged, shim_path)?;
    }
    #[cfg(windows)]
    {
        use std::io::Write;
        let script = format!(
            "@echo off\r\ncall \"{}\" %*\r\n",
            target.as_ref().display()
        );
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(script.as_bytes())?;
        tmp.persist(shim_path.with_extension("bat")).map_err(|e| e.error)?;
    }
    Ok(())
}

/// Removes the shim if present.
pub fn remove_shim<P: AsRef<Path>>(shim_path: P) -> Result<()> {
    #[cfg(windows)]
    let shim_path = shim_path.as_ref().with_extension("bat");
    #[cfg(not(windows))]
    let shim_path = shim_path.as_ref().to_path_buf();
    match std::fs::remove_file(&shim_path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
