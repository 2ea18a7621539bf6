use std::path::Path;

/// File name of the wrapped executable inside every installed distribution.
#[cfg(target_os = "windows")]
pub const BINARY_NAME: &str = "istioctl.exe";

#[cfg(not(target_os = "windows"))]
pub const BINARY_NAME: &str = "istioctl";

/// Strips the `sha256:` prefix from a hash if present and lowercases it.
/// This is useful for comparing hashes uniformly.
pub fn format_hash(hash: &str) -> String {
    hash.strip_prefix("sha256:").unwrap_or(hash).trim().to_ascii_lowercase()
}

/// Returns the platform suffix used in artifact names (e.g. `linux-amd64`)
/// based on the host system's architecture and operating system.
pub fn current_platform() -> String {
    let arch = std::env::consts::ARCH;
    let os = std::env::consts::OS;

    match (arch, os) {
        ("x86_64", "linux") => "linux-amd64".to_string(),
        ("aarch64", "linux") => "linux-arm64".to_string(),
        ("x86_64", "macos") => "osx".to_string(),
        ("aarch64", "macos") => "osx-arm64".to_string(),
        ("x86_64", "windows") => "win".to_string(),
        _ => format!("{}-{}", os, arch),
    }
}

/// Checks if a given path is an executable file on Unix.
#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Checks if a given path has a Windows executable extension (.exe, .bat, .cmd).
#[cfg(windows)]
pub fn is_executable(path: &Path) -> bool {
    if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
        let ext = ext.to_ascii_lowercase();
        path.is_file() && matches!(ext.as_str(), "exe" | "bat" | "cmd")
    } else {
        false
    }
}

/// Adds the executable bits on Unix. No-op elsewhere.
#[cfg(unix)]
pub fn set_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(perms.mode() | 0o755);
    std::fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
pub fn set_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
