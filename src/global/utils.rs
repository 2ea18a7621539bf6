use std::path::PathBuf;
use anyhow::{anyhow, Result};
use directories::ProjectDirs;

pub const HOME_ENV: &str = "MESHVER_HOME";

/// The installation root: `$MESHVER_HOME`, or the platform data directory.
pub fn get_home_dir() -> Result<PathBuf> {
    match std::env::var_os(HOME_ENV) {
        Some(home) if !home.is_empty() => Ok(PathBuf::from(home)),
        _ => get_global_data_dir(),
    }
}

pub fn get_global_data_dir() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("dev", "meshver", "meshver")
        .ok_or_else(|| anyhow!("Could not get project directories"))?;
    Ok(proj_dirs.data_dir().to_path_buf())
}
