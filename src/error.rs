//! Error types shared by the resolver and the installation lifecycle.

/// Errors that can occur while resolving, fetching, switching or pruning distributions.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The string is not of the form `<version>-<flavor>-v<flavor version>`.
    #[error("cannot parse '{name}' as a distribution name: {reason}")]
    MalformedName { name: String, reason: String },

    /// A `--version` value that is neither `major.minor` nor `major.minor.patch`.
    #[error("invalid version '{version}'")]
    InvalidVersion { version: String },

    /// The distribution is not listed in the manifest.
    #[error("distribution {name} is not listed in the manifest")]
    UnknownDistribution { name: String },

    /// No entry of the flavor exists in the requested minor version.
    #[error("no {flavor} distribution found for version {version}")]
    NoMatchingVersion { version: String, flavor: String },

    /// The manifest has no entry for the version and flavor pair.
    #[error("unsupported version={version} and flavor={flavor}")]
    UnsupportedVersionFlavor { version: String, flavor: String },

    /// The manifest could not be retrieved or decoded.
    #[error("error fetching manifest: {detail}")]
    ManifestUnavailable { detail: String },

    /// The distribution has not been fetched.
    #[error("{name} is not installed; run `meshver fetch --name {name}` first")]
    NotInstalled { name: String },

    /// Pruning would remove the active distribution.
    #[error("{name} is the active distribution and cannot be pruned")]
    CannotPruneActive { name: String },

    /// The active pointer names a distribution that is not installed.
    #[error("active distribution {name} is not installed")]
    DanglingActive { name: String },

    /// Download or install of the artifact failed.
    #[error("failed to fetch {name}: {detail}")]
    TransportFailure { name: String, detail: String },

    /// The downloaded artifact does not match the manifest checksum.
    #[error("checksum mismatch for {name}: expected {expected}, got {actual}")]
    IntegrityFailure {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;
