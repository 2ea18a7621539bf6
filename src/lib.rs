//! # Meshver Core Library
//!
//! This crate contains the core logic of the `meshver` tool – a version manager for flavored
//! `istioctl` distributions.
//!
//! A distribution is identified by `{version}-{flavor}-v{flavor version}`, e.g. `1.8.6-vendor-v0`.
//! `meshver` resolves partial user input against a manifest of available distributions, fetches
//! the matching executable into a local installation directory, switches the active one and prunes
//! the rest.
//!
//! This library is built for the `meshver` CLI, but you can also reuse it as a backend in other tools.
//!
//! ## Modules Overview
//! - [`distribution`] – The distribution identifier: parsing, display and ordering
//! - [`manifest`] – The manifest of available distributions and where it comes from
//! - [`resolver`] – Turning partial requests into one concrete distribution
//! - [`installation`] – Fetching, switching, listing and pruning installed distributions
//! - [`transport`] – Downloading and unpacking `istioctl` archives
//! - [`advisor`] – End-of-life and security-patch advisories
//! - [`shims`] – The stable `istioctl` shim pointing at the active executable
//! - [`config`] – `config.toml` and environment overrides
//! - [`global`] – Global locations (e.g., the installation home)
//! - [`util`] – Shared utilities (platform names, hashing, permissions)
//! - [`error`] – The error type shared by all of the above


pub mod error;
pub mod distribution;
pub mod manifest;
pub mod resolver;
pub mod installation;
pub mod transport;
pub mod advisor;
pub mod shims;
pub mod config;
pub mod util;
pub mod global;

pub use error::{Error, Result};
pub use distribution::*;
pub use manifest::*;
pub use resolver::*;
pub use installation::*;
pub use transport::*;
pub use advisor::*;
pub use shims::*;
pub use config::*;
pub use util::*;
pub use global::utils::*;
