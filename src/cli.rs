use clap::{Args, Parser, Subcommand};
use meshver::Request;

#[derive(Debug, Parser, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct CLI {
    /// Print debug output
    #[clap(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub(crate) command: MeshverCommand,
}

/// Selects a distribution. `--name` wins over the other flags.
#[derive(Debug, Args, Clone, PartialEq, Default)]
pub struct DistributionArgs {
    /// Name of the distribution, e.g. 1.9.0-base-v0
    #[clap(long)]
    pub name: Option<String>,
    /// Version of istioctl, e.g. 1.7.4, or 1.7 for its latest patch
    #[clap(long)]
    pub version: Option<String>,
    /// Flavor of istioctl: vendor, hardened or base
    #[clap(long)]
    pub flavor: Option<String>,
    /// Version of the flavor, e.g. 1. Negative values mean "latest"
    #[clap(long = "flavor-version", allow_negative_numbers = true)]
    pub flavor_version: Option<i64>,
}

impl DistributionArgs {
    pub fn to_request(&self) -> Request {
        Request {
            name: self.name.clone(),
            version: self.version.clone(),
            flavor: self.flavor.clone(),
            flavor_version: self
                .flavor_version
                .filter(|v| *v >= 0)
                .map(|v| v as u64),
        }
    }
}

#[derive(Debug, Subcommand, Clone, PartialEq)]
pub enum MeshverCommand {
    /// Fetches istioctl of the given version, flavor and flavor version and switches to it.
    /// Without flags, fetches the latest vendor build
    Fetch {
        #[command(flatten)]
        target: DistributionArgs,
    },
    /// Switches the active istioctl. Unset flags default to the active distribution
    Switch {
        #[command(flatten)]
        target: DistributionArgs,
    },
    /// Removes fetched distributions. Defaults to all except the active one
    Prune {
        #[command(flatten)]
        target: DistributionArgs,
    },
    /// Shows the fetched distributions and marks the active one
    Show,
    /// Lists the distributions available in the manifest
    List,
    /// Checks the active distribution for end of life and newer patches
    CheckUpgrade,
    /// Runs the active istioctl with the given arguments
    Istioctl {
        #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_flags_map_to_request() {
        let cli = CLI::parse_from([
            "meshver", "fetch", "--version", "1.8", "--flavor", "hardened", "--flavor-version", "2",
        ]);
        let MeshverCommand::Fetch { target } = cli.command else {
            panic!("expected fetch");
        };
        assert_eq!(
            target.to_request(),
            Request {
                name: None,
                version: Some("1.8".to_string()),
                flavor: Some("hardened".to_string()),
                flavor_version: Some(2),
            }
        );
    }

    #[test]
    fn test_negative_flavor_version_means_unset() {
        let cli = CLI::parse_from(["meshver", "switch", "--flavor-version", "-1"]);
        let MeshverCommand::Switch { target } = cli.command else {
            panic!("expected switch");
        };
        assert_eq!(target.to_request(), Request::default());
    }

    #[test]
    fn test_istioctl_passes_through_flags() {
        let cli = CLI::parse_from(["meshver", "istioctl", "version", "--remote=false"]);
        assert_eq!(
            cli.command,
            MeshverCommand::Istioctl { args: vec!["version".to_string(), "--remote=false".to_string()] }
        );
    }
}
