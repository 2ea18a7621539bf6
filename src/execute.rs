use std::process::Command;
use anyhow::{bail, Result};
use colored::Colorize;
use tracing::{debug, info, warn};
use meshver::advisor::{advise, SystemClock};
use meshver::config::{MeshverConfig, CONFIG_FILE};
use meshver::distribution::Distribution;
use meshver::global::utils::get_home_dir;
use meshver::installation::{FetchOutcome, Installation};
use meshver::manifest::Manifest;
use meshver::resolver::{resolve, Fallback};
use meshver::util::is_executable;
use crate::cli::{DistributionArgs, MeshverCommand, CLI};

/// Per-invocation state: the configuration and the installation handle.
struct Session {
    config: MeshverConfig,
    installation: Installation,
}

impl Session {
    fn open() -> Result<Self> {
        let home = get_home_dir()?;
        debug!("using home {}", home.display());
        let config = MeshverConfig::load_or_default(home.join(CONFIG_FILE))?.with_env_overrides();
        let installation = Installation::open(&home)?;
        if let Some(name) = installation.repair_active()? {
            warn!("active distribution {name} is no longer installed; cleared the active pointer");
        }
        Ok(Session { config, installation })
    }

    fn manifest(&self) -> Result<Manifest> {
        Ok(self.config.manifest_source().fetch()?)
    }
}

pub fn execute(cli: CLI) -> Result<()> {
    let session = Session::open()?;
    match cli.command {
        MeshverCommand::Fetch { target } => {
            execute_fetch(&session, &target)
        }
        MeshverCommand::Switch { target } => {
            execute_switch(&session, &target)
        }
        MeshverCommand::Prune { target } => {
            execute_prune(&session, &target)
        }
        MeshverCommand::Show => {
            execute_show(&session)
        }
        MeshverCommand::List => {
            execute_list(&session)
        }
        MeshverCommand::CheckUpgrade => {
            execute_check_upgrade(&session)
        }
        MeshverCommand::Istioctl { args } => {
            execute_istioctl(&session, args)
        }
    }
}

fn log_fallbacks(fallbacks: &[Fallback]) {
    for fallback in fallbacks {
        info!("{fallback}");
    }
}

fn given_name(target: &DistributionArgs) -> Option<&str> {
    target.name.as_deref().map(str::trim).filter(|n| !n.is_empty())
}

fn switch_exec(installation: &Installation, distribution: &Distribution) -> Result<()> {
    installation.switch_active(distribution)?;
    println!("istioctl switched to {distribution} now");
    Ok(())
}

fn execute_fetch(session: &Session, target: &DistributionArgs) -> Result<()> {
    let manifest = session.manifest()?;
    let resolution = resolve(&manifest, &target.to_request(), None)?;
    log_fallbacks(&resolution.fallbacks);
    let distribution = resolution.distribution;

    let transport = session.config.transport();
    match session.installation.fetch(&manifest, &distribution, &transport)? {
        FetchOutcome::Fetched => {
            info!("fetched {distribution}");
        }
        FetchOutcome::AlreadyInstalled => {
            info!("{distribution} is already fetched");
        }
    }

    if let Some(entry) = manifest.find(&distribution) {
        if !entry.release_notes.is_empty() {
            println!("For more information about {distribution}, please refer to the release notes: ");
            for note in &entry.release_notes {
                println!("- {note}");
            }
            println!();
        }
    }
    switch_exec(&session.installation, &distribution)
}

fn execute_switch(session: &Session, target: &DistributionArgs) -> Result<()> {
    let distribution = match given_name(target) {
        Some(name) => name.parse::<Distribution>()?,
        None => {
            let manifest = session.manifest()?;
            let active = session.installation.active()?;
            let resolution = resolve(&manifest, &target.to_request(), active.as_ref())?;
            log_fallbacks(&resolution.fallbacks);
            resolution.distribution
        }
    };
    switch_exec(&session.installation, &distribution)
}

fn execute_prune(session: &Session, target: &DistributionArgs) -> Result<()> {
    let request = target.to_request();
    let target = if let Some(name) = given_name(target) {
        Some(name.parse::<Distribution>()?)
    } else if request.is_empty() {
        None
    } else {
        let manifest = session.manifest()?;
        let resolution = resolve(&manifest, &request, None)?;
        log_fallbacks(&resolution.fallbacks);
        Some(resolution.distribution)
    };

    let removed = session.installation.prune(target.as_ref())?;
    if removed.is_empty() {
        println!("Nothing to prune");
    }
    for distribution in removed {
        println!("{distribution} removed");
    }
    Ok(())
}

fn execute_show(session: &Session) -> Result<()> {
    let installed = session.installation.list_installed()?;
    if installed.is_empty() {
        println!("No istioctl fetched yet. Run `meshver fetch` to fetch one.");
        return Ok(());
    }
    for item in installed {
        match item.active {
            true => println!("{} (Active)", item.distribution),
            false => println!("{}", item.distribution),
        }
    }
    Ok(())
}

fn execute_list(session: &Session) -> Result<()> {
    let manifest = session.manifest()?;
    let active = session.installation.active()?;

    println!(
        "{:^15}\t{:^11}\t{:^14}\t{:^20}",
        "ISTIO VERSION", "FLAVOR", "FLAVOR VERSION", "K8S VERSIONS"
    );
    for entry in manifest.entries() {
        let d = &entry.distribution;
        let mark = if active.as_ref() == Some(d) { "*" } else { " " };
        println!(
            "{:^15}\t{:^11}\t{:^14}\t{:^20}",
            format!("{mark}{}", d.version),
            d.flavor.to_string(),
            d.flavor_version,
            entry.k8s_versions.join(",")
        );
    }

    if let Some(active) = active {
        println!();
        for advisory in advise(&active, &manifest, &SystemClock) {
            println!("{}", format!("[WARNING] {advisory}").yellow());
        }
    }
    Ok(())
}

fn execute_check_upgrade(session: &Session) -> Result<()> {
    let Some(active) = session.installation.active()? else {
        bail!("No active istioctl. Run `meshver fetch` first.");
    };
    let manifest = session.manifest()?;
    let advisories = advise(&active, &manifest, &SystemClock);
    if advisories.is_empty() {
        println!("{active} is the latest patch of its minor version and flavor");
        return Ok(());
    }
    for advisory in advisories {
        println!("{}", format!("[WARNING] {advisory}").yellow());
    }
    Ok(())
}

fn execute_istioctl(session: &Session, args: Vec<String>) -> Result<()> {
    let Some(active) = session.installation.active()? else {
        bail!("No active istioctl. Run `meshver fetch` first.");
    };
    let exe_path = session.installation.binary_path(&active);
    if !is_executable(&exe_path) {
        bail!("{} is not executable. Run `meshver fetch --name {active}` to fetch it again.", exe_path.display());
    }
    debug!("running {}", exe_path.display());
    let status = Command::new(exe_path)
        .args(args).status()?;
    if !status.success() {
        std::process::exit(status.code().unwrap_or(1));
    }
    Ok(())
}
