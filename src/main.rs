mod cli;
mod execute;

use clap::Parser;
use crate::cli::CLI;
use anyhow::Result;
use tracing::Level;

fn main() -> Result<()>{
    let cli = CLI::parse();
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
    execute::execute(cli)
}
