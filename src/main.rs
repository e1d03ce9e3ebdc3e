mod app;
mod cli;
mod db;
mod http;
mod logging;
mod paths;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    if let Err(err) = logging::init() {
        eprintln!("Warning: logging disabled: {err:#}");
    }
    app::run(cli)
}
