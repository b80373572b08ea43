//! Siteforge CLI — optimizing build pipeline for static web applications.
//!
//! Turns a project tree into a minified, downleveled, optionally bundled
//! build directory with push and offline-cache manifests.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
