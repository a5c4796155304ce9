//! robotscheck CLI: annotate crawl ledgers with robots.txt permission.
//!
//! Reads the success ledger of a crawl run, looks up each row's saved
//! robots.txt, and writes a copy of the ledger with a permission column.

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
