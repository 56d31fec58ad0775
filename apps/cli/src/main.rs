//! Pagesmith CLI — generates and publishes SEO integration pages.
//!
//! Walks the connector dataset one connector at a time: search research,
//! one language-model completion, then a create-or-update in the CMS.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    // Secrets usually live in a local .env; a missing file is fine.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
