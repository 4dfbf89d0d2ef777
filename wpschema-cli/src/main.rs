//! wpschema-cli: batch-apply structured-data schema snippets across
//! WordPress sites from a two-sheet Excel workbook.

mod api;
mod batch;
mod cli;
mod crawl;
mod excel;

use anyhow::Result;
use clap::Parser;

use cli::commands::{Commands, handle_batch_command, handle_crawl_command};
use batch::types::Mode;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let cli = cli::Cli::parse();
    match cli.command {
        Commands::Apply(args) => handle_batch_command(args, Mode::Apply).await,
        Commands::Delete(args) => handle_batch_command(args, Mode::Delete).await,
        Commands::Crawl(args) => handle_crawl_command(args).await,
    }
}
