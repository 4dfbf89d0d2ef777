//! CLI argument structures (clap derive)

pub mod batch;
pub mod crawl;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "wpschema-cli", version, about = "Batch-apply structured-data schema snippets across WordPress sites")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply (merge) schema fragments from a workbook across sites
    Apply(BatchArgs),
    /// Remove schemas listed in a workbook across sites
    Delete(BatchArgs),
    /// Fetch OpenGraph metadata for a workbook's URL column
    Crawl(CrawlArgs),
}

#[derive(Args)]
pub struct BatchArgs {
    /// Input workbook with 'accounts' and 'data' sheets
    pub file: PathBuf,

    /// Directory for the result workbook
    #[arg(long, default_value = "uploads")]
    pub out_dir: PathBuf,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,
}

#[derive(Args)]
pub struct CrawlArgs {
    /// Input workbook with a 'URL' column on its first sheet
    pub file: PathBuf,

    /// Directory for the result workbook
    #[arg(long, default_value = "uploads")]
    pub out_dir: PathBuf,
}

pub use batch::handle_batch_command;
pub use crawl::handle_crawl_command;
