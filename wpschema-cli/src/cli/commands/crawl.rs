//! Crawl command handler

use std::fs;

use anyhow::{Context, Result};
use colored::*;

use super::CrawlArgs;
use crate::batch::progress::{ProgressEvent, ProgressSink, StdoutSink};
use crate::crawl::{read_url_list, run_crawl, write_crawl_results};

pub async fn handle_crawl_command(args: CrawlArgs) -> Result<()> {
    if !args.file.exists() {
        anyhow::bail!("Input file does not exist: {}", args.file.display());
    }
    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("Failed to create output dir: {}", args.out_dir.display()))?;

    let urls = read_url_list(&args.file)?;
    println!("Crawling {} URL(s)...", urls.len().to_string().cyan());

    let sink = StdoutSink;
    let results = run_crawl(&urls, &sink).await?;
    let out_path = write_crawl_results(&results, &args.out_dir)?;
    sink.emit(ProgressEvent::Done {
        artifact: out_path.file_name().map(|n| n.to_string_lossy().into_owned()),
    });

    Ok(())
}
