//! Apply/delete batch command handler
//!
//! The run executes on a background task with its progress channel
//! registered on a `ProgressBus`; this handler is the subscriber that
//! prints the stream until the sentinel arrives.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use colored::*;

use super::BatchArgs;
use crate::api::WpClientProvider;
use crate::batch::accounts::AccountRegistry;
use crate::batch::progress::{ProgressBus, ProgressEvent};
use crate::batch::runner::spawn_run;
use crate::batch::types::Mode;
use crate::excel::read_workbook;

pub async fn handle_batch_command(args: BatchArgs, mode: Mode) -> Result<()> {
    if !args.file.exists() {
        anyhow::bail!("Input file does not exist: {}", args.file.display());
    }
    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("Failed to create output dir: {}", args.out_dir.display()))?;

    // Structural workbook problems abort here, before any row runs
    let input = read_workbook(&args.file, mode)?;
    let registry = AccountRegistry::build(input.accounts);
    let row_count = input.rows.len();

    println!(
        "Processing {} row(s) across {} account(s)...",
        row_count.to_string().cyan(),
        registry.len().to_string().cyan()
    );

    let bus = ProgressBus::new();
    let run_id = format!("run-{}", Local::now().format("%Y%m%d%H%M%S"));
    let (sink, mut events) = bus.open(&run_id)?;

    let provider = Arc::new(WpClientProvider::new(Duration::from_secs(args.timeout)));
    let handle = spawn_run(
        provider,
        registry,
        input.rows,
        mode,
        args.out_dir.clone(),
        Arc::new(sink),
    );

    while let Some(event) = events.recv().await {
        match event {
            ProgressEvent::Line(line) => println!("{}", line),
            ProgressEvent::Done { .. } => break,
        }
    }

    let (outcomes, out_path) = handle.await.context("Batch run task panicked")??;
    bus.release(&run_id);

    let succeeded = outcomes.iter().filter(|o| o.status.is_success()).count();
    let failed = outcomes.len() - succeeded;
    println!();
    println!(
        "{} succeeded, {} failed. Result written to {}",
        succeeded.to_string().green(),
        if failed > 0 {
            failed.to_string().red().to_string()
        } else {
            failed.to_string()
        },
        out_path.display().to_string().cyan()
    );

    Ok(())
}
