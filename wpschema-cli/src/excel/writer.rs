//! Result Exporter: serialize per-row outcomes to a result workbook

use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::Workbook;

use crate::batch::types::RowOutcome;

/// Result sheet columns, in order
const HEADER: &[&str] = &["stt", "url", "site", "type", "result"];

/// Write one row per outcome, preserving ordinal order. Deterministic for
/// identical outcomes.
pub fn write_results(outcomes: &[RowOutcome], path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("results")?;

    for (col, name) in HEADER.iter().enumerate() {
        worksheet.write_string(0, col as u16, *name)?;
    }

    for (row_idx, outcome) in outcomes.iter().enumerate() {
        let row = (row_idx + 1) as u32;
        worksheet.write_number(row, 0, outcome.ordinal as f64)?;
        worksheet.write_string(row, 1, &outcome.url)?;
        worksheet.write_string(row, 2, &outcome.site)?;
        worksheet.write_string(row, 3, &outcome.content_type)?;
        worksheet.write_string(row, 4, outcome.status.result_text())?;
    }

    workbook
        .save(path)
        .with_context(|| format!("Failed to save result file: {}", path.display()))?;
    Ok(())
}
