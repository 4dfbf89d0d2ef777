//! Read the input workbook: accounts sheet + data sheet
//!
//! Structural problems (missing sheet, missing column) are fatal and
//! abort the run before any row is processed.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use calamine::{Data, Reader, Xlsx, open_workbook};

use crate::batch::accounts::{Account, normalize_site_key};
use crate::batch::types::{BatchRow, Mode};

/// Expected column headers
mod cols {
    pub const SITE: &str = "site";
    pub const API_URL: &str = "WP_API_URL";
    pub const USER: &str = "WP_USER";
    pub const APP_PASS: &str = "WP_APP_PASS";
    pub const URL: &str = "url";
    pub const TYPE: &str = "type";
    pub const SCHEMA: &str = "script_schema";
}

/// Everything a run needs from the uploaded workbook
#[derive(Debug)]
pub struct WorkbookInput {
    pub accounts: Vec<Account>,
    pub rows: Vec<BatchRow>,
}

/// Read and validate both sheets. `mode` decides whether the
/// `script_schema` column is required.
pub fn read_workbook(path: &Path, mode: Mode) -> Result<WorkbookInput> {
    let mut workbook: Xlsx<_> = open_workbook(path)
        .with_context(|| format!("Failed to open Excel file: {}", path.display()))?;

    let sheet_names = workbook.sheet_names().to_vec();

    let accounts_sheet = find_sheet(&sheet_names, &["accounts", "account"])
        .context("Workbook has no 'accounts' (or 'account') sheet")?;
    let data_sheet =
        find_sheet(&sheet_names, &["data"]).context("Workbook has no 'data' sheet")?;

    let accounts_range = workbook
        .worksheet_range(&accounts_sheet)
        .with_context(|| format!("Failed to read sheet: {}", accounts_sheet))?;
    let data_range = workbook
        .worksheet_range(&data_sheet)
        .with_context(|| format!("Failed to read sheet: {}", data_sheet))?;

    let accounts = read_accounts(&accounts_range)?;
    let rows = read_data_rows(&data_range, mode)?;

    Ok(WorkbookInput { accounts, rows })
}

/// Case-insensitive sheet lookup, preserving the workbook's spelling
fn find_sheet(names: &[String], candidates: &[&str]) -> Option<String> {
    names
        .iter()
        .find(|name| candidates.iter().any(|c| name.eq_ignore_ascii_case(c)))
        .cloned()
}

fn read_accounts(range: &calamine::Range<Data>) -> Result<Vec<Account>> {
    let header = header_map(range);
    let idx = require_columns(
        &header,
        &[cols::SITE, cols::API_URL, cols::USER, cols::APP_PASS],
        "accounts",
    )?;

    let mut accounts = Vec::new();
    for row in range.rows().skip(1) {
        if is_empty_row(row) {
            continue;
        }
        accounts.push(Account {
            site: get_cell_string(row, idx[cols::SITE]),
            api_url: get_cell_string(row, idx[cols::API_URL]),
            user: get_cell_string(row, idx[cols::USER]),
            app_pass: get_cell_string(row, idx[cols::APP_PASS]),
        });
    }
    Ok(accounts)
}

fn read_data_rows(range: &calamine::Range<Data>, mode: Mode) -> Result<Vec<BatchRow>> {
    let header = header_map(range);
    let mut required = vec![cols::URL, cols::TYPE, cols::SITE];
    if mode == Mode::Apply {
        required.push(cols::SCHEMA);
    }
    let idx = require_columns(&header, &required, "data")?;

    let mut rows = Vec::new();
    for row in range.rows().skip(1) {
        if is_empty_row(row) {
            continue;
        }
        let fragment = idx
            .get(cols::SCHEMA)
            .map(|&c| get_cell_string(row, c))
            .unwrap_or_default();
        rows.push(BatchRow {
            ordinal: rows.len() + 1,
            url: get_cell_string(row, idx[cols::URL]),
            content_type: get_cell_string(row, idx[cols::TYPE]).trim().to_lowercase(),
            site: normalize_site_key(&get_cell_string(row, idx[cols::SITE])),
            fragment,
        });
    }
    Ok(rows)
}

/// Header cell text (trimmed) → column index, from the first row
fn header_map(range: &calamine::Range<Data>) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    if let Some(header_row) = range.rows().next() {
        for (col, cell) in header_row.iter().enumerate() {
            let name = cell.to_string().trim().to_string();
            if !name.is_empty() {
                map.entry(name).or_insert(col);
            }
        }
    }
    map
}

fn require_columns<'a>(
    header: &HashMap<String, usize>,
    required: &[&'a str],
    sheet: &str,
) -> Result<HashMap<&'a str, usize>> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|name| !header.contains_key(*name))
        .collect();
    if !missing.is_empty() {
        bail!(
            "Sheet '{}' is missing required column(s): {}",
            sheet,
            missing.join(", ")
        );
    }
    Ok(required
        .iter()
        .map(|&name| (name, header[name]))
        .collect())
}

fn is_empty_row(row: &[Data]) -> bool {
    row.iter().all(|c| c.to_string().trim().is_empty())
}

fn get_cell_string(row: &[Data], col: usize) -> String {
    row.get(col)
        .map(|c| match c {
            Data::String(s) => s.clone(),
            Data::Int(i) => i.to_string(),
            Data::Float(f) => {
                if f.fract() == 0.0 {
                    (*f as i64).to_string()
                } else {
                    f.to_string()
                }
            }
            Data::Bool(b) => b.to_string(),
            _ => String::new(),
        })
        .unwrap_or_default()
        .trim()
        .to_string()
}
