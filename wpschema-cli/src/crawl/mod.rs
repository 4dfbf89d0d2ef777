//! Page-metadata crawler: fetch a list of URLs and extract OpenGraph data
//!
//! Independent of the batch engine; shares only the progress sink. Every
//! URL yields a row, a failed fetch just produces empty fields.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use calamine::{Reader, Xlsx, open_workbook};
use chrono::Local;
use log::debug;
use rust_xlsxwriter::Workbook;
use scraper::{Html, Selector};

use crate::batch::progress::{ProgressEvent, ProgressSink};

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Metadata extracted from one page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMeta {
    pub url: String,
    pub title: String,
    pub description: String,
    pub date: String,
    pub image: String,
}

fn og_content(doc: &Html, property: &str) -> Option<String> {
    let selector = Selector::parse(&format!(r#"meta[property="{}"]"#, property)).unwrap();
    doc.select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(str::to_string)
}

/// Pull OpenGraph title/description/image and a published date out of a
/// fetched document.
pub fn extract_meta(url: &str, html: &str) -> PageMeta {
    let doc = Html::parse_document(html);

    // Published date: prefer the visible entry-date element, fall back to
    // the og:updated_time meta tag
    let entry_date_sel = Selector::parse("time.entry-date.published.updated").unwrap();
    let date = doc
        .select(&entry_date_sel)
        .next()
        .map(|el| {
            el.value()
                .attr("datetime")
                .map(str::to_string)
                .unwrap_or_else(|| el.text().collect::<String>().trim().to_string())
        })
        .or_else(|| og_content(&doc, "og:updated_time"))
        .unwrap_or_default();

    PageMeta {
        url: url.to_string(),
        title: og_content(&doc, "og:title").unwrap_or_default(),
        description: og_content(&doc, "og:description").unwrap_or_default(),
        date,
        image: og_content(&doc, "og:image")
            .or_else(|| og_content(&doc, "og:image:secure_url"))
            .unwrap_or_default(),
    }
}

async fn fetch_meta(http: &reqwest::Client, url: &str) -> Result<PageMeta> {
    let body = http.get(url).send().await?.text().await?;
    Ok(extract_meta(url, &body))
}

/// Crawl every URL in order; a failed fetch yields an empty-fields row.
pub async fn run_crawl(urls: &[String], sink: &dyn ProgressSink) -> Result<Vec<PageMeta>> {
    let http = reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .timeout(FETCH_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;

    let mut results = Vec::with_capacity(urls.len());
    for (idx, url) in urls.iter().enumerate() {
        let meta = match fetch_meta(&http, url).await {
            Ok(meta) => {
                sink.emit(ProgressEvent::Line(format!("✔ [{}] crawled {}", idx + 1, url)));
                meta
            }
            Err(e) => {
                debug!("crawl failed for {}: {:#}", url, e);
                sink.emit(ProgressEvent::Line(format!("✘ [{}] failed {}", idx + 1, url)));
                PageMeta {
                    url: url.clone(),
                    ..Default::default()
                }
            }
        };
        results.push(meta);
    }
    Ok(results)
}

/// Read the URL column from the input workbook's first sheet
pub fn read_url_list(path: &Path) -> Result<Vec<String>> {
    let mut workbook: Xlsx<_> = open_workbook(path)
        .with_context(|| format!("Failed to open Excel file: {}", path.display()))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .context("Excel file has no sheets")?
        .clone();
    let range = workbook
        .worksheet_range(&sheet_name)
        .with_context(|| format!("Failed to read sheet: {}", sheet_name))?;

    let mut rows = range.rows();
    let url_col = rows
        .next()
        .and_then(|header| {
            header
                .iter()
                .position(|c| c.to_string().trim().eq_ignore_ascii_case("URL"))
        });
    let Some(url_col) = url_col else {
        bail!("Input file must have a 'URL' column");
    };

    Ok(rows
        .filter_map(|row| {
            let url = row
                .get(url_col)
                .map(|c| c.to_string().trim().to_string())
                .unwrap_or_default();
            (!url.is_empty()).then_some(url)
        })
        .collect())
}

/// Export crawl results and return the artifact path
pub fn write_crawl_results(results: &[PageMeta], out_dir: &Path) -> Result<PathBuf> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    let header = ["URL", "Title", "Description", "Date", "Image"];
    for (col, name) in header.iter().enumerate() {
        worksheet.write_string(0, col as u16, *name)?;
    }
    for (row_idx, meta) in results.iter().enumerate() {
        let row = (row_idx + 1) as u32;
        worksheet.write_string(row, 0, &meta.url)?;
        worksheet.write_string(row, 1, &meta.title)?;
        worksheet.write_string(row, 2, &meta.description)?;
        worksheet.write_string(row, 3, &meta.date)?;
        worksheet.write_string(row, 4, &meta.image)?;
    }

    let path = out_dir.join(format!(
        "crawl_result_{}.xlsx",
        Local::now().format("%Y%m%d%H%M%S")
    ));
    workbook
        .save(&path)
        .with_context(|| format!("Failed to save result file: {}", path.display()))?;
    Ok(path)
}
