//! Batch Orchestrator: drives resolve → merge → update for every row
//!
//! Rows run strictly sequentially; row N's full cycle, including its
//! progress line, completes before row N+1 starts. Remote state is
//! read-then-written per row, so rows touching the same resource must not
//! overlap, and the progress stream's ordering guarantee depends on it.
//! Per-row failures become `RowStatus` values; nothing a single row does
//! can abort the run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use chrono::Local;
use log::debug;
use tokio::task::JoinHandle;

use super::accounts::AccountRegistry;
use super::progress::{ProgressEvent, ProgressSink};
use super::types::{BatchRow, ContentType, Mode, RowOutcome, RowStatus};
use crate::api::{SiteApiProvider, WriteStatus, apply_schema, resolve};
use crate::excel::writer::write_results;

/// Run every row in order, returning exactly one outcome per row.
pub async fn run_batch(
    provider: &dyn SiteApiProvider,
    registry: &AccountRegistry,
    rows: &[BatchRow],
    mode: Mode,
    sink: &dyn ProgressSink,
) -> Vec<RowOutcome> {
    let mut outcomes = Vec::with_capacity(rows.len());

    for row in rows {
        let (status, remote_id) = match process_row(provider, registry, row, mode).await {
            Ok(processed) => processed,
            Err(e) => (RowStatus::ProcessingError(format!("{:#}", e)), None),
        };

        sink.emit(ProgressEvent::Line(format_progress(row, &status, remote_id, mode)));
        outcomes.push(RowOutcome {
            ordinal: row.ordinal,
            url: row.url.clone(),
            site: row.site.clone(),
            content_type: row.content_type.clone(),
            status,
        });
    }

    outcomes
}

/// Handle one row: account lookup, resolution, schema apply.
/// `Err` here means an unexpected fault; the caller maps it to
/// `ProcessingError` for this row only.
async fn process_row(
    provider: &dyn SiteApiProvider,
    registry: &AccountRegistry,
    row: &BatchRow,
    mode: Mode,
) -> Result<(RowStatus, Option<u64>)> {
    let Some(account) = registry.get(&row.site) else {
        return Ok((RowStatus::AccountNotFound, None));
    };

    let Some(content_type) = ContentType::parse(&row.content_type) else {
        return Ok((
            RowStatus::ProcessingError(format!("unsupported content type '{}'", row.content_type)),
            None,
        ));
    };

    let api = provider.api_for(account)?;

    let Some(id) = resolve(api.as_ref(), &row.url, content_type).await? else {
        return Ok((RowStatus::ResourceNotFound, None));
    };
    debug!("row {}: {} resolved to {} {}", row.ordinal, row.url, content_type, id);

    let fragment = match mode {
        Mode::Delete => "",
        Mode::Apply => row.fragment.as_str(),
    };

    let status = match apply_schema(api.as_ref(), id, content_type, fragment).await? {
        WriteStatus::Accepted => RowStatus::Success,
        WriteStatus::Rejected(detail) => RowStatus::UpdateFailed(detail),
    };
    Ok((status, Some(id)))
}

fn format_progress(row: &BatchRow, status: &RowStatus, remote_id: Option<u64>, mode: Mode) -> String {
    let verb = match mode {
        Mode::Apply => "applied schema to",
        Mode::Delete => "removed schema from",
    };
    match status {
        RowStatus::Success => format!(
            "✔ [{}] {} {} {} (site: {})",
            row.ordinal,
            verb,
            row.content_type,
            remote_id.unwrap_or_default(),
            row.site
        ),
        RowStatus::AccountNotFound => {
            format!("✘ [{}] no account for site: {}", row.ordinal, row.site)
        }
        RowStatus::ResourceNotFound => format!(
            "✘ [{}] no resource for {} (type: {}, site: {})",
            row.ordinal, row.url, row.content_type, row.site
        ),
        RowStatus::UpdateFailed(detail) => format!(
            "✘ [{}] update failed for {} {} (site: {}): {}",
            row.ordinal,
            row.content_type,
            remote_id.unwrap_or_default(),
            row.site,
            detail
        ),
        RowStatus::ProcessingError(detail) => {
            format!("✘ [{}] error: {}", row.ordinal, detail)
        }
    }
}

/// Run the batch, export the result workbook, and emit the sentinel.
pub async fn execute_run(
    provider: &dyn SiteApiProvider,
    registry: &AccountRegistry,
    rows: &[BatchRow],
    mode: Mode,
    out_dir: &Path,
    sink: &dyn ProgressSink,
) -> Result<(Vec<RowOutcome>, PathBuf)> {
    let outcomes = run_batch(provider, registry, rows, mode, sink).await;

    let file_name = format!("result_{}.xlsx", Local::now().format("%Y%m%d%H%M%S"));
    let out_path = out_dir.join(&file_name);
    write_results(&outcomes, &out_path)?;

    sink.emit(ProgressEvent::Done { artifact: Some(file_name) });
    Ok((outcomes, out_path))
}

/// Run detached on a background task; the caller keeps the handle, so
/// completion and cancellation stay observable.
pub fn spawn_run(
    provider: Arc<dyn SiteApiProvider>,
    registry: AccountRegistry,
    rows: Vec<BatchRow>,
    mode: Mode,
    out_dir: PathBuf,
    sink: Arc<dyn ProgressSink>,
) -> JoinHandle<Result<(Vec<RowOutcome>, PathBuf)>> {
    tokio::spawn(async move {
        execute_run(provider.as_ref(), &registry, &rows, mode, &out_dir, sink.as_ref()).await
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::api::SiteApi;
    use crate::batch::accounts::Account;

    /// Shared in-memory site: slugs resolve, schemas persist across rows
    #[derive(Default)]
    struct FakeSite {
        slugs: Mutex<HashMap<String, u64>>,
        schemas: Mutex<HashMap<u64, String>>,
        fail_writes: bool,
    }

    #[async_trait]
    impl SiteApi for FakeSite {
        async fn front_page_id(&self) -> Result<Option<u64>> {
            Ok(None)
        }

        async fn find_by_slug(&self, _: ContentType, slug: &str) -> Result<Option<u64>> {
            Ok(self.slugs.lock().unwrap().get(slug).copied())
        }

        async fn current_schema(&self, _: ContentType, id: u64) -> Result<String> {
            Ok(self.schemas.lock().unwrap().get(&id).cloned().unwrap_or_default())
        }

        async fn category_description(&self, _: u64) -> Result<String> {
            Ok(String::new())
        }

        async fn write_schema(&self, _: ContentType, id: u64, schema: &str) -> Result<WriteStatus> {
            if self.fail_writes {
                return Ok(WriteStatus::Rejected("rest_forbidden".to_string()));
            }
            self.schemas.lock().unwrap().insert(id, schema.to_string());
            Ok(WriteStatus::Accepted)
        }

        async fn write_description(&self, _: u64, _: &str) -> Result<WriteStatus> {
            Ok(WriteStatus::Accepted)
        }
    }

    struct FakeProvider {
        site: Arc<FakeSite>,
    }

    impl SiteApiProvider for FakeProvider {
        fn api_for(&self, _: &Account) -> Result<Arc<dyn SiteApi>> {
            Ok(self.site.clone())
        }
    }

    /// Collects emitted events for assertions
    #[derive(Default)]
    struct CollectingSink {
        events: Mutex<Vec<ProgressEvent>>,
    }

    impl ProgressSink for CollectingSink {
        fn emit(&self, event: ProgressEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn registry_with(site: &str) -> AccountRegistry {
        AccountRegistry::build(vec![Account {
            site: site.to_string(),
            api_url: "https://x.com".to_string(),
            user: "u".to_string(),
            app_pass: "p".to_string(),
        }])
    }

    fn row(ordinal: usize, url: &str, content_type: &str, site: &str, fragment: &str) -> BatchRow {
        BatchRow {
            ordinal,
            url: url.to_string(),
            content_type: content_type.to_string(),
            site: site.to_string(),
            fragment: fragment.to_string(),
        }
    }

    fn provider_with_slug(slug: &str, id: u64) -> (Arc<FakeSite>, FakeProvider) {
        let site = Arc::new(FakeSite::default());
        site.slugs.lock().unwrap().insert(slug.to_string(), id);
        let provider = FakeProvider { site: site.clone() };
        (site, provider)
    }

    #[tokio::test]
    async fn test_fresh_apply_writes_fragment_verbatim() {
        let (site, provider) = provider_with_slug("foo", 42);
        let registry = registry_with("a");
        let rows = vec![row(1, "https://x.com/foo", "post", "A", "<script>S</script>")];
        let sink = CollectingSink::default();

        let outcomes = run_batch(&provider, &registry, &rows, Mode::Apply, &sink).await;

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].status, RowStatus::Success);
        assert_eq!(
            site.schemas.lock().unwrap().get(&42).unwrap(),
            "<script>S</script>"
        );
    }

    #[tokio::test]
    async fn test_repeat_apply_does_not_duplicate() {
        let (site, provider) = provider_with_slug("foo", 42);
        let registry = registry_with("a");
        let rows = vec![row(1, "https://x.com/foo", "post", "a", "<script>S</script>")];
        let sink = CollectingSink::default();

        run_batch(&provider, &registry, &rows, Mode::Apply, &sink).await;
        run_batch(&provider, &registry, &rows, Mode::Apply, &sink).await;

        assert_eq!(
            site.schemas.lock().unwrap().get(&42).unwrap(),
            "<script>S</script>"
        );
    }

    #[tokio::test]
    async fn test_one_outcome_per_row_in_input_order() {
        let (_, provider) = provider_with_slug("foo", 42);
        let registry = registry_with("a");
        let rows = vec![
            row(1, "https://x.com/foo", "post", "a", "<s>1</s>"),
            row(2, "https://x.com/foo", "post", "nosuch", "<s>2</s>"),
            row(3, "https://x.com/missing", "post", "a", "<s>3</s>"),
            row(4, "https://x.com/foo", "post", "a", "<s>4</s>"),
        ];
        let sink = CollectingSink::default();

        let outcomes = run_batch(&provider, &registry, &rows, Mode::Apply, &sink).await;

        assert_eq!(outcomes.len(), rows.len());
        for (i, outcome) in outcomes.iter().enumerate() {
            assert_eq!(outcome.ordinal, i + 1);
        }
        assert_eq!(outcomes[0].status, RowStatus::Success);
        assert_eq!(outcomes[1].status, RowStatus::AccountNotFound);
        assert_eq!(outcomes[2].status, RowStatus::ResourceNotFound);
        // a failed row never stops the ones after it
        assert_eq!(outcomes[3].status, RowStatus::Success);

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), rows.len());
        for (i, event) in events.iter().enumerate() {
            match event {
                ProgressEvent::Line(line) => {
                    assert!(line.contains(&format!("[{}]", i + 1)), "line: {}", line)
                }
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_delete_mode_forces_empty_write() {
        let (site, provider) = provider_with_slug("foo", 42);
        site.schemas.lock().unwrap().insert(42, "<script>S</script>".to_string());
        let registry = registry_with("a");
        // fragment column content must be ignored in delete mode
        let rows = vec![row(1, "https://x.com/foo", "page", "a", "<script>IGNORED</script>")];
        let sink = CollectingSink::default();

        let outcomes = run_batch(&provider, &registry, &rows, Mode::Delete, &sink).await;

        assert_eq!(outcomes[0].status, RowStatus::Success);
        assert_eq!(site.schemas.lock().unwrap().get(&42).unwrap(), "");
    }

    #[tokio::test]
    async fn test_rejected_write_becomes_update_failed() {
        let site = Arc::new(FakeSite {
            fail_writes: true,
            ..Default::default()
        });
        site.slugs.lock().unwrap().insert("foo".to_string(), 42);
        let provider = FakeProvider { site };
        let registry = registry_with("a");
        let rows = vec![row(1, "https://x.com/foo", "post", "a", "<s>1</s>")];
        let sink = CollectingSink::default();

        let outcomes = run_batch(&provider, &registry, &rows, Mode::Apply, &sink).await;

        assert_eq!(
            outcomes[0].status,
            RowStatus::UpdateFailed("rest_forbidden".to_string())
        );
    }

    #[tokio::test]
    async fn test_unknown_content_type_fails_only_that_row() {
        let (_, provider) = provider_with_slug("foo", 42);
        let registry = registry_with("a");
        let rows = vec![
            row(1, "https://x.com/foo", "tag", "a", "<s>1</s>"),
            row(2, "https://x.com/foo", "post", "a", "<s>2</s>"),
        ];
        let sink = CollectingSink::default();

        let outcomes = run_batch(&provider, &registry, &rows, Mode::Apply, &sink).await;

        assert!(matches!(outcomes[0].status, RowStatus::ProcessingError(_)));
        assert_eq!(outcomes[1].status, RowStatus::Success);
    }

    #[tokio::test]
    async fn test_execute_run_emits_sentinel_with_artifact() {
        let (_, provider) = provider_with_slug("foo", 42);
        let registry = registry_with("a");
        let rows = vec![row(1, "https://x.com/foo", "post", "a", "<s>1</s>")];
        let sink = CollectingSink::default();
        let dir = tempfile::tempdir().unwrap();

        let (outcomes, out_path) =
            execute_run(&provider, &registry, &rows, Mode::Apply, dir.path(), &sink)
                .await
                .unwrap();

        assert_eq!(outcomes.len(), 1);
        assert!(out_path.exists());
        let events = sink.events.lock().unwrap();
        match events.last().unwrap() {
            ProgressEvent::Done { artifact: Some(name) } => {
                assert_eq!(out_path.file_name().unwrap().to_str().unwrap(), name)
            }
            other => panic!("expected sentinel, got {:?}", other),
        }
    }
}
