//! WordPress REST API surface
//!
//! `WpClient` is the real reqwest-backed client; resolver and schema logic
//! only see the `SiteApi` trait so they can be exercised against an
//! in-memory fake.

pub mod client;
pub mod resolver;
pub mod schema;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::batch::accounts::Account;
use crate::batch::types::ContentType;

pub use client::{WpClient, WpClientProvider};
pub use resolver::resolve;
pub use schema::{apply_schema, merge_schema};

/// Outcome of a remote write: accepted, or rejected with the error body
/// the remote returned. Transport faults are `Err` at the call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteStatus {
    Accepted,
    Rejected(String),
}

/// Read/write operations the batch engine needs from one site.
///
/// Non-2xx responses on reads surface as absence (`None` / empty string),
/// never as errors; only transport faults return `Err`. No call retries.
#[async_trait]
pub trait SiteApi: Send + Sync {
    /// The site's static front page id from the settings endpoint,
    /// if one is configured (positive).
    async fn front_page_id(&self) -> Result<Option<u64>>;

    /// First id matching `slug` on the content type's listing endpoint.
    async fn find_by_slug(&self, content_type: ContentType, slug: &str) -> Result<Option<u64>>;

    /// The resource's currently stored schema string, empty if unreadable.
    async fn current_schema(&self, content_type: ContentType, id: u64) -> Result<String>;

    /// A category's human-readable description, empty if unreadable.
    async fn category_description(&self, id: u64) -> Result<String>;

    /// Write the schema meta field.
    async fn write_schema(
        &self,
        content_type: ContentType,
        id: u64,
        schema: &str,
    ) -> Result<WriteStatus>;

    /// Write a category's description field (the fix-up write).
    async fn write_description(&self, id: u64, description: &str) -> Result<WriteStatus>;
}

/// Seam for obtaining a `SiteApi` per account; the orchestrator goes
/// through this so tests can substitute fakes.
pub trait SiteApiProvider: Send + Sync {
    fn api_for(&self, account: &Account) -> Result<Arc<dyn SiteApi>>;
}
