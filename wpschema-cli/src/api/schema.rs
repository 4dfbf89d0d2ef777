//! Schema Merger: compute and write the new schema payload for a resource
//!
//! Posts and pages get read-merge-write with a substring check so repeated
//! runs never duplicate a fragment. Categories additionally need a
//! corrective description write, because the schema PATCH clobbers the
//! description field on the remote side.

use anyhow::Result;
use log::warn;

use super::{SiteApi, WriteStatus};
use crate::batch::types::ContentType;

/// Merge a fragment into the currently stored schema.
///
/// Empty fragment means delete. A fragment already present as a substring
/// leaves the stored value unchanged; otherwise it is appended after a
/// newline.
pub fn merge_schema(current: &str, fragment: &str) -> String {
    if fragment.is_empty() {
        return String::new();
    }
    if !current.is_empty() && current.contains(fragment) {
        return current.to_string();
    }
    if current.is_empty() {
        return fragment.to_string();
    }
    format!("{}\n{}", current.trim_end(), fragment)
}

/// Apply (or delete) a schema fragment on an already resolved resource.
///
/// `Ok(Rejected)` carries the remote error body; transport faults are
/// `Err`. A failed write leaves the resource as the remote left it, there
/// is no rollback.
pub async fn apply_schema(
    api: &dyn SiteApi,
    id: u64,
    content_type: ContentType,
    fragment: &str,
) -> Result<WriteStatus> {
    let fragment = fragment.trim();

    match content_type {
        ContentType::Post | ContentType::Page => {
            let new_schema = if fragment.is_empty() {
                String::new()
            } else {
                let current = api.current_schema(content_type, id).await?;
                merge_schema(&current, fragment)
            };
            api.write_schema(content_type, id, &new_schema).await
        }
        ContentType::Category => {
            // Read the description before touching the schema; the schema
            // PATCH blanks it on the remote, so it must be restored after.
            let description = api.category_description(id).await?;
            let status = api.write_schema(ContentType::Category, id, fragment).await?;

            // Unconditional fix-up, including for deletes and after a
            // rejected schema write. Its own failure is not fatal.
            match api.write_description(id, &description).await {
                Ok(WriteStatus::Accepted) => {}
                Ok(WriteStatus::Rejected(detail)) => {
                    warn!("description fix-up rejected for category {}: {}", id, detail);
                }
                Err(e) => {
                    warn!("description fix-up failed for category {}: {:#}", id, e);
                }
            }

            Ok(status)
        }
    }
}
