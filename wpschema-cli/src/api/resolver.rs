//! Resource Resolver: target URL + content type → remote numeric id
//!
//! Homepage URLs for posts/pages go through the front-page settings
//! lookup; everything else is a slug lookup against the content type's
//! listing endpoint. Absence is a first-class result, not a fault, and
//! lookups are never retried.

use anyhow::{Context, Result};
use url::Url;

use super::SiteApi;
use crate::batch::types::ContentType;

/// A homepage URL has an empty path (ignoring trailing slashes) and no
/// query or fragment.
pub fn is_homepage_url(url: &Url) -> bool {
    url.path().trim_matches('/').is_empty() && url.query().is_none() && url.fragment().is_none()
}

/// Last non-empty path segment, used as the lookup slug
pub fn slug_of(url: &Url) -> Option<&str> {
    url.path()
        .trim_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
}

/// Resolve a target URL to its remote id, `None` when nothing matches.
pub async fn resolve(
    api: &dyn SiteApi,
    target_url: &str,
    content_type: ContentType,
) -> Result<Option<u64>> {
    let url = Url::parse(target_url.trim())
        .with_context(|| format!("Invalid target URL: {}", target_url))?;

    if matches!(content_type, ContentType::Post | ContentType::Page) && is_homepage_url(&url) {
        // A configured front page short-circuits the slug lookup;
        // id 0 means "no static front page" and falls through.
        if let Some(id) = api.front_page_id().await? {
            return Ok(Some(id));
        }
    }

    let Some(slug) = slug_of(&url) else {
        return Ok(None);
    };
    api.find_by_slug(content_type, slug).await
}
