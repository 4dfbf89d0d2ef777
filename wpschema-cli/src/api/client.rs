//! Reqwest-backed `SiteApi` implementation
//!
//! One client per account, cached for the run. TLS certificate validation
//! is relaxed because many target sites run behind self-signed staging
//! certs. Every call is single-attempt with the client's bounded timeout.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use serde_json::{Value, json};

use super::{SiteApi, SiteApiProvider, WriteStatus};
use crate::batch::accounts::Account;
use crate::batch::types::ContentType;

/// Meta field names on the remote side
mod meta_fields {
    pub const INPOST_CONTAINER: &str = "_inpost_head_script";
    pub const INPOST_SCRIPT: &str = "synth_header_script";
    pub const CATEGORY_SCHEMA: &str = "category_schema";
}

/// Authenticated client for one WordPress site
pub struct WpClient {
    http: reqwest::Client,
    base_url: String,
    user: String,
    app_pass: String,
}

impl WpClient {
    pub fn new(account: &Account, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: account.api_url.trim_end_matches('/').to_string(),
            user: account.user.clone(),
            app_pass: account.app_pass.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/wp-json/wp/v2/{}", self.base_url, path)
    }

    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<reqwest::Response> {
        debug!("GET {}", url);
        self.http
            .get(url)
            .query(query)
            .basic_auth(&self.user, Some(&self.app_pass))
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))
    }

    async fn patch(&self, url: &str, body: &Value) -> Result<reqwest::Response> {
        debug!("PATCH {}", url);
        self.http
            .patch(url)
            .json(body)
            .basic_auth(&self.user, Some(&self.app_pass))
            .send()
            .await
            .with_context(|| format!("PATCH {} failed", url))
    }

    /// Turn a non-success PATCH response into a `Rejected` detail string:
    /// the JSON error body when parseable, the raw text otherwise.
    async fn rejection_detail(resp: reqwest::Response) -> String {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        match serde_json::from_str::<Value>(&text) {
            Ok(body) => body.to_string(),
            Err(_) if !text.is_empty() => text,
            Err(_) => format!("HTTP {}", status),
        }
    }
}

/// `page_on_front` comes back as a number or a numeric string depending
/// on the site; accept both.
fn lenient_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl SiteApi for WpClient {
    async fn front_page_id(&self) -> Result<Option<u64>> {
        let resp = self.get(&self.endpoint("settings"), &[]).await?;
        if !resp.status().is_success() {
            return Ok(None);
        }
        let body: Value = resp.json().await.context("settings response was not JSON")?;
        let id = body.get("page_on_front").and_then(lenient_u64);
        Ok(id.filter(|id| *id > 0))
    }

    async fn find_by_slug(&self, content_type: ContentType, slug: &str) -> Result<Option<u64>> {
        let url = self.endpoint(content_type.rest_route());
        let resp = self.get(&url, &[("per_page", "1"), ("slug", slug)]).await?;
        if !resp.status().is_success() {
            return Ok(None);
        }
        let body: Value = resp.json().await.context("listing response was not JSON")?;
        let id = body
            .as_array()
            .and_then(|items| items.first())
            .and_then(|item| item.get("id"))
            .and_then(Value::as_u64);
        Ok(id)
    }

    async fn current_schema(&self, content_type: ContentType, id: u64) -> Result<String> {
        let url = self.endpoint(&format!("{}/{}", content_type.rest_route(), id));
        let resp = self.get(&url, &[]).await?;
        if !resp.status().is_success() {
            return Ok(String::new());
        }
        let body: Value = resp.json().await.context("resource response was not JSON")?;
        let meta = body.get("meta");

        let schema = match content_type {
            ContentType::Post | ContentType::Page => meta
                .and_then(|m| m.get(meta_fields::INPOST_CONTAINER))
                .and_then(|c| c.get(meta_fields::INPOST_SCRIPT))
                .and_then(Value::as_str),
            ContentType::Category => meta
                .and_then(|m| m.get(meta_fields::CATEGORY_SCHEMA))
                .and_then(Value::as_str),
        };
        Ok(schema.unwrap_or_default().to_string())
    }

    async fn category_description(&self, id: u64) -> Result<String> {
        let url = self.endpoint(&format!("categories/{}", id));
        let resp = self.get(&url, &[]).await?;
        if !resp.status().is_success() {
            return Ok(String::new());
        }
        let body: Value = resp.json().await.context("category response was not JSON")?;
        Ok(body
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    async fn write_schema(
        &self,
        content_type: ContentType,
        id: u64,
        schema: &str,
    ) -> Result<WriteStatus> {
        let url = self.endpoint(&format!("{}/{}", content_type.rest_route(), id));
        let payload = match content_type {
            ContentType::Post | ContentType::Page => json!({
                "meta": {
                    meta_fields::INPOST_CONTAINER: {
                        meta_fields::INPOST_SCRIPT: schema,
                    }
                }
            }),
            ContentType::Category => json!({
                "meta": {
                    meta_fields::CATEGORY_SCHEMA: schema,
                }
            }),
        };

        let resp = self.patch(&url, &payload).await?;
        if resp.status().is_success() {
            Ok(WriteStatus::Accepted)
        } else {
            Ok(WriteStatus::Rejected(Self::rejection_detail(resp).await))
        }
    }

    async fn write_description(&self, id: u64, description: &str) -> Result<WriteStatus> {
        let url = self.endpoint(&format!("categories/{}", id));
        let resp = self.patch(&url, &json!({ "description": description })).await?;
        if resp.status().is_success() {
            Ok(WriteStatus::Accepted)
        } else {
            Ok(WriteStatus::Rejected(Self::rejection_detail(resp).await))
        }
    }
}

/// Builds and caches one `WpClient` per site key for the run
pub struct WpClientProvider {
    timeout: Duration,
    cache: Mutex<HashMap<String, Arc<WpClient>>>,
}

impl WpClientProvider {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            cache: Mutex::new(HashMap::new()),
        }
    }
}

impl SiteApiProvider for WpClientProvider {
    fn api_for(&self, account: &Account) -> Result<Arc<dyn SiteApi>> {
        let mut cache = self.cache.lock().unwrap();
        if let Some(client) = cache.get(&account.site) {
            return Ok(client.clone() as Arc<dyn SiteApi>);
        }
        let client = Arc::new(WpClient::new(account, self.timeout)?);
        cache.insert(account.site.clone(), client.clone());
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    /// Serve one canned HTTP response on a local port
    async fn one_shot_server(status_line: &str, content_type: &str, body: &str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {}\r\ncontent-type: {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status_line,
            content_type,
            body.len(),
            body
        );
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let _ = socket.write_all(response.as_bytes()).await;
        });
        format!("http://{}", addr)
    }

    fn account_for(api_url: String) -> Account {
        Account {
            site: "a".to_string(),
            api_url,
            user: "u".to_string(),
            app_pass: "p".to_string(),
        }
    }

    #[tokio::test]
    async fn test_rejected_write_carries_json_error_body() {
        let base = one_shot_server(
            "403 Forbidden",
            "application/json",
            r#"{"code":"rest_forbidden","message":"Sorry"}"#,
        )
        .await;
        let client = WpClient::new(&account_for(base), Duration::from_secs(5)).unwrap();

        let status = client
            .write_schema(ContentType::Post, 7, "<script>S</script>")
            .await
            .unwrap();

        match status {
            WriteStatus::Rejected(detail) => {
                assert!(detail.contains("rest_forbidden"), "detail: {}", detail)
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rejected_write_falls_back_to_raw_text() {
        let base = one_shot_server("502 Bad Gateway", "text/html", "upstream down").await;
        let client = WpClient::new(&account_for(base), Duration::from_secs(5)).unwrap();

        let status = client
            .write_description(7, "restore me")
            .await
            .unwrap();

        assert_eq!(status, WriteStatus::Rejected("upstream down".to_string()));
    }

    #[test]
    fn test_lenient_u64() {
        assert_eq!(lenient_u64(&json!(42)), Some(42));
        assert_eq!(lenient_u64(&json!("17")), Some(17));
        assert_eq!(lenient_u64(&json!(" 5 ")), Some(5));
        assert_eq!(lenient_u64(&json!("page")), None);
        assert_eq!(lenient_u64(&json!(null)), None);
        assert_eq!(lenient_u64(&json!(-3)), None);
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let account = Account {
            site: "a".to_string(),
            api_url: "https://example.com/".to_string(),
            user: "u".to_string(),
            app_pass: "p".to_string(),
        };
        let client = WpClient::new(&account, Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.endpoint("posts/3"),
            "https://example.com/wp-json/wp/v2/posts/3"
        );
    }
}
