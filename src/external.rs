//! External article cache & resolver.
//!
//! Externally sourced stories have no durable storage tier: each one lives
//! in the cache under a stable short identifier derived from its source
//! URL, so refetching the same story always lands on the same detail-page
//! path within a TTL window. Resolution fills in the extracted full text
//! lazily and re-persists it, so only the first detail-page hit pays for
//! the refetch + extraction.

use chrono::Utc;
use reqwest::Client;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::cache::Cache;
use crate::extract;
use crate::models::ExternalArticle;
use crate::normalize;

/// Bytes of the SHA-256 digest kept in the identifier (16 hex chars).
/// Short enough for a readable URL; at the volumes a 5-minute TTL window
/// can hold, the collision probability is negligible but not zero.
pub const ID_PREFIX_BYTES: usize = 8;

/// Stands in for the URL of a URL-less article so it still gets a
/// deterministic identifier.
const NO_URL_PLACEHOLDER: &str = "no-url";

/// Derive the stable short identifier for a source URL.
pub fn external_id(url: Option<&str>) -> String {
    let input = url.filter(|u| !u.is_empty()).unwrap_or(NO_URL_PLACEHOLDER);
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(&digest[..ID_PREFIX_BYTES])
}

/// Path of the detail page serving an external identifier.
pub fn detail_url(id: &str) -> String {
    format!("/news/external/{id}")
}

fn cache_key(id: &str) -> String {
    format!("external:{id}")
}

/// Register/resolve externally sourced articles against the shared cache.
pub struct ExternalRegistry {
    cache: Arc<dyn Cache>,
    ttl: Duration,
}

impl ExternalRegistry {
    pub fn new(cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    /// Assign an identifier and persist the article under it.
    ///
    /// The identifier and detail-page URL are attached to the returned
    /// article. A cache write failure is logged and swallowed: the hero
    /// still renders, only its detail link goes cold early.
    pub fn register(&self, mut article: ExternalArticle) -> ExternalArticle {
        let id = external_id(article.url.as_deref());
        article.external_id = Some(id.clone());
        article.internal_url = Some(detail_url(&id));
        self.persist(&id, &article, Utc::now().to_rfc3339());
        debug!(%id, title = %article.title, "Registered external article");
        article
    }

    /// Look up an article by identifier, filling in the extracted full
    /// text on first resolution.
    ///
    /// Returns `None` for unknown or expired identifiers; callers are
    /// expected to fall back to the home experience rather than error.
    #[instrument(level = "info", skip_all, fields(%id))]
    pub async fn resolve(
        &self,
        id: &str,
        client: &Client,
        page_timeout: Duration,
        max_paragraphs: usize,
    ) -> Option<ExternalArticle> {
        let key = cache_key(id);
        let envelope = match self.cache.get(&key) {
            Ok(Some(envelope)) => envelope,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Cache read failed; treating identifier as unknown");
                return None;
            }
        };

        let mut article: ExternalArticle =
            match serde_json::from_value(envelope.get("article")?.clone()) {
                Ok(article) => article,
                Err(e) => {
                    warn!(error = %e, "Cached envelope is malformed; dropping it");
                    let _ = self.cache.delete(&key);
                    return None;
                }
            };

        if article
            .content
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty())
        {
            return Some(article);
        }

        let text = self
            .full_text(&article, client, page_timeout, max_paragraphs)
            .await;
        article.content = Some(text.clone());
        if let Value::Object(map) = &mut article.raw {
            map.insert("_extracted_text".to_string(), json!(text));
        }

        let fetched_at = envelope
            .get("fetched_at")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        self.persist(id, &article, fetched_at);
        Some(article)
    }

    fn persist(&self, id: &str, article: &ExternalArticle, fetched_at: String) {
        let envelope = json!({
            "article": article,
            "fetched_at": fetched_at,
            "source_url": article.url,
        });
        if let Err(e) = self.cache.set(&cache_key(id), &envelope, self.ttl) {
            warn!(error = %e, %id, "Cache write failed; external article will not resolve");
        }
    }

    /// Refetch the source page and extract readable text, degrading to the
    /// stored payload's own text and finally to a short message that at
    /// least names the story.
    async fn full_text(
        &self,
        article: &ExternalArticle,
        client: &Client,
        page_timeout: Duration,
        max_paragraphs: usize,
    ) -> String {
        if let Some(url) = article.url.as_deref() {
            match client.get(url).timeout(page_timeout).send().await {
                Ok(resp) if resp.status().is_success() => match resp.text().await {
                    Ok(html) => {
                        let text = extract::article_text(&html, max_paragraphs);
                        if !text.is_empty() {
                            return text;
                        }
                        debug!(%url, "Source page yielded no extractable text");
                    }
                    Err(e) => warn!(error = %e, %url, "Reading source page body failed"),
                },
                Ok(resp) => {
                    warn!(status = %resp.status(), %url, "Source page fetch rejected")
                }
                Err(e) => warn!(error = %e, %url, "Source page fetch failed"),
            }
        }

        let text = normalize::payload_text(&article.raw);
        if !text.is_empty() {
            return text;
        }
        format!(
            "The full text of \"{}\" could not be retrieved. Please follow the source link.",
            article.title
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn registry() -> ExternalRegistry {
        ExternalRegistry::new(Arc::new(MemoryCache::new()), Duration::from_secs(300))
    }

    fn article(url: Option<&str>) -> ExternalArticle {
        ExternalArticle {
            external_id: None,
            title: "A story".to_string(),
            url: url.map(str::to_string),
            internal_url: None,
            image_url: None,
            published_at: None,
            source_name: None,
            content: None,
            raw: json!({"title": "A story"}),
        }
    }

    #[test]
    fn test_identifier_is_deterministic() {
        let a = external_id(Some("http://x/1"));
        let b = external_id(Some("http://x/1"));
        assert_eq!(a, b);
        assert_eq!(a.len(), ID_PREFIX_BYTES * 2);
    }

    #[test]
    fn test_distinct_urls_get_distinct_identifiers() {
        assert_ne!(external_id(Some("http://x/1")), external_id(Some("http://x/2")));
    }

    #[test]
    fn test_urlless_articles_share_the_placeholder_identifier() {
        assert_eq!(external_id(None), external_id(Some("")));
    }

    #[test]
    fn test_register_attaches_identifier_and_detail_url() {
        let registered = registry().register(article(Some("http://x/1")));
        let id = registered.external_id.expect("id assigned");
        assert_eq!(registered.internal_url.as_deref(), Some(&*detail_url(&id)));
    }

    #[tokio::test]
    async fn test_register_resolve_roundtrip() {
        let registry = registry();
        let mut input = article(Some("http://x/1"));
        input.content = Some("Already extracted.".to_string());
        let registered = registry.register(input);
        let id = registered.external_id.clone().unwrap();

        let resolved = registry
            .resolve(&id, &Client::new(), Duration::from_secs(1), 10)
            .await
            .expect("resolves");
        assert_eq!(resolved.title, "A story");
        assert_eq!(resolved.url.as_deref(), Some("http://x/1"));
        assert_eq!(resolved.content.as_deref(), Some("Already extracted."));
    }

    #[tokio::test]
    async fn test_unknown_identifier_is_not_found() {
        let resolved = registry()
            .resolve("feedfeedfeedfeed", &Client::new(), Duration::from_secs(1), 10)
            .await;
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn test_resolve_extracts_full_text_from_source_page() {
        let server = MockServer::start().await;
        let body = format!(
            "<html><body><article><p>{}</p></article></body></html>",
            "Extractable paragraph text that easily clears the noise floor. ".repeat(3)
        );
        Mock::given(method("GET"))
            .and(path("/story"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(&server)
            .await;

        let registry = registry();
        let registered = registry.register(article(Some(&format!("{}/story", server.uri()))));
        let id = registered.external_id.clone().unwrap();

        let resolved = registry
            .resolve(&id, &Client::new(), Duration::from_secs(5), 10)
            .await
            .expect("resolves");
        let content = resolved.content.expect("content filled");
        assert!(content.contains("Extractable paragraph text"));
        assert_eq!(resolved.raw["_extracted_text"].as_str(), Some(content.as_str()));

        // Second resolve must serve the cached extraction (expect(1) above).
        let again = registry
            .resolve(&id, &Client::new(), Duration::from_secs(5), 10)
            .await
            .expect("resolves again");
        assert_eq!(again.content, Some(content));
    }

    #[tokio::test]
    async fn test_resolve_falls_back_to_payload_text() {
        let registry = registry();
        let mut input = article(None);
        input.raw = json!({"title": "A story", "description": "Teaser text."});
        let registered = registry.register(input);
        let id = registered.external_id.clone().unwrap();

        let resolved = registry
            .resolve(&id, &Client::new(), Duration::from_secs(1), 10)
            .await
            .expect("resolves");
        assert_eq!(resolved.content.as_deref(), Some("Teaser text."));
    }

    #[tokio::test]
    async fn test_resolve_terminal_fallback_references_title() {
        let registry = registry();
        let registered = registry.register(article(None));
        let id = registered.external_id.clone().unwrap();

        let resolved = registry
            .resolve(&id, &Client::new(), Duration::from_secs(1), 10)
            .await
            .expect("resolves");
        assert!(resolved.content.unwrap().contains("A story"));
    }
}
