//! External hero resolution.
//!
//! "Today's hero" is the externally sourced story featured at the top of
//! the home page. Resolution is a chain of degradations: the cached hero,
//! then the primary news provider (header-based auth, retried once with
//! the credential moved into the query string for providers that only
//! accept one form), then a fixed public RSS feed, then nothing. Absence
//! of a hero is a normal outcome, never an error — upstream failures are
//! logged and absorbed.
//!
//! Provider payload shapes are not statically known, so the payload search
//! is a declarative list of shape matchers tried in order, and each
//! logical field is pulled through an ordered list of alternate key
//! spellings.

use chrono::Utc;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::cache::Cache;
use crate::config::Config;
use crate::external::ExternalRegistry;
use crate::models::ExternalArticle;
use crate::normalize::{self, first_field, strip_tags};
use crate::rss;
use crate::utils::truncate_for_log;

type FetchError = Box<dyn std::error::Error + Send + Sync>;

/// Alternate key spellings per logical field, first present non-empty wins.
const TITLE_KEYS: &[&str] = &["title", "headline", "name"];
const URL_KEYS: &[&str] = &["url", "link", "web_url", "webUrl", "canonical_url"];
const IMAGE_KEYS: &[&str] = &["image", "image_url", "urlToImage", "thumbnail", "media_url"];
const PUBLISHED_KEYS: &[&str] = &[
    "published",
    "published_at",
    "publishedAt",
    "pub_date",
    "pubDate",
    "date",
];
const SOURCE_KEYS: &[&str] = &["source_name", "source", "publisher", "rights", "clean_url"];

/// Keys that may hold a flat article list.
const ARTICLE_LIST_KEYS: &[&str] = &["articles", "news", "results", "items", "data", "posts"];

type ShapeMatcher = fn(&Value) -> Option<Value>;

/// Payload shapes tried in order; the first article found is accepted
/// without scoring.
const SHAPE_MATCHERS: &[(&str, ShapeMatcher)] = &[
    ("clusters", match_clusters),
    ("keyed_list", match_keyed_list),
    ("any_list", match_any_list),
    ("bare_list", match_bare_list),
];

/// The nested "clusters of articles" shape: `top_news[0].news[0]`.
fn match_clusters(payload: &Value) -> Option<Value> {
    let article = payload
        .get("top_news")?
        .as_array()?
        .first()?
        .get("news")?
        .as_array()?
        .first()?;
    article.is_object().then(|| article.clone())
}

/// A flat article list under one of the common key names.
fn match_keyed_list(payload: &Value) -> Option<Value> {
    for key in ARTICLE_LIST_KEYS {
        if let Some(list) = payload.get(*key).and_then(Value::as_array) {
            if let Some(first) = list.iter().find(|v| v.is_object()) {
                return Some(first.clone());
            }
        }
    }
    None
}

/// The first list of objects found anywhere in the payload.
fn match_any_list(payload: &Value) -> Option<Value> {
    match payload {
        Value::Array(list) => list.iter().find(|v| v.is_object()).cloned(),
        Value::Object(map) => map.values().find_map(match_any_list),
        _ => None,
    }
}

/// The payload itself, when it is already a list.
fn match_bare_list(payload: &Value) -> Option<Value> {
    payload.as_array()?.iter().find(|v| v.is_object()).cloned()
}

fn find_article(payload: &Value) -> Option<Value> {
    for (shape, matcher) in SHAPE_MATCHERS {
        if let Some(article) = matcher(payload) {
            debug!(shape, "Matched provider payload shape");
            return Some(article);
        }
    }
    None
}

/// Map an accepted provider article object onto the canonical shape.
fn normalize_article(raw: Value) -> ExternalArticle {
    let title = first_field(&raw, TITLE_KEYS).unwrap_or_default();
    let url = first_field(&raw, URL_KEYS).filter(|u| !u.is_empty());
    // Some providers send the literal string "None" for absent images.
    let image_url = first_field(&raw, IMAGE_KEYS).filter(|v| v != "None" && v != "null");
    let published_at = first_field(&raw, PUBLISHED_KEYS);
    let source_name = first_field(&raw, SOURCE_KEYS);
    let content = first_field(&raw, normalize::TEXT_KEYS)
        .map(|t| strip_tags(&t))
        .filter(|t| !t.is_empty());

    let mut article = ExternalArticle {
        external_id: None,
        title: strip_tags(&title),
        url,
        internal_url: None,
        image_url,
        published_at,
        source_name,
        content,
        raw,
    };
    if article.source_name.is_none() {
        article.source_name = article.source_tag();
    }
    article
}

/// Append the API credential as a query parameter, for providers that
/// reject header-based authentication.
fn credential_url(base: &str, key: Option<&str>) -> String {
    match key {
        Some(k) => {
            let sep = if base.contains('?') { '&' } else { '?' };
            format!("{base}{sep}apiKey={}", urlencoding::encode(k))
        }
        None => base.to_string(),
    }
}

/// Resolves today's hero against the cache and the upstream sources.
pub struct HeroResolver {
    client: Client,
    cache: Arc<dyn Cache>,
    registry: ExternalRegistry,
    api_url: String,
    api_key: Option<String>,
    rss_url: String,
    ttl: Duration,
}

impl HeroResolver {
    pub fn new(client: Client, cache: Arc<dyn Cache>, config: &Config) -> Self {
        Self {
            client,
            registry: ExternalRegistry::new(cache.clone(), config.cache_ttl()),
            cache,
            api_url: config.news.api_url.clone(),
            api_key: config.news.api_key.clone(),
            rss_url: config.news.rss_url.clone(),
            ttl: config.cache_ttl(),
        }
    }

    fn hero_key() -> String {
        format!("hero:{}", Utc::now().date_naive())
    }

    /// Today's hero, or `None` when every source is exhausted.
    ///
    /// Idempotent within the cache TTL; concurrent cold-cache callers race
    /// benignly (last writer wins on the hero key).
    #[instrument(level = "info", skip_all)]
    pub async fn get_hero(&self) -> Option<ExternalArticle> {
        let key = Self::hero_key();
        match self.cache.get(&key) {
            Ok(Some(cached)) => match serde_json::from_value::<ExternalArticle>(cached) {
                Ok(article) => {
                    debug!(title = %article.title, "Hero cache hit");
                    return Some(article);
                }
                Err(e) => {
                    warn!(error = %e, "Cached hero is malformed; dropping it");
                    let _ = self.cache.delete(&key);
                }
            },
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Hero cache read failed; refetching"),
        }

        let article = match self.fetch_primary().await {
            Ok(article) => Some(article),
            Err(e) => {
                warn!(error = %e, "Primary news provider failed; falling back to RSS");
                self.fetch_rss().await
            }
        };
        let Some(article) = article else {
            info!("No hero available from any source");
            return None;
        };

        let article = self.registry.register(article);
        match serde_json::to_value(&article) {
            Ok(value) => {
                if let Err(e) = self.cache.set(&key, &value, self.ttl) {
                    warn!(error = %e, "Hero cache write failed; continuing");
                }
            }
            Err(e) => warn!(error = %e, "Hero serialization failed; not cached"),
        }
        info!(title = %article.title, source = ?article.source_name, "Resolved hero");
        Some(article)
    }

    /// Query the primary provider. Header-based auth first; on a
    /// non-success status, one retry with the credential in the query
    /// string.
    async fn fetch_primary(&self) -> Result<ExternalArticle, FetchError> {
        let payload = self.fetch_primary_payload().await?;
        let article = find_article(&payload).ok_or_else(|| {
            FetchError::from(format!(
                "no article in provider payload: {}",
                truncate_for_log(&payload.to_string(), 200)
            ))
        })?;
        Ok(normalize_article(article))
    }

    async fn fetch_primary_payload(&self) -> Result<Value, FetchError> {
        let mut request = self.client.get(&self.api_url);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", key);
        }
        let resp = request.send().await?;
        if resp.status().is_success() {
            return Ok(resp.json().await?);
        }
        if self.api_key.is_none() {
            return Err(format!("provider returned status {}", resp.status()).into());
        }

        warn!(
            status = %resp.status(),
            "Header-authenticated request rejected; retrying with query credential"
        );
        let url = credential_url(&self.api_url, self.api_key.as_deref());
        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(format!("provider returned status {}", resp.status()).into());
        }
        Ok(resp.json().await?)
    }

    async fn fetch_rss(&self) -> Option<ExternalArticle> {
        let resp = match self.client.get(&self.rss_url).send().await {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                warn!(status = %resp.status(), "RSS feed returned non-success status");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "RSS feed fetch failed");
                return None;
            }
        };
        let xml = match resp.text().await {
            Ok(xml) => xml,
            Err(e) => {
                warn!(error = %e, "Reading RSS body failed");
                return None;
            }
        };
        let mut article = rss::first_item(&xml)?;
        if article.source_name.is_none() {
            article.source_name = article.source_tag().or_else(|| Some("RSS".to_string()));
        }
        Some(article)
    }
}
