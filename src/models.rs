//! Data models for the news backend.
//!
//! This module defines the core data structures used throughout the service:
//! - [`Category`] / [`Article`]: locally stored content
//! - [`ExternalArticle`]: a cache-resident article sourced from a third-party
//!   provider or an RSS feed
//! - [`ArticleView`]: the tagged union handed to the rendering boundary, so
//!   templates never see a duck-typed stand-in object
//! - [`NormalizedWeather`]: the one shape both weather providers map into
//! - [`HeroMode`]: the three-way hero selection switch

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::excerpt;

/// Characters of body text exposed in list views and the local hero shape.
pub const EXCERPT_CHARS: usize = 200;

/// A content category.
///
/// The slug is derived from the name at creation time and is unique across
/// all categories; see `store::MemoryStore::create_category`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: u64,
    pub name: String,
    pub slug: String,
    pub image: Option<String>,
    pub description: Option<String>,
}

/// A locally stored article. Belongs to exactly one category; recency is
/// judged solely by `created_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: u64,
    pub title: String,
    pub image: Option<String>,
    pub category_id: u64,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl Article {
    /// Path of this article's detail page.
    pub fn internal_url(&self) -> String {
        format!("/news/{}", self.id)
    }

    /// Leading portion of the body, cut on a word boundary.
    pub fn excerpt(&self) -> String {
        excerpt(&self.body, EXCERPT_CHARS)
    }
}

/// An externally sourced article, normalized from a provider payload or an
/// RSS item.
///
/// Lives only in the cache: `external_id` and `internal_url` are assigned
/// when the article is registered (see `external::ExternalRegistry`), and
/// `content` is filled lazily on the first detail-page resolution.
/// `raw` keeps the provider's own object for debugging and as the input to
/// the text normalizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalArticle {
    #[serde(default)]
    pub external_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub internal_url: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub source_name: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default = "Value::default")]
    pub raw: Value,
}

impl ExternalArticle {
    /// Extract the domain name (before .com/.org/etc) from the source URL,
    /// e.g. `"https://feeds.bbci.co.uk/news"` -> `"bbci"`. Used as a
    /// source-name fallback when the provider names nothing.
    pub fn source_tag(&self) -> Option<String> {
        self.url.as_ref().and_then(|url| {
            let parsed = url::Url::parse(url).ok()?;
            let host = parsed.host_str()?;
            let parts: Vec<&str> = host.split('.').collect();
            if parts.len() >= 2 {
                Some(parts[parts.len() - 2].to_string())
            } else {
                None
            }
        })
    }
}

/// Hero selection policy for the home page and the hero endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HeroMode {
    /// External hero when resolvable, overriding local content.
    #[default]
    PreferExternal,
    /// Newest local article when one exists; external only as fallback.
    PreferLocal,
    /// Never touch the external pipeline.
    LocalOnly,
}

/// The article view handed to the rendering boundary.
///
/// A template (or JSON consumer) receives one of two explicit shapes,
/// discriminated by the `external` field, rather than a duck-typed
/// stand-in object.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ArticleView {
    External(ExternalArticleView),
    Local(LocalArticleView),
}

impl ArticleView {
    pub fn external(article: ExternalArticle) -> Self {
        ArticleView::External(ExternalArticleView {
            external: true,
            external_id: article.external_id.unwrap_or_default(),
            title: article.title,
            url: article.url,
            internal_url: article.internal_url.unwrap_or_default(),
            image_url: article.image_url,
            published_at: article.published_at,
            source_name: article.source_name,
            content: article.content,
            raw: article.raw,
        })
    }

    pub fn local(article: &Article, category_name: &str) -> Self {
        ArticleView::Local(LocalArticleView::new(article, category_name))
    }
}

/// Read-only view of an externally sourced article.
#[derive(Debug, Clone, Serialize)]
pub struct ExternalArticleView {
    pub external: bool,
    pub external_id: String,
    pub title: String,
    pub url: Option<String>,
    pub internal_url: String,
    pub image_url: Option<String>,
    pub published_at: Option<String>,
    pub source_name: Option<String>,
    pub content: Option<String>,
    pub raw: Value,
}

/// Read-only view of a locally stored article.
#[derive(Debug, Clone, Serialize)]
pub struct LocalArticleView {
    pub external: bool,
    pub id: u64,
    pub title: String,
    pub internal_url: String,
    pub image_url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub category: String,
    pub excerpt: String,
}

impl LocalArticleView {
    pub fn new(article: &Article, category_name: &str) -> Self {
        Self {
            external: false,
            id: article.id,
            title: article.title.clone(),
            internal_url: article.internal_url(),
            image_url: article.image.clone(),
            published_at: article.created_at,
            category: category_name.to_string(),
            excerpt: article.excerpt(),
        }
    }
}

/// The one weather shape both providers are mapped into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedWeather {
    pub temp: f64,
    pub condition: String,
    pub icon: String,
    pub humidity: Option<f64>,
    pub wind_kph: Option<f64>,
    pub sunrise: Option<String>,
    pub sunset: Option<String>,
    pub location_name: String,
    pub raw: Value,
}
