//! Persistent-store collaborator.
//!
//! The real deployment sits in front of a relational store; this service
//! only needs the handful of operations the page handlers use, so they are
//! expressed as the [`ArticleStore`] trait and backed by [`MemoryStore`]
//! here. Category slugs are derived once at creation time and collisions
//! are resolved by suffixing an incrementing counter.

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Mutex;
use thiserror::Error;
use tracing::info;

use crate::models::{Article, Category};
use crate::utils::slugify;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown category id {0}")]
    UnknownCategory(u64),
    #[error("unknown article id {0}")]
    UnknownArticle(u64),
}

/// Fields of an article not owned by the store.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub image: Option<String>,
    pub category_id: u64,
    pub body: String,
}

/// The store operations the handlers rely on.
///
/// Articles are always listed newest-first; `created_at` is the sole
/// recency signal. Deleting a category deletes its articles.
pub trait ArticleStore: Send + Sync {
    fn create_category(
        &self,
        name: &str,
        description: Option<&str>,
        image: Option<&str>,
    ) -> Category;
    fn get_category(&self, id: u64) -> Option<Category>;
    fn list_categories(&self) -> Vec<Category>;
    /// Update name/description/image. The slug is fixed once persisted.
    fn update_category(&self, category: Category) -> Result<(), StoreError>;
    /// Remove a category and all of its articles; returns the number of
    /// articles removed.
    fn delete_category(&self, id: u64) -> usize;

    fn create_article(&self, new: NewArticle) -> Result<Article, StoreError>;
    fn get_article(&self, id: u64) -> Option<Article>;
    fn update_article(&self, article: Article) -> Result<(), StoreError>;
    /// Most recent articles across all categories, newest first.
    fn list_recent(&self, limit: usize) -> Vec<Article>;
    /// A category's articles, newest first.
    fn list_by_category(&self, category_id: u64) -> Vec<Article>;
}

#[derive(Default)]
struct Inner {
    categories: BTreeMap<u64, Category>,
    articles: BTreeMap<u64, Article>,
    next_category_id: u64,
    next_article_id: u64,
}

/// In-process store used by the default deployment and by tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn sort_recent(mut articles: Vec<Article>) -> Vec<Article> {
    articles.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
    articles
}

impl ArticleStore for MemoryStore {
    fn create_category(
        &self,
        name: &str,
        description: Option<&str>,
        image: Option<&str>,
    ) -> Category {
        let mut inner = self.locked();
        let base = {
            let slug = slugify(name);
            if slug.is_empty() {
                "category".to_string()
            } else {
                slug
            }
        };
        let mut slug = base.clone();
        let mut counter = 1;
        while inner.categories.values().any(|c| c.slug == slug) {
            slug = format!("{base}-{counter}");
            counter += 1;
        }
        inner.next_category_id += 1;
        let category = Category {
            id: inner.next_category_id,
            name: name.to_string(),
            slug,
            image: image.map(str::to_string),
            description: description.map(str::to_string),
        };
        inner.categories.insert(category.id, category.clone());
        category
    }

    fn get_category(&self, id: u64) -> Option<Category> {
        self.locked().categories.get(&id).cloned()
    }

    fn list_categories(&self) -> Vec<Category> {
        self.locked().categories.values().cloned().collect()
    }

    fn update_category(&self, category: Category) -> Result<(), StoreError> {
        let mut inner = self.locked();
        let existing = inner
            .categories
            .get(&category.id)
            .ok_or(StoreError::UnknownCategory(category.id))?;
        let slug = existing.slug.clone();
        inner.categories.insert(
            category.id,
            Category {
                slug,
                ..category
            },
        );
        Ok(())
    }

    fn delete_category(&self, id: u64) -> usize {
        let mut inner = self.locked();
        if inner.categories.remove(&id).is_none() {
            return 0;
        }
        let orphaned: Vec<u64> = inner
            .articles
            .values()
            .filter(|a| a.category_id == id)
            .map(|a| a.id)
            .collect();
        for article_id in &orphaned {
            inner.articles.remove(article_id);
        }
        orphaned.len()
    }

    fn create_article(&self, new: NewArticle) -> Result<Article, StoreError> {
        let mut inner = self.locked();
        if !inner.categories.contains_key(&new.category_id) {
            return Err(StoreError::UnknownCategory(new.category_id));
        }
        inner.next_article_id += 1;
        let article = Article {
            id: inner.next_article_id,
            title: new.title,
            image: new.image,
            category_id: new.category_id,
            body: new.body,
            created_at: Utc::now(),
        };
        inner.articles.insert(article.id, article.clone());
        Ok(article)
    }

    fn get_article(&self, id: u64) -> Option<Article> {
        self.locked().articles.get(&id).cloned()
    }

    fn update_article(&self, article: Article) -> Result<(), StoreError> {
        let mut inner = self.locked();
        if !inner.articles.contains_key(&article.id) {
            return Err(StoreError::UnknownArticle(article.id));
        }
        if !inner.categories.contains_key(&article.category_id) {
            return Err(StoreError::UnknownCategory(article.category_id));
        }
        inner.articles.insert(article.id, article);
        Ok(())
    }

    fn list_recent(&self, limit: usize) -> Vec<Article> {
        let articles: Vec<Article> = self.locked().articles.values().cloned().collect();
        let mut sorted = sort_recent(articles);
        sorted.truncate(limit);
        sorted
    }

    fn list_by_category(&self, category_id: u64) -> Vec<Article> {
        let articles: Vec<Article> = self
            .locked()
            .articles
            .values()
            .filter(|a| a.category_id == category_id)
            .cloned()
            .collect();
        sort_recent(articles)
    }
}

/// Seed the five demo categories and one article per category.
///
/// Used by `--seed-demo` so a fresh server has something to render.
pub fn seed_demo(store: &dyn ArticleStore) {
    let rows = [
        (
            "World",
            "Breakthrough Cancer Therapy Shows Promising Results",
            "A new therapy developed by researchers demonstrates significant tumor \
             reduction in early clinical trials, offering hope to millions around the world.\
             \n\nThe trial enrolled patients across twelve countries, and regulators have \
             already signalled interest in an accelerated review of the results.",
        ),
        (
            "Politics",
            "Elections 2025: Key Takeaways from Last Night",
            "Voters turned out in record numbers as major upsets reshaped the political \
             landscape. Analysts say the results will have long-term implications.\
             \n\nCoalition talks are expected to begin within days, with smaller parties \
             suddenly holding outsized leverage over the next government's agenda.",
        ),
        (
            "Tech",
            "New Phone Launch: What's Different This Year",
            "The latest model introduces a flexible display and longer battery life, \
             though there are debates about pricing and software.\
             \n\nEarly reviewers note the hinge feels sturdier than last year's design, \
             but the flagship price tag puts it well above most rivals.",
        ),
        (
            "Sports",
            "City Wins Comeback Thriller in Final Seconds",
            "In an unbelievable finish, the home team reversed a late deficit and sealed \
             victory with a buzzer-beater. Fans celebrated into the night.\
             \n\nThe win moves the club into the playoff places with three matches left, \
             setting up a decisive final stretch of the season.",
        ),
        (
            "Entertainment",
            "Film Festival Highlights: The Year's Best Indies",
            "Critics praise a small set of independent films for bold storytelling and \
             striking visuals; audiences responded enthusiastically.\
             \n\nDistribution deals were announced for three of the festival favourites, \
             with wider releases expected before the end of the year.",
        ),
    ];

    for (category_name, title, body) in rows {
        let category = store.create_category(category_name, None, None);
        if let Err(e) = store.create_article(NewArticle {
            title: title.to_string(),
            image: None,
            category_id: category.id,
            body: body.to_string(),
        }) {
            // Category was just created; this cannot happen with a healthy store.
            tracing::warn!(error = %e, category = category_name, "Seeding skipped an article");
        }
    }
    info!(categories = rows.len(), "Seeded demo content");
}
