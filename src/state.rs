use reqwest::Client;
use std::error::Error;
use std::sync::Arc;

use crate::cache::{Cache, MemoryCache};
use crate::config::Config;
use crate::external::ExternalRegistry;
use crate::hero::HeroResolver;
use crate::store::{ArticleStore, MemoryStore};
use crate::weather::WeatherService;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub http: Client,
    pub cache: Arc<dyn Cache>,
    pub store: Arc<dyn ArticleStore>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, Box<dyn Error>> {
        Self::with_parts(
            config,
            Arc::new(MemoryCache::new()),
            Arc::new(MemoryStore::new()),
        )
    }

    pub fn with_parts(
        config: Config,
        cache: Arc<dyn Cache>,
        store: Arc<dyn ArticleStore>,
    ) -> Result<Self, Box<dyn Error>> {
        let http = Client::builder()
            .timeout(config.fetch_timeout())
            .user_agent(concat!("newsdesk/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            config: Arc::new(config),
            http,
            cache,
            store,
        })
    }

    pub fn hero_resolver(&self) -> HeroResolver {
        HeroResolver::new(self.http.clone(), self.cache.clone(), &self.config)
    }

    pub fn registry(&self) -> ExternalRegistry {
        ExternalRegistry::new(self.cache.clone(), self.config.cache_ttl())
    }

    pub fn weather(&self) -> WeatherService {
        WeatherService::new(self.http.clone(), self.cache.clone(), &self.config)
    }
}
