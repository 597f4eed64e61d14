//! Service configuration.
//!
//! Everything is defaulted so the YAML file is optional; a partial file
//! overrides only the keys it names. API keys can also arrive through the
//! environment (see `cli`), which wins over the file.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::time::Duration;
use tracing::info;

use crate::cli::Cli;
use crate::models::HeroMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind_addr: String,
    pub port: u16,
    pub hero_mode: HeroMode,
    /// TTL shared by the hero, external-article, and weather caches.
    pub cache_ttl_secs: u64,
    /// Timeout for provider API and feed calls.
    pub fetch_timeout_secs: u64,
    /// Timeout for the full source-page refetch during text extraction.
    pub page_fetch_timeout_secs: u64,
    /// Paragraph cap for the article text extractor.
    pub max_paragraphs: usize,
    /// When set, `POST /api/weather` requires a matching `X-CSRF-Token`.
    pub csrf_token: Option<String>,
    pub news: NewsConfig,
    pub weather: WeatherConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 3000,
            hero_mode: HeroMode::default(),
            cache_ttl_secs: 300,
            fetch_timeout_secs: 6,
            page_fetch_timeout_secs: 12,
            max_paragraphs: 30,
            csrf_token: None,
            news: NewsConfig::default(),
            weather: WeatherConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    /// Primary top-news provider endpoint.
    pub api_url: String,
    pub api_key: Option<String>,
    /// Public feed used when the primary provider fails.
    pub rss_url: String,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.currentsapi.services/v1/latest-news".to_string(),
            api_key: None,
            rss_url: "https://feeds.bbci.co.uk/news/rss.xml".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherProvider {
    #[default]
    OpenMeteo,
    OpenWeather,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub provider: WeatherProvider,
    /// Required by the `open_weather` provider.
    pub api_key: Option<String>,
    pub open_meteo_url: String,
    pub open_weather_url: String,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            provider: WeatherProvider::default(),
            api_key: None,
            open_meteo_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            open_weather_url: "https://api.openweathermap.org/data/2.5/weather".to_string(),
        }
    }
}

impl Config {
    /// Load from a YAML file, or the defaults when no path is given.
    pub fn load(path: Option<&str>) -> Result<Self, Box<dyn Error>> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                let config = serde_yaml::from_str(&text)?;
                info!(path, "Loaded configuration");
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    /// Fold command-line / environment overrides into the file values.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(bind_addr) = &cli.bind_addr {
            self.bind_addr = bind_addr.clone();
        }
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(key) = &cli.news_api_key {
            self.news.api_key = Some(key.clone());
        }
        if let Some(key) = &cli.weather_api_key {
            self.weather.api_key = Some(key.clone());
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn page_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.page_fetch_timeout_secs)
    }
}
