//! Weather proxy.
//!
//! A thin normalizing proxy over two providers, selected by configuration:
//! Open-Meteo (keyless) and OpenWeather (keyed). Shares the
//! cache-and-normalize pattern of the hero pipeline — results are cached
//! under the coordinates rounded to four decimal places, and each
//! provider's idiosyncratic response is mapped into one
//! [`NormalizedWeather`] shape with the raw payload attached for
//! debugging.

use chrono::DateTime;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::cache::Cache;
use crate::config::{Config, WeatherProvider};
use crate::models::NormalizedWeather;

#[derive(Debug, Error)]
pub enum WeatherError {
    /// Client input problem; maps to a 4xx response.
    #[error("invalid coordinates: {0}")]
    InvalidCoordinates(String),
    /// Server-side configuration problem; maps to a 5xx response.
    #[error("weather provider API key is not configured")]
    MissingApiKey,
    /// The provider request failed at the network or payload layer.
    #[error("weather provider request failed: {0}")]
    Upstream(String),
}

/// Cache key for a coordinate pair, rounded to 4 decimal places (~11 m),
/// so nearby repeat requests share an entry.
pub fn cache_key(lat: f64, lon: f64) -> String {
    format!("weather:{lat:.4}:{lon:.4}")
}

/// WMO weather code to condition text. Open-Meteo only sends the code.
fn wmo_condition(code: i64) -> &'static str {
    match code {
        0 => "Clear sky",
        1..=3 => "Partly cloudy",
        45 | 48 => "Fog",
        51..=57 => "Drizzle",
        61..=67 => "Rain",
        71..=77 => "Snow",
        80..=82 => "Rain showers",
        85 | 86 => "Snow showers",
        95..=99 => "Thunderstorm",
        _ => "Unknown",
    }
}

pub struct WeatherService {
    client: Client,
    cache: Arc<dyn Cache>,
    provider: WeatherProvider,
    api_key: Option<String>,
    open_meteo_url: String,
    open_weather_url: String,
    ttl: Duration,
}

impl WeatherService {
    pub fn new(client: Client, cache: Arc<dyn Cache>, config: &Config) -> Self {
        Self {
            client,
            cache,
            provider: config.weather.provider,
            api_key: config.weather.api_key.clone(),
            open_meteo_url: config.weather.open_meteo_url.clone(),
            open_weather_url: config.weather.open_weather_url.clone(),
            ttl: config.cache_ttl(),
        }
    }

    /// Current weather for a coordinate pair, served from cache within the
    /// TTL.
    #[instrument(level = "info", skip(self))]
    pub async fn get_weather(&self, lat: f64, lon: f64) -> Result<NormalizedWeather, WeatherError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(WeatherError::InvalidCoordinates(format!("lat={lat}")));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(WeatherError::InvalidCoordinates(format!("lon={lon}")));
        }

        let key = cache_key(lat, lon);
        match self.cache.get(&key) {
            Ok(Some(cached)) => match serde_json::from_value::<NormalizedWeather>(cached) {
                Ok(weather) => {
                    debug!(%key, "Weather cache hit");
                    return Ok(weather);
                }
                Err(e) => {
                    warn!(error = %e, "Cached weather is malformed; dropping it");
                    let _ = self.cache.delete(&key);
                }
            },
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Weather cache read failed; refetching"),
        }

        let weather = match self.provider {
            WeatherProvider::OpenMeteo => self.fetch_open_meteo(lat, lon).await?,
            WeatherProvider::OpenWeather => self.fetch_open_weather(lat, lon).await?,
        };

        match serde_json::to_value(&weather) {
            Ok(value) => {
                if let Err(e) = self.cache.set(&key, &value, self.ttl) {
                    warn!(error = %e, "Weather cache write failed; continuing");
                }
            }
            Err(e) => warn!(error = %e, "Weather serialization failed; not cached"),
        }
        Ok(weather)
    }

    async fn fetch_open_meteo(&self, lat: f64, lon: f64) -> Result<NormalizedWeather, WeatherError> {
        let url = format!(
            "{}?latitude={lat}&longitude={lon}\
             &current=temperature_2m,relative_humidity_2m,weather_code,wind_speed_10m\
             &daily=sunrise,sunset&timezone=auto",
            self.open_meteo_url
        );
        let payload = self.fetch_json(&url).await?;

        let current = &payload["current"];
        let code = current["weather_code"].as_i64().unwrap_or(-1);
        Ok(NormalizedWeather {
            temp: current["temperature_2m"].as_f64().unwrap_or_default(),
            condition: wmo_condition(code).to_string(),
            icon: code.to_string(),
            humidity: current["relative_humidity_2m"].as_f64(),
            wind_kph: current["wind_speed_10m"].as_f64(),
            sunrise: payload["daily"]["sunrise"][0].as_str().map(str::to_string),
            sunset: payload["daily"]["sunset"][0].as_str().map(str::to_string),
            location_name: format!("{lat:.2}, {lon:.2}"),
            raw: payload,
        })
    }

    async fn fetch_open_weather(
        &self,
        lat: f64,
        lon: f64,
    ) -> Result<NormalizedWeather, WeatherError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(WeatherError::MissingApiKey);
        };
        let url = format!(
            "{}?lat={lat}&lon={lon}&appid={}&units=metric",
            self.open_weather_url,
            urlencoding::encode(api_key)
        );
        let payload = self.fetch_json(&url).await?;

        let first_condition = &payload["weather"][0];
        Ok(NormalizedWeather {
            temp: payload["main"]["temp"].as_f64().unwrap_or_default(),
            condition: first_condition["description"]
                .as_str()
                .or_else(|| first_condition["main"].as_str())
                .unwrap_or("Unknown")
                .to_string(),
            icon: first_condition["icon"].as_str().unwrap_or_default().to_string(),
            humidity: payload["main"]["humidity"].as_f64(),
            wind_kph: payload["wind"]["speed"].as_f64().map(|ms| ms * 3.6),
            sunrise: unix_to_rfc3339(payload["sys"]["sunrise"].as_i64()),
            sunset: unix_to_rfc3339(payload["sys"]["sunset"].as_i64()),
            location_name: payload["name"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| format!("{lat:.2}, {lon:.2}")),
            raw: payload,
        })
    }

    async fn fetch_json(&self, url: &str) -> Result<Value, WeatherError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| WeatherError::Upstream(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(WeatherError::Upstream(format!(
                "status {}",
                resp.status()
            )));
        }
        resp.json()
            .await
            .map_err(|e| WeatherError::Upstream(e.to_string()))
    }
}

fn unix_to_rfc3339(ts: Option<i64>) -> Option<String> {
    ts.and_then(|ts| DateTime::from_timestamp(ts, 0))
        .map(|dt| dt.to_rfc3339())
}
