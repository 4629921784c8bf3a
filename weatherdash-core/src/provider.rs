use crate::{
    config::Config,
    error::WeatherError,
    model::{CitySearchResult, ReverseGeocoded},
    provider::openweather::{OpenWeatherProvider, OwCurrentResponse, OwForecastResponse},
};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openweather;

/// Suggestions are capped at this many entries.
pub const SEARCH_LIMIT: usize = 5;
/// Shorter queries never reach the provider.
pub const MIN_QUERY_CHARS: usize = 2;

/// What to resolve weather for.
#[derive(Debug, Clone, PartialEq)]
pub enum WeatherQuery {
    /// Free-text city name, geocoded by the provider first.
    City(String),
    Coordinates { lat: f64, lon: f64 },
}

/// Raw current + forecast documents as returned by the provider.
#[derive(Debug, Clone)]
pub struct WeatherPayload {
    pub current: OwCurrentResponse,
    pub forecast: OwForecastResponse,
}

/// Adapter over the third-party weather and geocoding service.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    /// Up to [`SEARCH_LIMIT`] city suggestions; empty for queries shorter
    /// than [`MIN_QUERY_CHARS`].
    async fn search(&self, query: &str) -> Result<Vec<CitySearchResult>, WeatherError>;

    /// Current conditions and the 5-day / 3-hour forecast.
    async fn weather(&self, query: &WeatherQuery) -> Result<WeatherPayload, WeatherError>;

    async fn reverse_geocode(&self, lat: f64, lon: f64) -> Result<ReverseGeocoded, WeatherError>;
}

pub fn query_too_short(query: &str) -> bool {
    query.trim().chars().count() < MIN_QUERY_CHARS
}

/// Construct the OpenWeatherMap adapter from config.
pub fn provider_from_config(config: &Config) -> Result<OpenWeatherProvider, WeatherError> {
    let api_key = config.api_key().ok_or(WeatherError::MissingApiKey)?;
    OpenWeatherProvider::new(api_key, config.base_url(), config.request_timeout())
}
