use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::debug;

use crate::{
    error::WeatherError,
    model::{CitySearchResult, ReverseGeocoded},
    provider::{SEARCH_LIMIT, WeatherPayload, WeatherProvider, WeatherQuery, query_too_short},
};

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self, WeatherError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, WeatherError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "OpenWeatherMap request");

        let res = self
            .http
            .get(&url)
            .query(params)
            .query(&[("appid", self.api_key.as_str())])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            debug!(%status, body = %truncate_body(&body), "OpenWeatherMap error response");
            return Err(WeatherError::provider(provider_message(&body).unwrap_or_else(|| {
                format!("Weather provider request failed with status {status}")
            })));
        }

        serde_json::from_str(&body).map_err(|e| {
            WeatherError::provider(format!("Malformed response from weather provider: {e}"))
        })
    }

    async fn geocode(&self, query: &str, limit: usize) -> Result<Vec<OwGeoEntry>, WeatherError> {
        self.get_json(
            "/geo/1.0/direct",
            &[("q", query.to_string()), ("limit", limit.to_string())],
        )
        .await
    }

    async fn fetch_current(&self, lat: f64, lon: f64) -> Result<OwCurrentResponse, WeatherError> {
        self.get_json("/data/2.5/weather", &coordinate_params(lat, lon)).await
    }

    async fn fetch_forecast(&self, lat: f64, lon: f64) -> Result<OwForecastResponse, WeatherError> {
        self.get_json("/data/2.5/forecast", &coordinate_params(lat, lon)).await
    }
}

fn coordinate_params(lat: f64, lon: f64) -> [(&'static str, String); 3] {
    [("lat", lat.to_string()), ("lon", lon.to_string()), ("units", "metric".to_string())]
}

/// Pulls `message` out of an OpenWeatherMap error document.
fn provider_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .and_then(|m| m.as_str())
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct OwCoord {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwWeather {
    pub id: u16,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwMain {
    pub temp: f64,
    pub feels_like: f64,
    #[serde(default)]
    pub pressure: f64,
    #[serde(default)]
    pub humidity: u8,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OwWind {
    #[serde(default)]
    pub speed: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OwSys {
    pub country: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwCurrentResponse {
    pub name: String,
    pub coord: OwCoord,
    pub dt: i64,
    pub main: OwMain,
    #[serde(default)]
    pub weather: Vec<OwWeather>,
    #[serde(default)]
    pub wind: OwWind,
    #[serde(default)]
    pub sys: OwSys,
    pub visibility: Option<u32>,
    /// Shift from UTC in seconds.
    #[serde(default)]
    pub timezone: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwForecastEntry {
    pub dt: i64,
    pub main: OwMain,
    #[serde(default)]
    pub weather: Vec<OwWeather>,
    #[serde(default)]
    pub wind: OwWind,
    /// Probability of precipitation, 0.0–1.0.
    #[serde(default)]
    pub pop: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwCity {
    pub name: String,
    #[serde(default)]
    pub country: String,
    pub coord: Option<OwCoord>,
    #[serde(default)]
    pub timezone: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwForecastResponse {
    pub city: OwCity,
    pub list: Vec<OwForecastEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct OwGeoEntry {
    name: String,
    #[serde(default)]
    country: String,
    state: Option<String>,
    lat: f64,
    lon: f64,
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn search(&self, query: &str) -> Result<Vec<CitySearchResult>, WeatherError> {
        if query_too_short(query) {
            return Ok(Vec::new());
        }

        let cities = self
            .geocode(query.trim(), SEARCH_LIMIT)
            .await?
            .into_iter()
            .take(SEARCH_LIMIT)
            .map(|g| CitySearchResult {
                name: g.name,
                country: g.country,
                state: g.state.unwrap_or_default(),
                lat: g.lat,
                lon: g.lon,
            })
            .collect();

        Ok(cities)
    }

    async fn weather(&self, query: &WeatherQuery) -> Result<WeatherPayload, WeatherError> {
        let (lat, lon) = match query {
            WeatherQuery::Coordinates { lat, lon } => (*lat, *lon),
            WeatherQuery::City(city) => {
                let hit = self
                    .geocode(city.trim(), 1)
                    .await?
                    .into_iter()
                    .next()
                    .ok_or(WeatherError::NotFound)?;
                debug!(city = %city, lat = hit.lat, lon = hit.lon, "Geocoded city");
                (hit.lat, hit.lon)
            }
        };

        let current = self.fetch_current(lat, lon).await?;
        let forecast = self.fetch_forecast(lat, lon).await?;

        Ok(WeatherPayload { current, forecast })
    }

    async fn reverse_geocode(&self, lat: f64, lon: f64) -> Result<ReverseGeocoded, WeatherError> {
        let hits: Vec<OwGeoEntry> = self
            .get_json(
                "/geo/1.0/reverse",
                &[("lat", lat.to_string()), ("lon", lon.to_string()), ("limit", "1".to_string())],
            )
            .await?;

        let hit = hits.into_iter().next().ok_or(WeatherError::NotFound)?;
        Ok(ReverseGeocoded {
            name: hit.name,
            country: hit.country,
            state: hit.state.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_message_reads_error_document() {
        let body = r#"{"cod": 401, "message": "Invalid API key."}"#;
        assert_eq!(provider_message(body).as_deref(), Some("Invalid API key."));
        assert_eq!(provider_message("<html>bad gateway</html>"), None);
        assert_eq!(provider_message(r#"{"cod": "500", "message": ""}"#), None);
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let long = "é".repeat(300);
        let cut = truncate_body(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 203);
        assert_eq!(truncate_body("short"), "short");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let p = OpenWeatherProvider::new("k", "http://localhost:1234/", Duration::from_secs(1))
            .unwrap();
        assert_eq!(p.base_url, "http://localhost:1234");
    }

    #[test]
    fn current_response_tolerates_missing_optional_fields() {
        let raw = serde_json::json!({
            "name": "Nowhere",
            "coord": { "lat": 1.0, "lon": 2.0 },
            "dt": 0,
            "main": { "temp": 1.0, "feels_like": 0.5 }
        });
        let parsed: OwCurrentResponse = serde_json::from_value(raw).unwrap();
        assert!(parsed.weather.is_empty());
        assert_eq!(parsed.sys.country, None);
        assert_eq!(parsed.timezone, 0);
    }
}
