use serde::{Deserialize, Serialize};
use std::fmt;

/// Dashboard-level weather category, derived from the provider's condition
/// code and the day/night suffix of its icon token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WeatherCondition {
    Sunny,
    Cloudy,
    Rainy,
    Thunderstorm,
    Snow,
    Night,
    NightCloudy,
    Mist,
}

impl WeatherCondition {
    /// Maps an OpenWeatherMap condition id plus icon token (e.g. `"01n"`).
    pub fn from_provider(code: u16, icon: &str) -> Self {
        let night = icon.ends_with('n');

        match code {
            200..=299 => Self::Thunderstorm,
            300..=599 => Self::Rainy,
            600..=699 => Self::Snow,
            700..=799 => Self::Mist,
            800 if night => Self::Night,
            800 => Self::Sunny,
            _ if night => Self::NightCloudy,
            _ => Self::Cloudy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sunny => "sunny",
            Self::Cloudy => "cloudy",
            Self::Rainy => "rainy",
            Self::Thunderstorm => "thunderstorm",
            Self::Snow => "snow",
            Self::Night => "night",
            Self::NightCloudy => "night-cloudy",
            Self::Mist => "mist",
        }
    }

    pub fn is_night(&self) -> bool {
        matches!(self, Self::Night | Self::NightCloudy)
    }
}

impl fmt::Display for WeatherCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentWeather {
    pub location: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    pub temperature: i32,
    pub feels_like: i32,
    pub condition: WeatherCondition,
    pub condition_text: String,
    pub humidity: u8,
    /// km/h
    pub wind_speed: i32,
    /// hPa
    pub pressure: u32,
    /// km
    pub visibility: u32,
    pub uv_index: u8,
    pub is_day: bool,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyForecast {
    /// Local "HH:MM".
    pub time: String,
    pub temperature: i32,
    pub condition: WeatherCondition,
    pub condition_text: String,
    pub precip_chance: u8,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyForecast {
    /// Local "YYYY-MM-DD".
    pub date: String,
    pub day_name: String,
    pub temp_max: i32,
    pub temp_min: i32,
    pub condition: WeatherCondition,
    pub condition_text: String,
    pub precip_chance: u8,
    pub icon: String,
}

/// One complete fetch result. Replaced wholesale, never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherData {
    pub current: CurrentWeather,
    pub hourly: Vec<HourlyForecast>,
    pub daily: Vec<DailyForecast>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitySearchResult {
    pub name: String,
    pub country: String,
    #[serde(default)]
    pub state: String,
    pub lat: f64,
    pub lon: f64,
}

impl CitySearchResult {
    pub fn label(&self) -> String {
        if self.state.is_empty() {
            format!("{}, {}", self.name, self.country)
        } else {
            format!("{}, {}, {}", self.name, self.state, self.country)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReverseGeocoded {
    pub name: String,
    pub country: String,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thunderstorm_ignores_night_icon() {
        assert_eq!(WeatherCondition::from_provider(201, "11n"), WeatherCondition::Thunderstorm);
    }

    #[test]
    fn clear_sky_depends_on_icon_suffix() {
        assert_eq!(WeatherCondition::from_provider(800, "01d"), WeatherCondition::Sunny);
        assert_eq!(WeatherCondition::from_provider(800, "01n"), WeatherCondition::Night);
    }

    #[test]
    fn clouds_depend_on_icon_suffix() {
        assert_eq!(WeatherCondition::from_provider(802, "03d"), WeatherCondition::Cloudy);
        assert_eq!(WeatherCondition::from_provider(804, "04n"), WeatherCondition::NightCloudy);
    }

    #[test]
    fn atmosphere_codes_are_mist_day_or_night() {
        assert_eq!(WeatherCondition::from_provider(741, "50d"), WeatherCondition::Mist);
        assert_eq!(WeatherCondition::from_provider(741, "50n"), WeatherCondition::Mist);
    }

    #[test]
    fn range_edges() {
        assert_eq!(WeatherCondition::from_provider(300, "09d"), WeatherCondition::Rainy);
        assert_eq!(WeatherCondition::from_provider(599, "10n"), WeatherCondition::Rainy);
        assert_eq!(WeatherCondition::from_provider(600, "13d"), WeatherCondition::Snow);
        assert_eq!(WeatherCondition::from_provider(699, "13n"), WeatherCondition::Snow);
        assert_eq!(WeatherCondition::from_provider(299, "11d"), WeatherCondition::Thunderstorm);
    }

    #[test]
    fn condition_serializes_kebab_case() {
        let json = serde_json::to_string(&WeatherCondition::NightCloudy).unwrap();
        assert_eq!(json, "\"night-cloudy\"");
        assert_eq!(WeatherCondition::NightCloudy.to_string(), "night-cloudy");
    }

    #[test]
    fn search_result_label_skips_empty_state() {
        let paris = CitySearchResult {
            name: "Paris".into(),
            country: "FR".into(),
            state: String::new(),
            lat: 48.85,
            lon: 2.35,
        };
        assert_eq!(paris.label(), "Paris, FR");

        let austin = CitySearchResult { state: "Texas".into(), ..paris.clone() };
        assert_eq!(austin.label(), "Paris, Texas, FR");
    }
}
