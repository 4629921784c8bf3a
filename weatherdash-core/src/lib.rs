//! Core library for the `weatherdash` weather dashboard.
//!
//! This crate defines:
//! - A pluggable key/value persistence layer for client state
//! - The favorites store and the fixed-window rate limiter
//! - The OpenWeatherMap adapter and the mapping into dashboard models
//! - Fetch orchestration (`WeatherSession`) and debounced city search
//!
//! It is used by `weatherdash-cli`, but any other front end can drive the same
//! session and search objects.

pub mod clock;
pub mod config;
pub mod error;
pub mod favorites;
pub mod forecast;
pub mod location;
pub mod model;
pub mod preferences;
pub mod provider;
pub mod rate_limit;
pub mod search;
pub mod session;
pub mod storage;

pub use config::Config;
pub use error::{LocationError, WeatherError};
pub use favorites::{FavoriteCity, FavoritesError, FavoritesStore, NewFavorite};
pub use model::{
    CitySearchResult, CurrentWeather, DailyForecast, HourlyForecast, WeatherCondition, WeatherData,
};
pub use preferences::{LocationPermission, Preferences, TemperatureUnit, Theme};
pub use provider::{WeatherProvider, WeatherQuery};
pub use rate_limit::{CallPolicy, RateLimitStatus, RateLimiter};
pub use search::CitySearch;
pub use session::{FetchOutcome, SessionFailure, SessionState, WeatherSession};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
