//! Fetch orchestration for the dashboard.
//!
//! A session moves `Idle → Loading → Ready | Failed` and goes back to
//! `Loading` whenever a new fetch starts. Every fetch takes a ticket from a
//! monotonically increasing sequence; when it completes, its result is applied
//! only if that ticket is still the latest one issued. Older replies are
//! dropped as stale, so out-of-order network responses cannot overwrite a
//! newer snapshot.

use parking_lot::{Mutex, MutexGuard};
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use tracing::{debug, info, warn};

use crate::{
    clock::{Clock, SystemClock},
    error::{LocationError, WeatherError},
    favorites::{FavoriteCity, FavoritesStore, NewFavorite},
    forecast::build_weather_data,
    location::{LocationProvider, NoLocation, PositionOptions, locate},
    model::{Coordinates, WeatherData},
    preferences::{LocationPermission, Preferences},
    provider::{WeatherProvider, WeatherQuery},
    rate_limit::CallPolicy,
    storage::KeyValueStore,
};

/// Coarse category of a failed fetch, for choosing how to present it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NotFound,
    LocationUnavailable,
    RateLimited,
    Provider,
}

/// User-facing description of a failed fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Suggested city to try instead. Never fetched automatically.
    pub fallback_city: Option<String>,
}

impl From<&WeatherError> for SessionFailure {
    fn from(err: &WeatherError) -> Self {
        let (kind, fallback_city) = match err {
            WeatherError::NotFound => (FailureKind::NotFound, None),
            WeatherError::LocationUnavailable { fallback_city, .. } => {
                (FailureKind::LocationUnavailable, fallback_city.clone())
            }
            WeatherError::RateLimited { .. } => (FailureKind::RateLimited, None),
            WeatherError::Provider(_) | WeatherError::Http(_) | WeatherError::MissingApiKey => {
                (FailureKind::Provider, None)
            }
        };

        let message = match err {
            WeatherError::Provider(msg) if msg.trim().is_empty() => {
                "Failed to fetch weather data.".to_string()
            }
            other => other.to_string(),
        };

        Self { kind, message, fallback_city }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    Loading,
    Ready,
    Failed(SessionFailure),
}

/// What a single fetch call ended up doing to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Ready(WeatherData),
    Failed(SessionFailure),
    /// A newer fetch was started while this one was in flight.
    Stale,
}

/// Result of [`WeatherSession::refresh_favorites`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefreshReport {
    pub refreshed: usize,
    /// Favorites whose cache was left as it was, with the reason.
    pub failed: Vec<(FavoriteCity, SessionFailure)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FavoriteToggle {
    Added(FavoriteCity),
    Removed(FavoriteCity),
}

#[derive(Debug)]
struct SessionInner {
    state: SessionState,
    weather: Option<WeatherData>,
}

#[derive(Debug)]
pub struct WeatherSession {
    provider: Arc<dyn WeatherProvider>,
    location: Arc<dyn LocationProvider>,
    call_policy: Option<Arc<dyn CallPolicy>>,
    clock: Arc<dyn Clock>,
    favorites: Mutex<FavoritesStore>,
    preferences: Preferences,
    position_options: PositionOptions,
    fallback_city: Option<String>,
    sequence: AtomicU64,
    inner: Mutex<SessionInner>,
}

impl WeatherSession {
    /// Session with no location capability and no call policy. Favorites and
    /// preferences are restored from `store`.
    pub fn new(provider: Arc<dyn WeatherProvider>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            provider,
            location: Arc::new(NoLocation),
            call_policy: None,
            clock: Arc::new(SystemClock),
            favorites: Mutex::new(FavoritesStore::load(store.clone())),
            preferences: Preferences::new(store),
            position_options: PositionOptions::default(),
            fallback_city: None,
            sequence: AtomicU64::new(0),
            inner: Mutex::new(SessionInner { state: SessionState::Idle, weather: None }),
        }
    }

    pub fn with_location(mut self, location: Arc<dyn LocationProvider>) -> Self {
        self.location = location;
        self
    }

    pub fn with_position_options(mut self, options: PositionOptions) -> Self {
        self.position_options = options;
        self
    }

    /// Gate every provider call through `policy` (e.g. a rate limiter).
    pub fn with_call_policy(mut self, policy: Arc<dyn CallPolicy>) -> Self {
        self.call_policy = Some(policy);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// City suggested to the caller when geolocation fails.
    pub fn with_fallback_city(mut self, city: impl Into<String>) -> Self {
        self.fallback_city = Some(city.into());
        self
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.lock().state == SessionState::Loading
    }

    /// Last successful snapshot. Stays visible while a newer fetch runs.
    pub fn weather(&self) -> Option<WeatherData> {
        self.inner.lock().weather.clone()
    }

    pub fn favorites(&self) -> MutexGuard<'_, FavoritesStore> {
        self.favorites.lock()
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub async fn fetch_by_name(&self, city: &str) -> FetchOutcome {
        let ticket = self.begin();
        let city = city.trim();

        let result = if city.is_empty() {
            Err(WeatherError::NotFound)
        } else {
            self.resolve(WeatherQuery::City(city.to_string())).await
        };

        self.finish(ticket, result)
    }

    pub async fn fetch_by_coordinates(&self, lat: f64, lon: f64) -> FetchOutcome {
        let ticket = self.begin();
        let result = self.resolve(WeatherQuery::Coordinates { lat, lon }).await;
        self.finish(ticket, result)
    }

    /// Asks the location capability for a position and fetches weather there.
    /// Failure never falls back to another city on its own.
    pub async fn fetch_by_geolocation(&self) -> FetchOutcome {
        let ticket = self.begin();

        let result = match self.current_position().await {
            Ok(coords) => {
                self.resolve(WeatherQuery::Coordinates { lat: coords.lat, lon: coords.lon }).await
            }
            Err(reason) => {
                warn!(%reason, "Location unavailable");
                Err(WeatherError::LocationUnavailable {
                    reason,
                    fallback_city: self.fallback_city.clone(),
                })
            }
        };

        self.finish(ticket, result)
    }

    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        if self.preferences.location_permission() == Some(LocationPermission::Denied) {
            return Err(LocationError::PermissionDenied);
        }

        match locate(self.location.as_ref(), &self.position_options).await {
            Ok(coords) => {
                self.preferences.set_location_permission(LocationPermission::Granted);
                Ok(coords)
            }
            Err(LocationError::PermissionDenied) => {
                self.preferences.set_location_permission(LocationPermission::Denied);
                Err(LocationError::PermissionDenied)
            }
            Err(other) => Err(other),
        }
    }

    /// Refreshes the cached reading of every favorite without touching the
    /// session's own state. A failing city is logged and skipped; the rest of
    /// the list is still refreshed.
    pub async fn refresh_favorites(&self) -> RefreshReport {
        let targets: Vec<FavoriteCity> = self.favorites.lock().list().to_vec();
        let mut report = RefreshReport::default();

        for favorite in targets {
            let query = WeatherQuery::Coordinates { lat: favorite.lat, lon: favorite.lon };
            match self.resolve(query).await {
                Ok(data) => {
                    self.favorites.lock().update_cache(
                        &favorite.name,
                        &favorite.country,
                        data.current.temperature,
                        data.current.condition,
                    );
                    report.refreshed += 1;
                }
                Err(err) => {
                    warn!(name = %favorite.name, error = %err, "Favorite refresh failed");
                    report.failed.push((favorite, SessionFailure::from(&err)));
                }
            }
        }

        report
    }

    /// Adds the city on screen to favorites, or removes it if already saved.
    /// `None` when nothing has been fetched yet.
    pub fn toggle_favorite(&self) -> Option<FavoriteToggle> {
        let current = self.inner.lock().weather.as_ref()?.current.clone();
        let mut favorites = self.favorites.lock();

        if let Some(id) = favorites.find(&current.location, &current.country).map(|f| f.id.clone())
        {
            return favorites.remove(&id).map(FavoriteToggle::Removed);
        }

        let added = favorites.add(
            NewFavorite::new(current.location, current.country, current.lat, current.lon)
                .with_cache(current.temperature, current.condition),
        );
        Some(FavoriteToggle::Added(added.clone()))
    }

    fn begin(&self) -> u64 {
        let ticket = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.lock().state = SessionState::Loading;
        debug!(ticket, "Fetch started");
        ticket
    }

    async fn resolve(&self, query: WeatherQuery) -> Result<WeatherData, WeatherError> {
        if let Some(policy) = &self.call_policy {
            policy.acquire()?;
        }

        let payload = self.provider.weather(&query).await?;
        let data = build_weather_data(&payload, self.clock.now());

        // The reading is real even if a newer fetch supersedes this one.
        self.favorites.lock().update_cache(
            &data.current.location,
            &data.current.country,
            data.current.temperature,
            data.current.condition,
        );

        Ok(data)
    }

    fn finish(&self, ticket: u64, result: Result<WeatherData, WeatherError>) -> FetchOutcome {
        let latest = self.sequence.load(Ordering::SeqCst);
        if ticket != latest {
            debug!(ticket, latest, "Discarding stale fetch result");
            return FetchOutcome::Stale;
        }

        let mut inner = self.inner.lock();
        match result {
            Ok(data) => {
                info!(location = %data.current.location, country = %data.current.country, "Weather ready");
                inner.state = SessionState::Ready;
                inner.weather = Some(data.clone());
                FetchOutcome::Ready(data)
            }
            Err(err) => {
                warn!(error = %err, "Weather fetch failed");
                let failure = SessionFailure::from(&err);
                inner.state = SessionState::Failed(failure.clone());
                FetchOutcome::Failed(failure)
            }
        }
    }
}
