//! Platform location capability.
//!
//! Desktop hosts rarely expose a positioning service, so the stock
//! implementations are a fixed, user-configured position and an
//! always-unavailable one. Anything else can plug in through
//! [`LocationProvider`].

use async_trait::async_trait;
use std::{fmt::Debug, time::Duration};
use tracing::debug;

use crate::{config::LocationConfig, error::LocationError, model::Coordinates};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub timeout: Duration,
    pub high_accuracy: bool,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(10), high_accuracy: true }
    }
}

impl From<&LocationConfig> for PositionOptions {
    fn from(cfg: &LocationConfig) -> Self {
        Self { timeout: Duration::from_secs(cfg.timeout_secs), high_accuracy: cfg.high_accuracy }
    }
}

#[async_trait]
pub trait LocationProvider: Send + Sync + Debug {
    async fn current_position(
        &self,
        options: &PositionOptions,
    ) -> Result<Coordinates, LocationError>;
}

/// Requests a position, bounded by `options.timeout`.
pub async fn locate(
    provider: &dyn LocationProvider,
    options: &PositionOptions,
) -> Result<Coordinates, LocationError> {
    debug!(timeout = ?options.timeout, high_accuracy = options.high_accuracy, "Requesting position");
    tokio::time::timeout(options.timeout, provider.current_position(options))
        .await
        .map_err(|_| LocationError::Timeout)?
}

#[derive(Debug, Clone, Copy)]
pub struct FixedLocation {
    coords: Coordinates,
}

impl FixedLocation {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { coords: Coordinates { lat, lon } }
    }
}

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn current_position(
        &self,
        _options: &PositionOptions,
    ) -> Result<Coordinates, LocationError> {
        Ok(self.coords)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocation;

#[async_trait]
impl LocationProvider for NoLocation {
    async fn current_position(
        &self,
        _options: &PositionOptions,
    ) -> Result<Coordinates, LocationError> {
        Err(LocationError::Unavailable)
    }
}

pub fn location_from_config(cfg: &LocationConfig) -> Box<dyn LocationProvider> {
    match (cfg.lat, cfg.lon) {
        (Some(lat), Some(lon)) => Box::new(FixedLocation::new(lat, lon)),
        _ => Box::new(NoLocation),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct NeverAnswers;

    #[async_trait]
    impl LocationProvider for NeverAnswers {
        async fn current_position(
            &self,
            _options: &PositionOptions,
        ) -> Result<Coordinates, LocationError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn locate_times_out() {
        let err = locate(&NeverAnswers, &PositionOptions::default()).await.unwrap_err();
        assert_eq!(err, LocationError::Timeout);
    }

    #[tokio::test]
    async fn fixed_location_answers_immediately() {
        let coords = locate(&FixedLocation::new(1.5, 2.5), &PositionOptions::default())
            .await
            .unwrap();
        assert_eq!(coords, Coordinates { lat: 1.5, lon: 2.5 });
    }

    #[tokio::test]
    async fn config_without_coordinates_is_unavailable() {
        let provider = location_from_config(&LocationConfig::default());
        let err = locate(provider.as_ref(), &PositionOptions::default()).await.unwrap_err();
        assert_eq!(err, LocationError::Unavailable);
    }

    #[test]
    fn options_follow_config() {
        let cfg = LocationConfig { timeout_secs: 3, high_accuracy: false, ..Default::default() };
        let opts = PositionOptions::from(&cfg);
        assert_eq!(opts.timeout, Duration::from_secs(3));
        assert!(!opts.high_accuracy);
    }
}
