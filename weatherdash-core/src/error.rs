use thiserror::Error;

/// Why the platform location capability could not produce a position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location request timed out")]
    Timeout,
    #[error("Location service unavailable")]
    Unavailable,
    #[error("Location error: {0}")]
    Other(String),
}

/// Errors surfaced by sessions and provider adapters.
#[derive(Debug, Error)]
pub enum WeatherError {
    /// City or geocode lookup returned nothing.
    #[error("City not found. Please try again.")]
    NotFound,

    /// Location capability missing, denied or timed out.
    ///
    /// `fallback_city` is only a suggestion; nothing fetches it implicitly.
    #[error("Unable to get your location. Please enable location services.")]
    LocationUnavailable {
        reason: LocationError,
        fallback_city: Option<String>,
    },

    /// Provider answered with a non-2xx status or a payload we could not read.
    #[error("{0}")]
    Provider(String),

    #[error("Failed to reach the weather provider: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rate limit reached. Try again in {reset_in}.")]
    RateLimited { reset_in: String },

    #[error(
        "No OpenWeatherMap API key configured.\n\
         Hint: run `weatherdash configure` or set OPENWEATHERMAP_API_KEY."
    )]
    MissingApiKey,
}

impl WeatherError {
    pub(crate) fn provider(message: impl Into<String>) -> Self {
        WeatherError::Provider(message.into())
    }
}
