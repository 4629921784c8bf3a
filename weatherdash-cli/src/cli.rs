use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use inquire::{Password, PasswordDisplayMode, Text};
use tracing::debug;

use weatherdash_core::{
    CitySearch, Config, FavoritesStore, FetchOutcome, FileStore, KeyValueStore,
    LocationPermission, Preferences, RateLimiter, TemperatureUnit, Theme, WeatherData,
    WeatherSession,
    clock::SystemClock,
    location::{PositionOptions, location_from_config},
    provider::provider_from_config,
    session::FavoriteToggle,
};

use crate::output;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weatherdash", version, about = "Weather dashboard for the terminal")]
pub struct Cli {
    /// Show debug logs on stderr.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeatherMap API key and default city.
    Configure,

    /// Show the dashboard for a city, or for explicit coordinates.
    Show {
        /// City name; the configured default city when omitted.
        city: Option<String>,

        #[arg(long, requires = "lon", conflicts_with = "city", allow_hyphen_values = true)]
        lat: Option<f64>,

        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,
    },

    /// Show the dashboard for the current position.
    Locate {
        /// Load the suggested fallback city when the position is unavailable.
        #[arg(long)]
        fallback: bool,
    },

    /// Suggest cities matching a partial name.
    Search { query: String },

    /// Manage favorite cities.
    #[command(subcommand)]
    Favorites(FavoritesCommand),

    /// Show or change the temperature unit; toggles when no unit is given.
    Unit { unit: Option<UnitArg> },

    /// Show or change the colour theme.
    Theme { theme: Option<ThemeArg> },

    /// Manage the remembered location permission.
    Permission {
        #[arg(value_enum)]
        action: PermissionAction,
    },

    /// Show remaining provider calls in the current window.
    Quota,
}

#[derive(Debug, Subcommand)]
pub enum FavoritesCommand {
    /// List favorites in display order.
    List,
    /// Fetch a city and save it as a favorite.
    Add { city: String },
    /// Remove a favorite by id.
    Remove { id: String },
    /// Move the favorite at position FROM to position TO.
    Move { from: usize, to: usize },
    /// Fetch a city and add it, or remove it if already saved.
    Toggle { city: String },
    /// Refresh the cached reading of every favorite.
    Refresh,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum UnitArg {
    Celsius,
    Fahrenheit,
}

impl From<UnitArg> for TemperatureUnit {
    fn from(arg: UnitArg) -> Self {
        match arg {
            UnitArg::Celsius => TemperatureUnit::Celsius,
            UnitArg::Fahrenheit => TemperatureUnit::Fahrenheit,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ThemeArg {
    Light,
    Dark,
}

impl From<ThemeArg> for Theme {
    fn from(arg: ThemeArg) -> Self {
        match arg {
            ThemeArg::Light => Theme::Light,
            ThemeArg::Dark => Theme::Dark,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PermissionAction {
    Show,
    Grant,
    Deny,
    Reset,
}

/// Loaded config plus the on-disk store shared by everything below.
struct App {
    config: Config,
    store: Arc<dyn KeyValueStore>,
}

impl App {
    fn open() -> Result<Self> {
        let config = Config::load()?;
        let store = FileStore::open_default()?;
        debug!(dir = %store.dir().display(), "Using data directory");
        Ok(Self { config, store: Arc::new(store) })
    }

    fn preferences(&self) -> Preferences {
        Preferences::new(self.store.clone())
    }

    fn rate_limiter(&self) -> RateLimiter {
        RateLimiter::new(self.store.clone(), Arc::new(SystemClock), self.config.rate_limit.policy())
    }

    fn session(&self) -> Result<WeatherSession> {
        let provider = provider_from_config(&self.config)?;
        let location = location_from_config(&self.config.location);

        let mut session = WeatherSession::new(Arc::new(provider), self.store.clone())
            .with_location(Arc::from(location))
            .with_position_options(PositionOptions::from(&self.config.location))
            .with_fallback_city(self.config.default_city.clone());

        if self.config.rate_limit.enabled {
            session = session.with_call_policy(Arc::new(self.rate_limiter()));
        }
        Ok(session)
    }
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { city, lat, lon } => {
                let app = App::open()?;
                let session = app.session()?;
                let outcome = match (lat, lon) {
                    (Some(lat), Some(lon)) => session.fetch_by_coordinates(lat, lon).await,
                    _ => {
                        let city = city.unwrap_or_else(|| app.config.default_city.clone());
                        session.fetch_by_name(&city).await
                    }
                };
                print_outcome(&session, outcome)
            }
            Command::Locate { fallback } => {
                let app = App::open()?;
                let session = app.session()?;
                let outcome = session.fetch_by_geolocation().await;

                let outcome = match outcome {
                    FetchOutcome::Failed(failure) if fallback => match failure.fallback_city.clone() {
                        Some(city) => {
                            eprintln!("{}", failure.message);
                            session.fetch_by_name(&city).await
                        }
                        None => FetchOutcome::Failed(failure),
                    },
                    other => other,
                };
                print_outcome(&session, outcome)
            }
            Command::Search { query } => search(&query).await,
            Command::Favorites(cmd) => favorites(cmd).await,
            Command::Unit { unit } => {
                let prefs = App::open()?.preferences();
                let unit =
                    unit.map(TemperatureUnit::from).unwrap_or_else(|| prefs.unit().toggled());
                prefs.set_unit(unit);
                println!("Temperature unit: {unit}");
                Ok(())
            }
            Command::Theme { theme } => {
                let prefs = App::open()?.preferences();
                if let Some(theme) = theme {
                    prefs.set_theme(theme.into());
                }
                println!("Theme: {}", prefs.theme());
                Ok(())
            }
            Command::Permission { action } => {
                let prefs = App::open()?.preferences();
                match action {
                    PermissionAction::Show => {}
                    PermissionAction::Grant => {
                        prefs.set_location_permission(LocationPermission::Granted)
                    }
                    PermissionAction::Deny => {
                        prefs.set_location_permission(LocationPermission::Denied)
                    }
                    PermissionAction::Reset => prefs.reset_location_permission(),
                }
                match prefs.location_permission() {
                    Some(LocationPermission::Granted) => println!("Location permission: granted"),
                    Some(LocationPermission::Denied) => println!("Location permission: denied"),
                    None => println!("Location permission: not decided"),
                }
                Ok(())
            }
            Command::Quota => {
                let app = App::open()?;
                if !app.config.rate_limit.enabled {
                    println!("Rate limiting is disabled; enable it under [rate_limit] in the config.");
                    return Ok(());
                }
                let limiter = app.rate_limiter();
                println!("{}", output::quota(&limiter.status(), &limiter.reset_time_remaining()));
                Ok(())
            }
        }
    }
}

fn configure() -> Result<()> {
    let mut config = Config::load()?;

    let api_key = Password::new("OpenWeatherMap API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Reading API key")?;
    if api_key.trim().is_empty() {
        bail!("API key must not be empty");
    }
    config.set_api_key(api_key);

    let city = Text::new("Default city:")
        .with_default(&config.default_city)
        .prompt()
        .context("Reading default city")?;
    if !city.trim().is_empty() {
        config.default_city = city.trim().to_string();
    }

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn search(query: &str) -> Result<()> {
    let app = App::open()?;
    let provider = provider_from_config(&app.config)?;
    let search = CitySearch::new(Arc::new(provider), app.config.search_debounce());
    let mut updates = search.subscribe();

    search.search(query);

    let wait = app.config.search_debounce() + app.config.request_timeout() + Duration::from_secs(1);
    tokio::time::timeout(wait, updates.changed())
        .await
        .context("City search timed out")?
        .context("City search was cancelled")?;

    let cities = updates.borrow_and_update().clone();
    print!("{}", output::suggestions(&cities));
    Ok(())
}

async fn favorites(cmd: FavoritesCommand) -> Result<()> {
    let app = App::open()?;
    let unit = app.preferences().unit();

    match cmd {
        FavoritesCommand::List => {
            let favorites = FavoritesStore::load(app.store.clone());
            print!("{}", output::favorites(favorites.list(), unit));
        }
        FavoritesCommand::Remove { id } => {
            let mut favorites = FavoritesStore::load(app.store.clone());
            match favorites.remove(&id) {
                Some(fav) => println!("Removed {}, {}", fav.name, fav.country),
                None => bail!("No favorite with id {id}"),
            }
        }
        FavoritesCommand::Move { from, to } => {
            let mut favorites = FavoritesStore::load(app.store.clone());
            favorites.move_item(from, to)?;
            print!("{}", output::favorites(favorites.list(), unit));
        }
        FavoritesCommand::Add { city } => {
            let session = app.session()?;
            let outcome = session.fetch_by_name(&city).await;
            let data = ready_or_bail(outcome)?;
            if session.favorites().is_favorite(&data.current.location, &data.current.country) {
                let c = &data.current;
                println!("{}, {} is already a favorite", c.location, c.country);
            } else {
                report_toggle(session.toggle_favorite());
            }
        }
        FavoritesCommand::Toggle { city } => {
            let session = app.session()?;
            ready_or_bail(session.fetch_by_name(&city).await)?;
            report_toggle(session.toggle_favorite());
        }
        FavoritesCommand::Refresh => {
            let session = app.session()?;
            let report = session.refresh_favorites().await;
            print!("{}", output::refresh_report(&report));
            print!("{}", output::favorites(session.favorites().list(), unit));
        }
    }
    Ok(())
}

fn ready_or_bail(outcome: FetchOutcome) -> Result<WeatherData> {
    match outcome {
        FetchOutcome::Ready(data) => Ok(data),
        FetchOutcome::Failed(failure) => bail!(output::failure(&failure)),
        FetchOutcome::Stale => bail!("Fetch was superseded"),
    }
}

fn report_toggle(toggle: Option<FavoriteToggle>) {
    match toggle {
        Some(FavoriteToggle::Added(fav)) => {
            println!("Added {}, {} [{}]", fav.name, fav.country, fav.id)
        }
        Some(FavoriteToggle::Removed(fav)) => println!("Removed {}, {}", fav.name, fav.country),
        None => println!("Nothing on screen to toggle"),
    }
}

fn print_outcome(session: &WeatherSession, outcome: FetchOutcome) -> Result<()> {
    let data = ready_or_bail(outcome)?;
    let unit = session.preferences().unit();
    let is_favorite =
        session.favorites().is_favorite(&data.current.location, &data.current.country);
    print!("{}", output::dashboard(&data, unit, is_favorite));
    Ok(())
}
