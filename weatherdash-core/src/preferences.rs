//! Display preferences and the remembered location-permission decision.

use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};

use crate::storage::{
    KeyValueStore, LOCATION_PERMISSION_KEY, THEME_KEY, UNIT_KEY, load_json, save_json,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    /// Converts a Celsius reading into this unit, rounded to whole degrees.
    pub fn convert(&self, celsius: i32) -> i32 {
        match self {
            TemperatureUnit::Celsius => celsius,
            TemperatureUnit::Fahrenheit => (f64::from(celsius) * 9.0 / 5.0 + 32.0).round() as i32,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            TemperatureUnit::Celsius => "°C",
            TemperatureUnit::Fahrenheit => "°F",
        }
    }

    pub fn format(&self, celsius: i32) -> String {
        format!("{}{}", self.convert(celsius), self.symbol())
    }

    pub fn toggled(&self) -> Self {
        match self {
            TemperatureUnit::Celsius => TemperatureUnit::Fahrenheit,
            TemperatureUnit::Fahrenheit => TemperatureUnit::Celsius,
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemperatureUnit::Celsius => f.write_str("celsius"),
            TemperatureUnit::Fahrenheit => f.write_str("fahrenheit"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Light => f.write_str("light"),
            Theme::Dark => f.write_str("dark"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationPermission {
    Granted,
    Denied,
}

/// Typed access to the preference keys. Missing or unreadable values fall
/// back to defaults (`celsius`, `light`, no permission decision).
#[derive(Debug, Clone)]
pub struct Preferences {
    store: Arc<dyn KeyValueStore>,
}

impl Preferences {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn unit(&self) -> TemperatureUnit {
        load_json(self.store.as_ref(), UNIT_KEY).unwrap_or_default()
    }

    pub fn set_unit(&self, unit: TemperatureUnit) {
        save_json(self.store.as_ref(), UNIT_KEY, &unit);
    }

    pub fn theme(&self) -> Theme {
        load_json(self.store.as_ref(), THEME_KEY).unwrap_or_default()
    }

    pub fn set_theme(&self, theme: Theme) {
        save_json(self.store.as_ref(), THEME_KEY, &theme);
    }

    pub fn location_permission(&self) -> Option<LocationPermission> {
        load_json(self.store.as_ref(), LOCATION_PERMISSION_KEY)
    }

    pub fn set_location_permission(&self, permission: LocationPermission) {
        save_json(self.store.as_ref(), LOCATION_PERMISSION_KEY, &permission);
    }

    /// Forgets the decision so the user is asked again.
    pub fn reset_location_permission(&self) {
        self.store.remove(LOCATION_PERMISSION_KEY);
    }
}
