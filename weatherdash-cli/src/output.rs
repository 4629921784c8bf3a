//! Plain-text rendering of dashboard data.

use std::fmt::Write;

use weatherdash_core::{
    CitySearchResult, FavoriteCity, RateLimitStatus, SessionFailure, TemperatureUnit,
    WeatherCondition, WeatherData, session::RefreshReport,
};

fn glyph(condition: WeatherCondition) -> &'static str {
    if condition.is_night() {
        return "☾";
    }
    match condition {
        WeatherCondition::Sunny => "☀",
        WeatherCondition::Rainy => "☂",
        WeatherCondition::Thunderstorm => "⚡",
        WeatherCondition::Snow => "❄",
        WeatherCondition::Mist => "≡",
        _ => "☁",
    }
}

pub fn dashboard(data: &WeatherData, unit: TemperatureUnit, is_favorite: bool) -> String {
    let c = &data.current;
    let mut out = String::new();

    let star = if is_favorite { " ★" } else { "" };
    let _ = writeln!(out, "{}, {}{}", c.location, c.country, star);
    let _ = writeln!(
        out,
        "  {} {}  {} (feels like {})",
        glyph(c.condition),
        unit.format(c.temperature),
        c.condition_text,
        unit.format(c.feels_like)
    );
    let _ = writeln!(
        out,
        "  Humidity {}%  Wind {} km/h  Pressure {} hPa  Visibility {} km",
        c.humidity, c.wind_speed, c.pressure, c.visibility
    );

    if !data.hourly.is_empty() {
        let _ = writeln!(out, "\nNext hours");
        for h in &data.hourly {
            let _ = writeln!(
                out,
                "  {}  {:>6}  {:>3}%  {}",
                h.time,
                unit.format(h.temperature),
                h.precip_chance,
                h.condition_text
            );
        }
    }

    if !data.daily.is_empty() {
        let _ = writeln!(out, "\nForecast");
        for d in &data.daily {
            let _ = writeln!(
                out,
                "  {:<5}  {:>6} / {:<6}  {:>3}%  {}",
                d.day_name,
                unit.format(d.temp_max),
                unit.format(d.temp_min),
                d.precip_chance,
                d.condition_text
            );
        }
    }

    out
}

pub fn failure(failure: &SessionFailure) -> String {
    match &failure.fallback_city {
        Some(city) => format!("{}\nTry instead: weatherdash show \"{city}\"", failure.message),
        None => failure.message.clone(),
    }
}

pub fn suggestions(cities: &[CitySearchResult]) -> String {
    if cities.is_empty() {
        return "No matching cities.".to_string();
    }

    let mut out = String::new();
    for city in cities {
        let _ = writeln!(out, "{}  ({:.2}, {:.2})", city.label(), city.lat, city.lon);
    }
    out
}

pub fn favorites(list: &[FavoriteCity], unit: TemperatureUnit) -> String {
    if list.is_empty() {
        return "No favorite cities yet.".to_string();
    }

    let mut out = String::new();
    for (idx, fav) in list.iter().enumerate() {
        let cached = match (fav.cached_temp, fav.cached_condition) {
            (Some(temp), Some(cond)) => format!("{}  {}", unit.format(temp), cond),
            (Some(temp), None) => unit.format(temp),
            _ => "-".to_string(),
        };
        let _ = writeln!(out, "{idx}. {}, {}  {cached}  [{}]", fav.name, fav.country, fav.id);
    }
    out
}

pub fn refresh_report(report: &RefreshReport) -> String {
    let mut out = format!("Refreshed {} favorite(s)\n", report.refreshed);
    for (city, failure) in &report.failed {
        let _ = writeln!(out, "  {}, {}: {}", city.name, city.country, failure.message);
    }
    out
}

pub fn quota(status: &RateLimitStatus, reset_in: &str) -> String {
    if status.is_limited {
        format!("Rate limit reached. Resets in {reset_in}.")
    } else {
        format!(
            "{} of {} calls remaining (window resets in {reset_in})",
            status.remaining, status.max_calls
        )
    }
}
