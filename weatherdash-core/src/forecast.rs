//! Turns raw OpenWeatherMap payloads into the dashboard model.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike, Utc};

use crate::{
    model::{CurrentWeather, DailyForecast, HourlyForecast, WeatherCondition, WeatherData},
    provider::{
        WeatherPayload,
        openweather::{OwCurrentResponse, OwForecastEntry, OwForecastResponse, OwWeather},
    },
};

pub const HOURLY_SAMPLES: usize = 8;
pub const MAX_FORECAST_DAYS: usize = 5;

const MIDDAY_MINUTES: i64 = 12 * 60;
const MIDDAY_HOURS: std::ops::RangeInclusive<u32> = 11..=14;

pub fn build_weather_data(payload: &WeatherPayload, now: DateTime<Utc>) -> WeatherData {
    WeatherData {
        current: current_from(&payload.current),
        hourly: hourly_from(&payload.forecast),
        daily: daily_from(&payload.forecast, now),
    }
}

pub fn current_from(raw: &OwCurrentResponse) -> CurrentWeather {
    let (code, icon, text) = describe(raw.weather.first());
    let condition = WeatherCondition::from_provider(code, &icon);

    CurrentWeather {
        location: raw.name.clone(),
        country: raw.sys.country.clone().unwrap_or_default(),
        lat: raw.coord.lat,
        lon: raw.coord.lon,
        temperature: round(raw.main.temp),
        feels_like: round(raw.main.feels_like),
        condition,
        condition_text: text,
        humidity: raw.main.humidity,
        wind_speed: round(raw.wind.speed * 3.6),
        pressure: raw.main.pressure.round().max(0.0) as u32,
        visibility: raw.visibility.unwrap_or(0) / 1000,
        // The 2.5 endpoints carry no UV data.
        uv_index: 0,
        is_day: !icon.ends_with('n'),
        icon,
    }
}

pub fn hourly_from(forecast: &OwForecastResponse) -> Vec<HourlyForecast> {
    forecast
        .list
        .iter()
        .take(HOURLY_SAMPLES)
        .map(|entry| {
            let (code, icon, text) = describe(entry.weather.first());
            HourlyForecast {
                time: local_time(entry.dt, forecast.city.timezone).format("%H:%M").to_string(),
                temperature: round(entry.main.temp),
                condition: WeatherCondition::from_provider(code, &icon),
                condition_text: text,
                precip_chance: percent(entry.pop),
                icon,
            }
        })
        .collect()
}

/// One three-hour sample in local time, stripped down to what daily
/// aggregation needs.
#[derive(Debug, Clone, PartialEq)]
pub struct DaySample {
    pub local: NaiveDateTime,
    pub temp: f64,
    pub pop: f64,
    pub code: u16,
    pub icon: String,
    pub description: String,
}

impl DaySample {
    fn from_entry(entry: &OwForecastEntry, tz_offset_secs: i32) -> Self {
        let (code, icon, description) = describe(entry.weather.first());
        Self {
            local: local_time(entry.dt, tz_offset_secs),
            temp: entry.main.temp,
            pop: entry.pop,
            code,
            icon,
            description,
        }
    }
}

pub fn daily_from(forecast: &OwForecastResponse, now: DateTime<Utc>) -> Vec<DailyForecast> {
    let tz = forecast.city.timezone;
    let today = local_time(now.timestamp(), tz).date();

    let samples: Vec<DaySample> =
        forecast.list.iter().map(|entry| DaySample::from_entry(entry, tz)).collect();

    group_by_date(&samples)
        .into_iter()
        .take(MAX_FORECAST_DAYS)
        .filter_map(|(date, day)| aggregate_day(date, &day, today))
        .collect()
}

/// Groups samples by local calendar date, keeping first-seen date order.
pub fn group_by_date(samples: &[DaySample]) -> Vec<(NaiveDate, Vec<&DaySample>)> {
    let mut days: Vec<(NaiveDate, Vec<&DaySample>)> = Vec::new();

    for sample in samples {
        let date = sample.local.date();
        match days.iter_mut().find(|(d, _)| *d == date) {
            Some((_, bucket)) => bucket.push(sample),
            None => days.push((date, vec![sample])),
        }
    }

    days
}

/// Collapses one day's samples. `None` only for an empty day.
pub fn aggregate_day(
    date: NaiveDate,
    samples: &[&DaySample],
    today: NaiveDate,
) -> Option<DailyForecast> {
    let representative = representative_sample(samples)?;

    let temp_max = samples.iter().map(|s| s.temp).fold(f64::NEG_INFINITY, f64::max);
    let temp_min = samples.iter().map(|s| s.temp).fold(f64::INFINITY, f64::min);
    let max_pop = samples.iter().map(|s| s.pop).fold(0.0, f64::max);

    let day_name = if date == today {
        "Today".to_string()
    } else {
        date.weekday().to_string()
    };

    Some(DailyForecast {
        date: date.format("%Y-%m-%d").to_string(),
        day_name,
        temp_max: round(temp_max),
        temp_min: round(temp_min),
        condition: WeatherCondition::from_provider(representative.code, &representative.icon),
        condition_text: representative.description.clone(),
        precip_chance: percent(max_pop),
        icon: representative.icon.clone(),
    })
}

/// The sample nearest local noon within 11:00–14:00, else the middle one.
fn representative_sample<'a>(samples: &[&'a DaySample]) -> Option<&'a DaySample> {
    let around_noon = samples
        .iter()
        .filter(|s| MIDDAY_HOURS.contains(&s.local.hour()))
        .min_by_key(|s| (minutes_of_day(&s.local) - MIDDAY_MINUTES).abs());

    around_noon.or_else(|| samples.get(samples.len() / 2)).copied()
}

fn minutes_of_day(t: &NaiveDateTime) -> i64 {
    i64::from(t.hour()) * 60 + i64::from(t.minute())
}

fn local_time(unix: i64, tz_offset_secs: i32) -> NaiveDateTime {
    DateTime::from_timestamp(unix + i64::from(tz_offset_secs), 0)
        .unwrap_or_default()
        .naive_utc()
}

fn describe(weather: Option<&OwWeather>) -> (u16, String, String) {
    match weather {
        Some(w) => (w.id, w.icon.clone(), title_case(&w.description)),
        None => (0, String::new(), "Unknown".to_string()),
    }
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn percent(probability: f64) -> u8 {
    (probability.clamp(0.0, 1.0) * 100.0).round() as u8
}

fn round(value: f64) -> i32 {
    value.round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(local: &str, temp: f64, pop: f64, code: u16, icon: &str) -> DaySample {
        DaySample {
            local: NaiveDateTime::parse_from_str(local, "%Y-%m-%d %H:%M").unwrap(),
            temp,
            pop,
            code,
            icon: icon.to_string(),
            description: format!("code {code}"),
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn three_samples_aggregate_to_max_min_and_peak_pop() {
        let samples = [
            sample("2024-06-03 09:00", 18.0, 0.1, 800, "01d"),
            sample("2024-06-03 12:00", 24.0, 0.4, 500, "10d"),
            sample("2024-06-03 15:00", 20.0, 0.2, 803, "04d"),
        ];
        let refs: Vec<&DaySample> = samples.iter().collect();

        let day = aggregate_day(date("2024-06-03"), &refs, date("2024-06-01")).unwrap();

        assert_eq!(day.temp_max, 24);
        assert_eq!(day.temp_min, 18);
        assert_eq!(day.precip_chance, 40);
        assert_eq!(day.condition, WeatherCondition::Rainy);
        assert_eq!(day.day_name, "Mon");
        assert_eq!(day.date, "2024-06-03");
    }

    #[test]
    fn representative_prefers_sample_nearest_noon() {
        let samples = [
            sample("2024-06-03 11:00", 10.0, 0.0, 800, "01d"),
            sample("2024-06-03 14:00", 10.0, 0.0, 600, "13d"),
            sample("2024-06-03 13:00", 10.0, 0.0, 211, "11d"),
        ];
        let refs: Vec<&DaySample> = samples.iter().collect();

        let day = aggregate_day(date("2024-06-03"), &refs, date("2024-06-03")).unwrap();
        assert_eq!(day.condition, WeatherCondition::Sunny);
        assert_eq!(day.day_name, "Today");
    }

    #[test]
    fn representative_falls_back_to_middle_sample() {
        let samples = [
            sample("2024-06-03 18:00", 10.0, 0.0, 800, "01n"),
            sample("2024-06-03 21:00", 10.0, 0.0, 741, "50n"),
            sample("2024-06-03 23:00", 10.0, 0.0, 600, "13n"),
        ];
        let refs: Vec<&DaySample> = samples.iter().collect();

        let day = aggregate_day(date("2024-06-03"), &refs, date("2024-06-01")).unwrap();
        assert_eq!(day.condition, WeatherCondition::Mist);
    }

    #[test]
    fn empty_day_yields_nothing() {
        assert!(aggregate_day(date("2024-06-03"), &[], date("2024-06-03")).is_none());
    }

    #[test]
    fn grouping_keeps_date_order() {
        let samples = [
            sample("2024-06-03 21:00", 1.0, 0.0, 800, "01n"),
            sample("2024-06-04 00:00", 2.0, 0.0, 800, "01n"),
            sample("2024-06-04 03:00", 3.0, 0.0, 800, "01n"),
            sample("2024-06-05 00:00", 4.0, 0.0, 800, "01n"),
        ];

        let groups = group_by_date(&samples);
        let shape: Vec<(String, usize)> =
            groups.iter().map(|(d, s)| (d.to_string(), s.len())).collect();
        assert_eq!(
            shape,
            [
                ("2024-06-03".to_string(), 1),
                ("2024-06-04".to_string(), 2),
                ("2024-06-05".to_string(), 1)
            ]
        );
    }

    fn payload() -> WeatherPayload {
        let current = serde_json::json!({
            "coord": { "lat": 48.85, "lon": 2.35 },
            "weather": [{ "id": 802, "main": "Clouds", "description": "scattered clouds", "icon": "03n" }],
            "main": { "temp": 17.6, "feels_like": 17.2, "pressure": 1016, "humidity": 72 },
            "visibility": 10000,
            "wind": { "speed": 4.1 },
            "dt": 1717365600,
            "sys": { "country": "FR" },
            "timezone": 7200,
            "name": "Paris"
        });

        // 2024-06-02 22:00 UTC onwards, three-hourly; local is UTC+2.
        let start = 1717365600_i64;
        let list: Vec<serde_json::Value> = (0..10)
            .map(|i| {
                serde_json::json!({
                    "dt": start + i * 3 * 3600,
                    "main": { "temp": 15.0 + i as f64, "feels_like": 15.0, "pressure": 1015, "humidity": 70 },
                    "weather": [{ "id": 800, "main": "Clear", "description": "clear sky", "icon": "01d" }],
                    "wind": { "speed": 3.0 },
                    "pop": 0.05 * i as f64
                })
            })
            .collect();

        let forecast = serde_json::json!({
            "list": list,
            "city": { "name": "Paris", "country": "FR", "coord": { "lat": 48.85, "lon": 2.35 }, "timezone": 7200 }
        });

        WeatherPayload {
            current: serde_json::from_value(current).unwrap(),
            forecast: serde_json::from_value(forecast).unwrap(),
        }
    }

    #[test]
    fn current_conditions_are_normalized() {
        let data = build_weather_data(&payload(), Utc.with_ymd_and_hms(2024, 6, 2, 22, 0, 0).unwrap());
        let current = &data.current;

        assert_eq!(current.location, "Paris");
        assert_eq!(current.country, "FR");
        assert_eq!(current.temperature, 18);
        assert_eq!(current.condition, WeatherCondition::NightCloudy);
        assert_eq!(current.condition_text, "Scattered Clouds");
        assert_eq!(current.wind_speed, 15);
        assert_eq!(current.visibility, 10);
        assert!(!current.is_day);
    }

    #[test]
    fn hourly_uses_local_clock_and_caps_samples() {
        let data = build_weather_data(&payload(), Utc.with_ymd_and_hms(2024, 6, 2, 22, 0, 0).unwrap());

        assert_eq!(data.hourly.len(), HOURLY_SAMPLES);
        assert_eq!(data.hourly[0].time, "00:00");
        assert_eq!(data.hourly[1].time, "03:00");
        assert_eq!(data.hourly[2].precip_chance, 10);
    }

    #[test]
    fn daily_groups_by_local_date() {
        // Local "today" is 2024-06-03 00:00 in Paris.
        let data = build_weather_data(&payload(), Utc.with_ymd_and_hms(2024, 6, 2, 22, 0, 0).unwrap());

        let dates: Vec<&str> = data.daily.iter().map(|d| d.date.as_str()).collect();
        assert_eq!(dates, ["2024-06-03", "2024-06-04"]);
        assert_eq!(data.daily[0].day_name, "Today");
        assert_eq!(data.daily[0].temp_min, 15);
        assert_eq!(data.daily[0].temp_max, 22);
        assert_eq!(data.daily[1].day_name, "Tue");
    }
}
