//! Weather data sources.
//!
//! The coordinator only talks to [`WeatherSource`]. The bundled
//! [`MockWeatherSource`] serves a fixed per-city profile table and a
//! generated forecast, so the app works without any weather API.

use async_trait::async_trait;
use chrono::{Days, Local, NaiveDate};

use crate::error::WeatherError;
use crate::types::{location_key, CurrentWeather, Forecast, ForecastDay};

pub const DEFAULT_FORECAST_DAYS: usize = 5;

/// Supplier of current weather and forecasts for a named location.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Human-readable name for logs
    fn name(&self) -> &str;

    async fn fetch_current(&self, location: &str) -> Result<CurrentWeather, WeatherError>;

    async fn fetch_forecast(&self, location: &str) -> Result<Forecast, WeatherError>;

    /// Last-resort forecast used when neither the source nor the cache has data.
    ///
    /// Must not touch the network and must always succeed.
    fn default_profile(&self, location: &str) -> Forecast;
}

struct CityProfile {
    key: &'static str,
    name: &'static str,
    temperature_c: f64,
    description: &'static str,
    humidity_pct: u8,
    wind_speed_kmh: f64,
    icon: &'static str,
}

const SUNNY: (&str, &str) = ("Sunny", "☀️");
const CLOUDY: (&str, &str) = ("Cloudy", "☁️");
const PARTLY_CLOUDY: (&str, &str) = ("Partly Cloudy", "⛅");
const RAINY: (&str, &str) = ("Rainy", "🌧️");
const SHOWERS: (&str, &str) = ("Showers", "🌧️");
const WINDY: (&str, &str) = ("Windy", "💨");

const CITIES: &[CityProfile] = &[
    CityProfile {
        key: "johannesburg",
        name: "Johannesburg",
        temperature_c: 22.0,
        description: "Sunny",
        humidity_pct: 45,
        wind_speed_kmh: 15.0,
        icon: "☀️",
    },
    CityProfile {
        key: "cape town",
        name: "Cape Town",
        temperature_c: 18.0,
        description: "Cloudy",
        humidity_pct: 65,
        wind_speed_kmh: 25.0,
        icon: "☁️",
    },
    CityProfile {
        key: "durban",
        name: "Durban",
        temperature_c: 26.0,
        description: "Partly Cloudy",
        humidity_pct: 75,
        wind_speed_kmh: 12.0,
        icon: "⛅",
    },
    CityProfile {
        key: "pretoria",
        name: "Pretoria",
        temperature_c: 24.0,
        description: "Clear",
        humidity_pct: 50,
        wind_speed_kmh: 10.0,
        icon: "☀️",
    },
    CityProfile {
        key: "port elizabeth",
        name: "Port Elizabeth",
        temperature_c: 20.0,
        description: "Windy",
        humidity_pct: 60,
        wind_speed_kmh: 30.0,
        icon: "💨",
    },
    CityProfile {
        key: "bloemfontein",
        name: "Bloemfontein",
        temperature_c: 19.0,
        description: "Sunny",
        humidity_pct: 40,
        wind_speed_kmh: 18.0,
        icon: "☀️",
    },
];

/// Exact key match first, then any known city contained in the query
/// (e.g. "Durban, KZN").
fn find_city(location: &str) -> Option<&'static CityProfile> {
    let key = location_key(location);
    if key.is_empty() {
        return None;
    }
    CITIES
        .iter()
        .find(|c| c.key == key)
        .or_else(|| CITIES.iter().find(|c| key.contains(c.key)))
}

fn weather_pattern(city_key: Option<&str>) -> [(&'static str, &'static str); 5] {
    match city_key {
        Some("cape town") => [CLOUDY, RAINY, PARTLY_CLOUDY, WINDY, SUNNY],
        Some("durban") => [PARTLY_CLOUDY, SUNNY, SHOWERS, SUNNY, PARTLY_CLOUDY],
        _ => [SUNNY, PARTLY_CLOUDY, SUNNY, CLOUDY, PARTLY_CLOUDY],
    }
}

/// Deterministic weather generator backed by a fixed table of South African cities.
///
/// Unknown locations get a generic "Clear, 20°C" profile under their own name.
#[derive(Debug, Clone)]
pub struct MockWeatherSource {
    forecast_days: usize,
    start_date: Option<NaiveDate>,
}

impl MockWeatherSource {
    pub fn new(forecast_days: usize) -> Self {
        Self {
            forecast_days,
            start_date: None,
        }
    }

    /// Pin "today" so generated dates are reproducible.
    pub fn with_start_date(mut self, date: NaiveDate) -> Self {
        self.start_date = Some(date);
        self
    }

    pub fn current_for(&self, location: &str) -> CurrentWeather {
        match find_city(location) {
            Some(city) => CurrentWeather {
                location: city.name.to_string(),
                temperature_c: city.temperature_c,
                description: city.description.to_string(),
                humidity_pct: city.humidity_pct,
                wind_speed_kmh: city.wind_speed_kmh,
                icon: city.icon.to_string(),
            },
            None => CurrentWeather {
                location: location.trim().to_string(),
                temperature_c: 20.0,
                description: "Clear".to_string(),
                humidity_pct: 50,
                wind_speed_kmh: 10.0,
                icon: "☀️".to_string(),
            },
        }
    }

    pub fn forecast_for(&self, location: &str) -> Forecast {
        let current = self.current_for(location);
        let city = find_city(location);
        let base = city.map_or(20.0, |c| c.temperature_c);
        let pattern = weather_pattern(city.map(|c| c.key));
        let today = self
            .start_date
            .unwrap_or_else(|| Local::now().date_naive());

        let days = (1..=self.forecast_days)
            .filter_map(|i| {
                let date = today.checked_add_days(Days::new(i as u64))?;
                let step = i as i64;
                // Small deterministic wobble so days differ without randomness
                let high = base + ((step - 3) * 2) as f64 + ((step * 3) % 4) as f64;
                let low = high - (5 + (step * 2) % 4) as f64;
                let (description, icon) = pattern[(i - 1) % pattern.len()];
                Some(ForecastDay {
                    day: date.format("%a").to_string(),
                    date: date.format("%a, %b %-d").to_string(),
                    high_temp_c: high,
                    low_temp_c: low,
                    description: description.to_string(),
                    icon: icon.to_string(),
                })
            })
            .collect();

        Forecast {
            location: current.location.clone(),
            current,
            days,
        }
    }
}

impl Default for MockWeatherSource {
    fn default() -> Self {
        Self::new(DEFAULT_FORECAST_DAYS)
    }
}

#[async_trait]
impl WeatherSource for MockWeatherSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_current(&self, location: &str) -> Result<CurrentWeather, WeatherError> {
        tracing::debug!("Generating mock weather for {}", location);
        Ok(self.current_for(location))
    }

    async fn fetch_forecast(&self, location: &str) -> Result<Forecast, WeatherError> {
        tracing::debug!("Generating mock forecast for {}", location);
        Ok(self.forecast_for(location))
    }

    fn default_profile(&self, location: &str) -> Forecast {
        self.forecast_for(location)
    }
}
