use serde::{Deserialize, Serialize};

/// Normalized lookup key for a free-text location name.
///
/// Locations are case-insensitive and surrounding whitespace is ignored, so
/// "Cape Town", "cape town " and "CAPE TOWN" share one cache record.
pub fn location_key(location: &str) -> String {
    location.trim().to_lowercase()
}

/// Temperature as shown in notifications, e.g. "18.0°C".
pub fn temperature_display(temperature_c: f64) -> String {
    format!("{:.1}°C", temperature_c)
}

/// Current weather conditions for a location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    pub location: String,
    pub temperature_c: f64,
    pub description: String,
    /// Relative humidity, 0-100
    pub humidity_pct: u8,
    pub wind_speed_kmh: f64,
    pub icon: String,
}

impl CurrentWeather {
    pub fn temperature_display(&self) -> String {
        temperature_display(self.temperature_c)
    }
}

/// Daily forecast entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    /// Abbreviated weekday, e.g. "Mon"
    pub day: String,
    /// Display date, e.g. "Mon, Jan 5"
    pub date: String,
    pub high_temp_c: f64,
    pub low_temp_c: f64,
    pub description: String,
    pub icon: String,
}

/// Current conditions plus the upcoming days, in calendar order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub location: String,
    pub current: CurrentWeather,
    pub days: Vec<ForecastDay>,
}

/// State published to result channel subscribers.
///
/// `error_message` is advisory text for the UI, not a structured error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultState {
    pub weather: Option<CurrentWeather>,
    pub forecast: Option<Forecast>,
    pub is_loading: bool,
    pub is_offline: bool,
    pub error_message: Option<String>,
}

impl ResultState {
    /// Loading state that keeps showing whatever was on screen before.
    pub fn loading_from(previous: &ResultState) -> Self {
        Self {
            weather: previous.weather.clone(),
            forecast: previous.forecast.clone(),
            is_loading: true,
            is_offline: previous.is_offline,
            error_message: None,
        }
    }

    /// `previous` with loading cleared, used when a fetch ends without a result.
    pub fn settled_from(previous: &ResultState, error_message: impl Into<String>) -> Self {
        Self {
            is_loading: false,
            error_message: Some(error_message.into()),
            ..previous.clone()
        }
    }

    pub fn has_data(&self) -> bool {
        self.weather.is_some()
    }
}
