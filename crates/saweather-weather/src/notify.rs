//! Local notifications about weather changes.
//!
//! The coordinator reports through [`NotificationSink`] and ignores any
//! failure it returns; a broken sink never changes the published result.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::WeatherError;

pub const WELCOME_ID: i32 = 1001;
pub const LOCATION_CHANGED_ID: i32 = 1002;
pub const WEATHER_UPDATED_ID: i32 = 1003;

/// A rendered notification, ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: i32,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn welcome(username: Option<&str>) -> Self {
        let name = username.filter(|n| !n.trim().is_empty()).unwrap_or("User");
        Self {
            id: WELCOME_ID,
            title: "Welcome to SAWeather!".to_string(),
            message: format!("Hello {}! Getting your weather data...", name),
        }
    }

    pub fn location_changed(old: &str, new: &str) -> Self {
        Self {
            id: LOCATION_CHANGED_ID,
            title: "Location Updated".to_string(),
            message: format!("Weather location changed from {} to {}", old, new),
        }
    }

    pub fn weather_updated(location: &str, temperature_display: &str) -> Self {
        Self {
            id: WEATHER_UPDATED_ID,
            title: "Weather Updated".to_string(),
            message: format!("Current weather in {}: {}", location, temperature_display),
        }
    }
}

/// Receiver of weather events worth telling the user about.
///
/// Implementors only need [`deliver`](NotificationSink::deliver); the event
/// methods render the standard notification text.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, notification: Notification) -> Result<(), WeatherError>;

    fn on_weather_updated(
        &self,
        location: &str,
        temperature_display: &str,
    ) -> Result<(), WeatherError> {
        self.deliver(Notification::weather_updated(location, temperature_display))
    }

    fn on_location_changed(&self, old: &str, new: &str) -> Result<(), WeatherError> {
        self.deliver(Notification::location_changed(old, new))
    }

    fn on_welcome(&self, username: Option<&str>) -> Result<(), WeatherError> {
        self.deliver(Notification::welcome(username))
    }
}

/// Writes notifications to the log. Respects the user's notification setting.
#[derive(Debug)]
pub struct LogNotifier {
    enabled: AtomicBool,
}

impl LogNotifier {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new(true)
    }
}

impl NotificationSink for LogNotifier {
    fn deliver(&self, notification: Notification) -> Result<(), WeatherError> {
        if !self.is_enabled() {
            tracing::debug!("Notifications disabled, dropping: {}", notification.title);
            return Ok(());
        }
        tracing::info!(
            id = notification.id,
            "{}: {}",
            notification.title,
            notification.message
        );
        Ok(())
    }
}
