//! Weather-specific error types.
//!
//! None of these ever escape a coordinator fetch; they are logged and turned
//! into a fallback result instead.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WeatherError {
    #[error("Weather source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Weather source timed out")]
    Timeout,

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("No weather data available for {0}")]
    NoDataAvailable(String),

    #[error("Notification failed: {0}")]
    SinkFailure(String),
}

impl WeatherError {
    pub fn source_unavailable(message: impl Into<String>) -> Self {
        Self::SourceUnavailable(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::StorageUnavailable(message.into())
    }

    /// User-friendly error message for UI display.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::SourceUnavailable(_) | Self::Timeout => {
                "Weather service unavailable. Showing offline data."
            }
            Self::StorageUnavailable(_) => "Offline weather data could not be accessed.",
            Self::NoDataAvailable(_) => "No weather data yet. Showing demo data.",
            Self::SinkFailure(_) => "Could not show a notification.",
        }
    }

    /// Whether the fetch should fall back to the offline cache.
    pub fn is_source_failure(&self) -> bool {
        matches!(self, Self::SourceUnavailable(_) | Self::Timeout)
    }

    /// Whether retrying the same operation later may succeed.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::NoDataAvailable(_))
    }
}

impl From<rusqlite::Error> for WeatherError {
    fn from(e: rusqlite::Error) -> Self {
        Self::StorageUnavailable(e.to_string())
    }
}

impl From<tokio::task::JoinError> for WeatherError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::StorageUnavailable(format!("storage task failed: {}", e))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn test_source_failures() {
        assert!(WeatherError::Timeout.is_source_failure());
        assert!(WeatherError::source_unavailable("offline").is_source_failure());
        assert!(!WeatherError::storage("disk full").is_source_failure());
    }

    #[test]
    fn test_recoverable() {
        assert!(WeatherError::storage("disk full").is_recoverable());
        assert!(WeatherError::Timeout.is_recoverable());
        assert!(!WeatherError::NoDataAvailable("Atlantis".into()).is_recoverable());
    }

    #[test]
    fn test_rusqlite_error_maps_to_storage() {
        let err: WeatherError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, WeatherError::StorageUnavailable(_)));
    }

    #[test]
    fn test_user_messages() {
        assert!(WeatherError::NoDataAvailable("Atlantis".into())
            .user_message()
            .contains("demo"));
        assert!(WeatherError::Timeout.user_message().contains("offline"));
    }
}
