use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    pub config_dir: PathBuf,

    /// Weather fetch and freshness settings
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Offline cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Local notification preferences
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Session defaults
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Cached data older than this is considered stale
    #[serde(default = "default_stale_after_minutes")]
    pub stale_after_minutes: u32,

    /// Number of forecast days produced per location
    #[serde(default = "default_forecast_days")]
    pub forecast_days: u32,

    /// Upper bound on a single data source call
    #[serde(default = "default_source_timeout_secs")]
    pub source_timeout_secs: u64,

    /// Background refresh interval in minutes (0 disables it)
    #[serde(default = "default_refresh_minutes")]
    pub refresh_minutes: u32,
}

fn default_stale_after_minutes() -> u32 {
    60
}

fn default_forecast_days() -> u32 {
    5
}

fn default_source_timeout_secs() -> u64 {
    10
}

fn default_refresh_minutes() -> u32 {
    15
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            stale_after_minutes: default_stale_after_minutes(),
            forecast_days: default_forecast_days(),
            source_timeout_secs: default_source_timeout_secs(),
            refresh_minutes: default_refresh_minutes(),
        }
    }
}

impl WeatherConfig {
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(u64::from(self.stale_after_minutes) * 60)
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }

    /// `None` when background refresh is disabled.
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_minutes > 0).then(|| Duration::from_secs(u64::from(self.refresh_minutes) * 60))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// SQLite database path. Defaults to `<config_dir>/weather_cache.db`.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub enabled: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Location used until the user picks one
    #[serde(default = "default_location")]
    pub default_location: String,
}

fn default_location() -> String {
    "Johannesburg".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_location: default_location(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("saweather");

        Self {
            config_dir,
            weather: WeatherConfig::default(),
            cache: CacheConfig::default(),
            notifications: NotificationConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path()?)
    }

    /// Load configuration from an explicit path, writing defaults if missing
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.weather.forecast_days == 0 {
            result.add_error("weather.forecast_days", "Forecast must cover at least one day");
        } else if self.weather.forecast_days > 16 {
            result.add_warning(
                "weather.forecast_days",
                "Forecast longer than 16 days is unusual",
            );
        }

        if self.weather.source_timeout_secs == 0 {
            result.add_error(
                "weather.source_timeout_secs",
                "Source timeout must be greater than 0",
            );
        }

        if self.weather.stale_after_minutes == 0 {
            result.add_warning(
                "weather.stale_after_minutes",
                "Every cached record will be treated as stale",
            );
        }

        if self.weather.refresh_minutes == 0 {
            result.add_warning(
                "weather.refresh_minutes",
                "Background refresh disabled (0 minutes)",
            );
        } else if self.weather.refresh_minutes > 1440 {
            result.add_warning(
                "weather.refresh_minutes",
                "Background refresh interval is more than 24 hours",
            );
        }

        if self.session.default_location.trim().is_empty() {
            result.add_error("session.default_location", "Default location cannot be empty");
        }

        if let Some(path) = &self.cache.path {
            if path.is_dir() {
                result.add_error(
                    "cache.path",
                    format!("Path is a directory: {}", path.display()),
                );
            }
        }

        result
    }

    /// Effective path of the SQLite weather cache
    pub fn cache_path(&self) -> PathBuf {
        self.cache
            .path
            .clone()
            .unwrap_or_else(|| self.config_dir.join("weather_cache.db"))
    }

    /// Path of the persisted session file
    pub fn session_path(&self) -> PathBuf {
        self.config_dir.join("session.json")
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(Self::config_path()?)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("saweather");

        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
    }

    #[test]
    fn test_default_weather_settings() {
        let weather = WeatherConfig::default();
        assert_eq!(weather.stale_after(), Duration::from_secs(3600));
        assert_eq!(weather.forecast_days, 5);
        assert_eq!(weather.source_timeout(), Duration::from_secs(10));
        assert_eq!(weather.refresh_interval(), Some(Duration::from_secs(900)));
    }

    #[test]
    fn test_zero_refresh_disables_scheduler() {
        let mut config = Config::default();
        config.weather.refresh_minutes = 0;
        assert!(config.weather.refresh_interval().is_none());
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "weather.refresh_minutes"));
    }

    #[test]
    fn test_zero_forecast_days_is_error() {
        let mut config = Config::default();
        config.weather.forecast_days = 0;
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "weather.forecast_days"));
    }

    #[test]
    fn test_zero_timeout_is_error() {
        let mut config = Config::default();
        config.weather.source_timeout_secs = 0;
        assert!(!config.validate().is_valid());
    }

    #[test]
    fn test_empty_default_location_is_error() {
        let mut config = Config::default();
        config.session.default_location = "   ".to_string();
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "session.default_location"));
    }

    #[test]
    fn test_cache_path_defaults_to_config_dir() {
        let mut config = Config::default();
        config.config_dir = PathBuf::from("/tmp/saweather-test");
        assert_eq!(
            config.cache_path(),
            PathBuf::from("/tmp/saweather-test/weather_cache.db")
        );

        config.cache.path = Some(PathBuf::from("/var/cache/w.db"));
        assert_eq!(config.cache_path(), PathBuf::from("/var/cache/w.db"));
    }

    #[test]
    fn test_load_from_creates_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.session.default_location, "Johannesburg");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.weather.stale_after_minutes = 30;
        config.notifications.enabled = false;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.weather.stale_after_minutes, 30);
        assert!(!loaded.notifications.enabled);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "config_dir = \"/tmp/sa\"\n").unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.weather.forecast_days, 5);
        assert!(loaded.notifications.enabled);
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }
}
