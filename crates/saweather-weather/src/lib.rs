//! Offline-first weather data for SAWeather.
//!
//! Fetches current weather and forecasts from a pluggable source, keeps an
//! offline copy in SQLite, and publishes results on per-location
//! latest-value channels.

pub mod cache;
pub mod channel;
pub mod coordinator;
pub mod error;
pub mod notify;
pub mod scheduler;
pub mod source;
pub mod types;

pub use cache::{MemoryWeatherCache, SqliteWeatherCache, WeatherStore};
pub use channel::{ResultChannel, Subscription};
pub use coordinator::{
    is_stale_at, CoordinatorSettings, FetchOutcome, FreshnessCoordinator, DEMO_MESSAGE,
    OFFLINE_MESSAGE,
};
pub use error::WeatherError;
pub use notify::{LogNotifier, Notification, NotificationSink};
pub use scheduler::{RefreshScheduler, MIN_REFRESH_INTERVAL};
pub use source::{MockWeatherSource, WeatherSource, DEFAULT_FORECAST_DAYS};
pub use types::*;
