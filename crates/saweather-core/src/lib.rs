pub mod config;
pub mod error;
pub mod session;

pub use config::{
    CacheConfig, Config, NotificationConfig, SessionConfig, ValidationResult, WeatherConfig,
};
pub use error::{AppError, ConfigError, SessionError};
pub use session::{FileSessionStore, MemorySessionStore, Session, SessionStore, DEFAULT_LOCATION};

use anyhow::Result;

/// Initialize logging for the application
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    tracing::info!("SAWeather core initialized");
    Ok(())
}
