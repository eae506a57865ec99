use anyhow::Result;
use std::sync::Arc;

use saweather_core::{AppError, Config, ConfigError, FileSessionStore, SessionStore};
use saweather_weather::{
    CoordinatorSettings, FreshnessCoordinator, LogNotifier, MemoryWeatherCache,
    MockWeatherSource, RefreshScheduler, ResultState, SqliteWeatherCache, WeatherStore,
};

fn open_store(config: &Config) -> Arc<dyn WeatherStore> {
    let path = config.cache_path();
    match SqliteWeatherCache::open(&path) {
        Ok(cache) => Arc::new(cache),
        Err(e) => {
            tracing::warn!(
                "Weather cache unavailable at {}: {}; offline data will not persist",
                path.display(),
                e
            );
            Arc::new(MemoryWeatherCache::new())
        }
    }
}

fn print_state(state: &ResultState) {
    let Some(weather) = &state.weather else {
        println!("No weather data available");
        return;
    };

    println!(
        "{} {}  {}  {}",
        weather.icon,
        weather.location,
        weather.temperature_display(),
        weather.description
    );
    println!(
        "  Humidity {}%  Wind {:.0} km/h",
        weather.humidity_pct, weather.wind_speed_kmh
    );
    if let Some(message) = &state.error_message {
        println!("  ({})", message);
    }

    if let Some(forecast) = &state.forecast {
        for day in &forecast.days {
            println!(
                "  {:<12} {} {:>5.1}° / {:>5.1}°  {}",
                day.date, day.icon, day.high_temp_c, day.low_temp_c, day.description
            );
        }
    }
}

#[derive(Debug, Default, PartialEq)]
struct Args {
    watch: bool,
    logout: bool,
    /// `(email, name)` to sign in with
    login: Option<(String, String)>,
    location: Option<String>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--watch" => parsed.watch = true,
            "--logout" => parsed.logout = true,
            "--login" => {
                let (Some(email), Some(name)) = (args.next(), args.next()) else {
                    anyhow::bail!("Usage: saweather --login <email> <name> [location]");
                };
                parsed.login = Some((email, name));
            }
            _ => parsed.location = Some(arg),
        }
    }
    Ok(parsed)
}

/// Fetch for the signed-in user, switching location first when one is given.
/// `None` when nobody is signed in.
async fn fetch_for_session(
    coordinator: &FreshnessCoordinator,
    location: Option<&str>,
) -> Result<Option<ResultState>> {
    if !coordinator.is_active() {
        return Ok(None);
    }
    match location {
        Some(location) => Ok(Some(coordinator.change_location(location).await?)),
        None => Ok(coordinator.fetch_current_location().await),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    saweather_core::init()?;

    let args = parse_args(std::env::args().skip(1))?;

    let config = match Config::load_validated() {
        Ok((config, _)) => config,
        Err(e) => {
            let err = AppError::Config(ConfigError::Invalid(e.to_string()));
            eprintln!("{}", err.user_message());
            return Err(e);
        }
    };

    let session = Arc::new(FileSessionStore::open(
        config.session_path(),
        config.session.default_location.clone(),
    )?);
    let source = Arc::new(MockWeatherSource::new(config.weather.forecast_days as usize));
    let coordinator = Arc::new(
        FreshnessCoordinator::new(
            source,
            open_store(&config),
            Arc::new(LogNotifier::new(config.notifications.enabled)),
            session.clone(),
        )
        .with_settings(CoordinatorSettings::from(&config.weather)),
    );

    tracing::info!("SAWeather started");

    if args.logout {
        coordinator.sign_out().await?;
        println!("Signed out; offline weather data cleared");
        return Ok(());
    }

    let mut location = args.location;
    if let Some((email, name)) = &args.login {
        let home = location.take().unwrap_or_else(|| session.current_location());
        session.save_user(email, name, &home)?;
    }

    let Some(state) = fetch_for_session(&coordinator, location.as_deref()).await? else {
        println!("Not signed in. Run: saweather --login <email> <name> [location]");
        return Ok(());
    };
    coordinator.welcome();
    print_state(&state);

    if args.watch {
        match config.weather.refresh_interval() {
            Some(interval) => {
                let scheduler = RefreshScheduler::spawn(coordinator.clone(), interval);
                tokio::signal::ctrl_c().await?;
                scheduler.shutdown().await;
            }
            None => tracing::warn!("Background refresh is disabled in the config"),
        }
    }

    tracing::info!("SAWeather shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use saweather_core::MemorySessionStore;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn coordinator(session: Arc<MemorySessionStore>) -> (FreshnessCoordinator, Arc<MemoryWeatherCache>) {
        let store = Arc::new(MemoryWeatherCache::new());
        let coordinator = FreshnessCoordinator::new(
            Arc::new(MockWeatherSource::default()),
            store.clone(),
            Arc::new(LogNotifier::new(false)),
            session,
        );
        (coordinator, store)
    }

    #[test]
    fn test_parse_login_and_location() {
        let parsed = parse_args(args(&["--login", "a@b.c", "Ayanda", "Durban", "--watch"])).unwrap();
        assert_eq!(
            parsed,
            Args {
                watch: true,
                logout: false,
                login: Some(("a@b.c".to_string(), "Ayanda".to_string())),
                location: Some("Durban".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_login_requires_name() {
        assert!(parse_args(args(&["--login", "a@b.c"])).is_err());
    }

    #[tokio::test]
    async fn test_signed_out_does_not_fetch() {
        let (coordinator, store) = coordinator(Arc::new(MemorySessionStore::default()));

        let state = fetch_for_session(&coordinator, Some("Durban")).await.unwrap();

        assert!(state.is_none());
        assert!(store.last_updated("Durban").unwrap().is_none());
        assert!(store.last_updated("Johannesburg").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_signed_in_fetch_switches_location() {
        let session = Arc::new(MemorySessionStore::signed_in("a@b.c", "Ayanda", "Pretoria"));
        let (coordinator, store) = coordinator(session.clone());

        let state = fetch_for_session(&coordinator, Some("Durban")).await.unwrap().unwrap();

        assert_eq!(state.weather.unwrap().location, "Durban");
        assert_eq!(session.current_location(), "Durban");
        assert!(store.get_current("Durban").unwrap().is_some());
    }
}
