//! Background refresh scheduler tests.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use saweather_core::{MemorySessionStore, SessionStore};
use saweather_weather::{
    CurrentWeather, Forecast, FreshnessCoordinator, LogNotifier, MemoryWeatherCache,
    MockWeatherSource, RefreshScheduler, WeatherError, WeatherSource,
};

#[derive(Default)]
struct CountingSource {
    inner: MockWeatherSource,
    calls: AtomicUsize,
}

#[async_trait]
impl WeatherSource for CountingSource {
    fn name(&self) -> &str {
        "counting"
    }

    async fn fetch_current(&self, location: &str) -> Result<CurrentWeather, WeatherError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_current(location).await
    }

    async fn fetch_forecast(&self, location: &str) -> Result<Forecast, WeatherError> {
        self.inner.fetch_forecast(location).await
    }

    fn default_profile(&self, location: &str) -> Forecast {
        self.inner.default_profile(location)
    }
}

fn coordinator(
    source: Arc<CountingSource>,
    session: Arc<MemorySessionStore>,
) -> Arc<FreshnessCoordinator> {
    Arc::new(FreshnessCoordinator::new(
        source,
        Arc::new(MemoryWeatherCache::new()),
        Arc::new(LogNotifier::new(false)),
        session,
    ))
}

#[tokio::test]
async fn test_scheduler_refreshes_stale_location_once() {
    let source = Arc::new(CountingSource::default());
    let session = Arc::new(MemorySessionStore::signed_in(
        "thabo@example.com",
        "Thabo",
        "Pretoria",
    ));
    let coordinator = coordinator(source.clone(), session);

    let scheduler = RefreshScheduler::spawn(coordinator.clone(), Duration::from_millis(40));
    tokio::time::sleep(Duration::from_millis(200)).await;
    scheduler.shutdown().await;

    // First tick fetches; later ticks find fresh data
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    let latest = coordinator.latest("Pretoria");
    assert_eq!(latest.weather.map(|w| w.temperature_c), Some(24.0));
    assert!(!latest.is_loading);
}

#[tokio::test]
async fn test_scheduler_idle_when_signed_out() {
    let source = Arc::new(CountingSource::default());
    let session = Arc::new(MemorySessionStore::signed_in(
        "thabo@example.com",
        "Thabo",
        "Pretoria",
    ));
    session.logout().unwrap();
    let coordinator = coordinator(source.clone(), session);

    let scheduler = RefreshScheduler::spawn(coordinator, Duration::from_millis(40));
    tokio::time::sleep(Duration::from_millis(150)).await;
    scheduler.shutdown().await;

    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_zero_interval_is_clamped() {
    let source = Arc::new(CountingSource::default());
    let session = Arc::new(MemorySessionStore::signed_in(
        "thabo@example.com",
        "Thabo",
        "Durban",
    ));
    let coordinator = coordinator(source.clone(), session);

    let scheduler = RefreshScheduler::spawn(coordinator.clone(), Duration::ZERO);
    tokio::time::sleep(Duration::from_millis(100)).await;
    scheduler.shutdown().await;

    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    assert!(!coordinator.latest("Durban").is_loading);
}
