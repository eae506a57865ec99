//! Offline-first fetch coordination.
//!
//! [`FreshnessCoordinator::fetch`] always asks the source first, writes
//! successful results through to the cache, and falls back to cached data
//! and then to the source's default profile when the source fails. Every
//! call publishes a loading state before its first await and exactly one
//! settled state at the end, whichever branch was taken.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use saweather_core::{SessionError, SessionStore, WeatherConfig};

use crate::cache::WeatherStore;
use crate::channel::ResultChannel;
use crate::error::WeatherError;
use crate::notify::NotificationSink;
use crate::source::WeatherSource;
use crate::types::{location_key, CurrentWeather, Forecast, ForecastDay, ResultState};

pub const OFFLINE_MESSAGE: &str = "using offline data";
pub const DEMO_MESSAGE: &str = "using demo data";
const INTERRUPTED_MESSAGE: &str = "weather update was interrupted";

/// Humidity and wind assumed when current weather is rebuilt from a cached forecast day.
const DERIVED_HUMIDITY_PCT: u8 = 50;
const DERIVED_WIND_SPEED_KMH: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorSettings {
    /// Cached data older than this is stale
    pub stale_after: Duration,
    /// A source call taking longer than this counts as a failure
    pub source_timeout: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(60 * 60),
            source_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&WeatherConfig> for CoordinatorSettings {
    fn from(config: &WeatherConfig) -> Self {
        Self {
            stale_after: config.stale_after(),
            source_timeout: config.source_timeout(),
        }
    }
}

/// How a fetch was satisfied.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Straight from the source, already written to the cache.
    Fresh(Forecast),
    /// Source failed; served from the offline cache.
    Offline(Forecast),
    /// Source failed and nothing usable was cached.
    DefaultFallback(Forecast),
}

impl FetchOutcome {
    pub fn forecast(&self) -> &Forecast {
        match self {
            Self::Fresh(f) | Self::Offline(f) | Self::DefaultFallback(f) => f,
        }
    }

    pub fn current(&self) -> &CurrentWeather {
        &self.forecast().current
    }

    pub fn is_offline(&self) -> bool {
        !matches!(self, Self::Fresh(_))
    }

    pub fn error_message(&self) -> Option<&'static str> {
        match self {
            Self::Fresh(_) => None,
            Self::Offline(_) => Some(OFFLINE_MESSAGE),
            Self::DefaultFallback(_) => Some(DEMO_MESSAGE),
        }
    }

    pub fn into_state(self) -> ResultState {
        let is_offline = self.is_offline();
        let error_message = self.error_message().map(str::to_string);
        let forecast = match self {
            Self::Fresh(f) | Self::Offline(f) | Self::DefaultFallback(f) => f,
        };
        ResultState {
            weather: Some(forecast.current.clone()),
            forecast: Some(forecast),
            is_loading: false,
            is_offline,
            error_message,
        }
    }
}

/// True when nothing was cached or the cached data is older than `threshold`.
pub fn is_stale_at(
    last_updated: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    threshold: Duration,
) -> bool {
    match last_updated {
        None => true,
        // A timestamp in the future means the clock moved; treat as fresh
        Some(at) => (now - at)
            .to_std()
            .map(|age| age > threshold)
            .unwrap_or(false),
    }
}

/// Rebuild current conditions from the first cached forecast day.
fn current_from_day(location: &str, day: &ForecastDay) -> CurrentWeather {
    CurrentWeather {
        location: location.to_string(),
        temperature_c: (day.high_temp_c + day.low_temp_c) / 2.0,
        description: day.description.clone(),
        humidity_pct: DERIVED_HUMIDITY_PCT,
        wind_speed_kmh: DERIVED_WIND_SPEED_KMH,
        icon: day.icon.clone(),
    }
}

type FlightMap = Mutex<HashMap<String, (u64, watch::Receiver<Option<FetchOutcome>>)>>;

/// Leader's claim on a location. Removes itself from the in-flight map when
/// completed or dropped, but never removes a newer leader's entry.
struct InFlight<'a> {
    flights: &'a FlightMap,
    key: String,
    generation: u64,
    tx: watch::Sender<Option<FetchOutcome>>,
    done: bool,
}

impl InFlight<'_> {
    fn release(&self) {
        let mut flights = self.flights.lock();
        if flights
            .get(&self.key)
            .is_some_and(|(generation, _)| *generation == self.generation)
        {
            flights.remove(&self.key);
        }
    }

    fn complete(&mut self, outcome: &FetchOutcome) {
        self.release();
        self.tx.send_replace(Some(outcome.clone()));
        self.done = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.release();
        }
    }
}

enum Role<'a> {
    Leader(InFlight<'a>),
    Follower(watch::Receiver<Option<FetchOutcome>>),
}

/// Settles the loading state if a fetch exits without publishing a result.
struct LoadingGuard<'a> {
    channel: &'a ResultChannel,
    armed: bool,
}

impl LoadingGuard<'_> {
    fn settle(&mut self, state: ResultState) {
        self.channel.emit(state);
        self.armed = false;
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!("Weather fetch ended without a result; clearing loading state");
            self.channel
                .emit(ResultState::settled_from(&self.channel.latest(), INTERRUPTED_MESSAGE));
        }
    }
}

pub struct FreshnessCoordinator {
    source: Arc<dyn WeatherSource>,
    store: Arc<dyn WeatherStore>,
    sink: Arc<dyn NotificationSink>,
    session: Arc<dyn SessionStore>,
    settings: CoordinatorSettings,
    channels: Mutex<HashMap<String, ResultChannel>>,
    flights: FlightMap,
    next_generation: AtomicU64,
}

impl FreshnessCoordinator {
    pub fn new(
        source: Arc<dyn WeatherSource>,
        store: Arc<dyn WeatherStore>,
        sink: Arc<dyn NotificationSink>,
        session: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            source,
            store,
            sink,
            session,
            settings: CoordinatorSettings::default(),
            channels: Mutex::new(HashMap::new()),
            flights: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
        }
    }

    pub fn with_settings(mut self, settings: CoordinatorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> CoordinatorSettings {
        self.settings
    }

    /// Result channel for a location, created on first use.
    pub fn channel(&self, location: &str) -> ResultChannel {
        self.channels
            .lock()
            .entry(location_key(location))
            .or_default()
            .clone()
    }

    /// Latest published state for a location.
    pub fn latest(&self, location: &str) -> ResultState {
        self.channel(location).latest()
    }

    /// Fetch weather for `location`, publishing progress on its channel.
    ///
    /// Never fails: every path ends in a usable [`ResultState`]. A fetch for
    /// a location that already has one in flight waits for that result
    /// instead of calling the source again.
    pub async fn fetch(&self, location: &str) -> ResultState {
        let key = location_key(location);
        let channel = self.channel(location);

        channel.emit(ResultState::loading_from(&channel.latest()));
        let mut loading = LoadingGuard {
            channel: &channel,
            armed: true,
        };

        // A waiter whose leader was dropped rejoins; one of them takes over.
        let (outcome, led) = loop {
            match self.join_or_lead(&key) {
                Role::Leader(mut flight) => {
                    let outcome = self.resolve(location).await;
                    flight.complete(&outcome);
                    break (outcome, true);
                }
                Role::Follower(rx) => {
                    tracing::debug!("Joining in-flight fetch for {}", location);
                    if let Some(outcome) = Self::await_leader(rx).await {
                        break (outcome, false);
                    }
                    tracing::debug!("In-flight fetch for {} was abandoned, rejoining", location);
                }
            }
        };

        let state = outcome.clone().into_state();
        loading.settle(state.clone());
        if led {
            self.notify_updated(&outcome);
        }
        state
    }

    /// Same as [`fetch`](Self::fetch); always goes to the source first.
    pub async fn refresh(&self, location: &str) -> ResultState {
        self.fetch(location).await
    }

    /// Whether cached data for `location` is missing or older than the threshold.
    pub async fn is_stale(&self, location: &str) -> bool {
        let store = Arc::clone(&self.store);
        let owned = location.to_string();
        let last_updated = match tokio::task::spawn_blocking(move || store.last_updated(&owned)).await {
            Ok(Ok(last)) => last,
            Ok(Err(e)) => {
                tracing::warn!("Staleness check for {} failed: {}", location, e);
                None
            }
            Err(e) => {
                tracing::warn!("Staleness check for {} failed: {}", location, e);
                None
            }
        };
        is_stale_at(last_updated, Utc::now(), self.settings.stale_after)
    }

    /// Remove all cached weather. Used on sign-out.
    pub async fn clear_offline_data(&self) -> Result<(), WeatherError> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.clear()).await??;
        tracing::info!("Offline weather data cleared");
        Ok(())
    }

    /// Whether a user is signed in; the coordinator does nothing otherwise.
    pub fn is_active(&self) -> bool {
        self.session.is_logged_in()
    }

    /// Fetch the signed-in user's location. `None` when signed out.
    pub async fn fetch_current_location(&self) -> Option<ResultState> {
        if !self.is_active() {
            tracing::debug!("No user signed in, skipping weather fetch");
            return None;
        }
        let location = self.session.current_location();
        Some(self.fetch(&location).await)
    }

    /// Fetch the session location if its cached data is stale.
    pub async fn refresh_if_stale(&self) -> Option<ResultState> {
        if !self.is_active() {
            return None;
        }
        let location = self.session.current_location();
        if !self.is_stale(&location).await {
            tracing::debug!("Weather for {} is fresh", location);
            return None;
        }
        Some(self.fetch(&location).await)
    }

    /// Switch the session to `new_location` and fetch it.
    pub async fn change_location(&self, new_location: &str) -> Result<ResultState, SessionError> {
        let old = self.session.current_location();
        self.session.update_location(new_location)?;
        let new = self.session.current_location();

        if location_key(&old) != location_key(&new) {
            tracing::info!("Location changed from {} to {}", old, new);
            if let Err(e) = self.sink.on_location_changed(&old, &new) {
                tracing::warn!("Location change notification failed: {}", e);
            }
        }

        Ok(self.fetch(&new).await)
    }

    /// Greet the signed-in user.
    pub fn welcome(&self) {
        if !self.is_active() {
            return;
        }
        let name = self.session.current_user_name();
        if let Err(e) = self.sink.on_welcome(name.as_deref()) {
            tracing::warn!("Welcome notification failed: {}", e);
        }
    }

    /// End the session and wipe offline data and published states.
    pub async fn sign_out(&self) -> Result<(), SessionError> {
        self.session.logout()?;
        if let Err(e) = self.clear_offline_data().await {
            tracing::warn!("Failed to clear offline data on sign-out: {}", e);
        }
        let channels: Vec<ResultChannel> = self.channels.lock().values().cloned().collect();
        for channel in channels {
            channel.emit(ResultState::default());
        }
        Ok(())
    }

    fn join_or_lead(&self, key: &str) -> Role<'_> {
        let mut flights = self.flights.lock();
        if let Some((_, rx)) = flights.get(key) {
            return Role::Follower(rx.clone());
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(None);
        flights.insert(key.to_string(), (generation, rx));
        Role::Leader(InFlight {
            flights: &self.flights,
            key: key.to_string(),
            generation,
            tx,
            done: false,
        })
    }

    async fn await_leader(mut rx: watch::Receiver<Option<FetchOutcome>>) -> Option<FetchOutcome> {
        let outcome = match rx.wait_for(|outcome| outcome.is_some()).await {
            Ok(outcome) => (*outcome).clone(),
            // Leader dropped before finishing
            Err(_) => None,
        };
        outcome
    }

    async fn resolve(&self, location: &str) -> FetchOutcome {
        match self.fetch_from_source(location).await {
            Ok(forecast) => {
                self.write_through(location, &forecast).await;
                tracing::info!("Fetched weather for {} from {}", location, self.source.name());
                FetchOutcome::Fresh(forecast)
            }
            Err(e) => {
                tracing::warn!("Weather source failed for {}: {}", location, e);
                self.offline_fallback(location).await
            }
        }
    }

    async fn fetch_from_source(&self, location: &str) -> Result<Forecast, WeatherError> {
        let source = &self.source;
        let calls = async {
            tokio::try_join!(source.fetch_current(location), source.fetch_forecast(location))
        };
        let (current, mut forecast) = tokio::time::timeout(self.settings.source_timeout, calls)
            .await
            .map_err(|_| WeatherError::Timeout)??;
        forecast.current = current;
        Ok(forecast)
    }

    /// Cache write failures are logged and never fail the fetch.
    async fn write_through(&self, location: &str, forecast: &Forecast) {
        let store = Arc::clone(&self.store);
        let owned = location.to_string();
        let snapshot = forecast.clone();
        // Each write stands alone; a failed current write still stores the forecast
        let written = tokio::task::spawn_blocking(move || {
            (
                store.put_current(&owned, &snapshot.current),
                store.put_forecast(&owned, &snapshot.days),
            )
        })
        .await;

        match written {
            Ok((Ok(()), Ok(()))) => tracing::debug!("Cached weather for {}", location),
            Ok((current, forecast)) => {
                if let Err(e) = current {
                    tracing::warn!("Failed to cache current weather for {}: {}", location, e);
                }
                if let Err(e) = forecast {
                    tracing::warn!("Failed to cache forecast for {}: {}", location, e);
                }
            }
            Err(e) => tracing::warn!("Failed to cache weather for {}: {}", location, e),
        }
    }

    async fn offline_fallback(&self, location: &str) -> FetchOutcome {
        let store = Arc::clone(&self.store);
        let owned = location.to_string();
        let cached = tokio::task::spawn_blocking(move || {
            Ok::<_, WeatherError>((store.get_current(&owned)?, store.get_forecast_days(&owned)?))
        })
        .await
        .map_err(WeatherError::from)
        .and_then(|read| read);

        match cached {
            Ok((Some(current), days)) => {
                tracing::info!("Serving offline weather for {}", location);
                let days = if days.is_empty() {
                    tracing::debug!("No cached forecast for {}, using default days", location);
                    self.source.default_profile(location).days
                } else {
                    days
                };
                FetchOutcome::Offline(Forecast {
                    location: current.location.clone(),
                    current,
                    days,
                })
            }
            Ok((None, days)) if !days.is_empty() => {
                tracing::info!("Serving offline forecast for {}", location);
                let name = location.trim();
                FetchOutcome::Offline(Forecast {
                    location: name.to_string(),
                    current: current_from_day(name, &days[0]),
                    days,
                })
            }
            Ok(_) => {
                let err = WeatherError::NoDataAvailable(location.to_string());
                tracing::warn!("{}; using default profile", err);
                FetchOutcome::DefaultFallback(self.source.default_profile(location))
            }
            Err(e) => {
                tracing::warn!("Offline cache read failed for {}: {}; using default profile", location, e);
                FetchOutcome::DefaultFallback(self.source.default_profile(location))
            }
        }
    }

    fn notify_updated(&self, outcome: &FetchOutcome) {
        let current = outcome.current();
        if let Err(e) = self
            .sink
            .on_weather_updated(&current.location, &current.temperature_display())
        {
            tracing::warn!("Weather notification failed: {}", e);
        }
    }
}
