//! Offline weather cache.
//!
//! Keeps the latest current-weather record and forecast-day list per
//! location. Keys are normalized with [`location_key`], so lookups are
//! case-insensitive.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;

use crate::error::WeatherError;
use crate::types::{location_key, CurrentWeather, ForecastDay};

/// Location-keyed persistence for weather data.
///
/// Implementations are blocking; the coordinator calls them from
/// `spawn_blocking`. Any failure of the storage medium is reported as
/// [`WeatherError::StorageUnavailable`]. A missing key is never an error.
pub trait WeatherStore: Send + Sync {
    fn get_current(&self, location: &str) -> Result<Option<CurrentWeather>, WeatherError>;

    /// Days in calendar order; empty when nothing is cached.
    fn get_forecast_days(&self, location: &str) -> Result<Vec<ForecastDay>, WeatherError>;

    /// Replaces any previous record for the location.
    fn put_current(&self, location: &str, weather: &CurrentWeather) -> Result<(), WeatherError>;

    /// Replaces the whole forecast for the location in one step. Readers see
    /// either the old days or the new days, never a mix.
    fn put_forecast(&self, location: &str, days: &[ForecastDay]) -> Result<(), WeatherError>;

    /// Removes current and forecast records. Idempotent.
    fn delete_location(&self, location: &str) -> Result<(), WeatherError>;

    fn last_updated(&self, location: &str) -> Result<Option<DateTime<Utc>>, WeatherError>;

    /// Wipes every location.
    fn clear(&self) -> Result<(), WeatherError>;
}

/// SQLite-backed weather cache.
///
/// A single connection behind a mutex; calls for the same location are
/// therefore serialized.
pub struct SqliteWeatherCache {
    conn: Mutex<Connection>,
}

impl SqliteWeatherCache {
    /// Open (or create) a cache at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WeatherError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| WeatherError::storage(e.to_string()))?;
        }
        let conn = Connection::open(path)?;
        let cache = Self {
            conn: Mutex::new(conn),
        };
        cache.init_schema()?;
        tracing::info!("Weather cache opened at {}", path.display());
        Ok(cache)
    }

    /// Create an in-memory cache (tests and throwaway sessions).
    pub fn in_memory() -> Result<Self, WeatherError> {
        let conn = Connection::open_in_memory()?;
        let cache = Self {
            conn: Mutex::new(conn),
        };
        cache.init_schema()?;
        Ok(cache)
    }

    fn init_schema(&self) -> Result<(), WeatherError> {
        self.conn.lock().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS current_weather (
                location_key TEXT PRIMARY KEY,
                location TEXT NOT NULL,
                temperature_c REAL NOT NULL,
                description TEXT NOT NULL,
                humidity_pct INTEGER NOT NULL,
                wind_speed_kmh REAL NOT NULL,
                icon TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS forecast_days (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                location_key TEXT NOT NULL,
                position INTEGER NOT NULL,
                day TEXT NOT NULL,
                date TEXT NOT NULL,
                high_temp_c REAL NOT NULL,
                low_temp_c REAL NOT NULL,
                description TEXT NOT NULL,
                icon TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_forecast_location ON forecast_days(location_key, position);
            "#,
        )?;
        Ok(())
    }

    fn row_to_current(row: &rusqlite::Row) -> rusqlite::Result<CurrentWeather> {
        Ok(CurrentWeather {
            location: row.get(0)?,
            temperature_c: row.get(1)?,
            description: row.get(2)?,
            humidity_pct: row.get(3)?,
            wind_speed_kmh: row.get(4)?,
            icon: row.get(5)?,
        })
    }

    fn row_to_day(row: &rusqlite::Row) -> rusqlite::Result<ForecastDay> {
        Ok(ForecastDay {
            day: row.get(0)?,
            date: row.get(1)?,
            high_temp_c: row.get(2)?,
            low_temp_c: row.get(3)?,
            description: row.get(4)?,
            icon: row.get(5)?,
        })
    }
}

impl WeatherStore for SqliteWeatherCache {
    fn get_current(&self, location: &str) -> Result<Option<CurrentWeather>, WeatherError> {
        let conn = self.conn.lock();
        let weather = conn
            .query_row(
                "SELECT location, temperature_c, description, humidity_pct, wind_speed_kmh, icon
                 FROM current_weather WHERE location_key = ?1",
                params![location_key(location)],
                Self::row_to_current,
            )
            .optional()?;
        Ok(weather)
    }

    fn get_forecast_days(&self, location: &str) -> Result<Vec<ForecastDay>, WeatherError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT day, date, high_temp_c, low_temp_c, description, icon
             FROM forecast_days WHERE location_key = ?1 ORDER BY position ASC",
        )?;
        let rows = stmt.query_map(params![location_key(location)], Self::row_to_day)?;
        let days = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(days)
    }

    fn put_current(&self, location: &str, weather: &CurrentWeather) -> Result<(), WeatherError> {
        let now = Utc::now().timestamp_millis();
        self.conn.lock().execute(
            r#"
            INSERT OR REPLACE INTO current_weather
            (location_key, location, temperature_c, description, humidity_pct, wind_speed_kmh, icon, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                location_key(location),
                weather.location,
                weather.temperature_c,
                weather.description,
                weather.humidity_pct,
                weather.wind_speed_kmh,
                weather.icon,
                now,
            ],
        )?;
        Ok(())
    }

    fn put_forecast(&self, location: &str, days: &[ForecastDay]) -> Result<(), WeatherError> {
        let key = location_key(location);
        let now = Utc::now().timestamp_millis();

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM forecast_days WHERE location_key = ?1",
            params![key],
        )?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO forecast_days
                (location_key, position, day, date, high_temp_c, low_temp_c, description, icon, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )?;
            for (position, day) in days.iter().enumerate() {
                stmt.execute(params![
                    key,
                    position as i64,
                    day.day,
                    day.date,
                    day.high_temp_c,
                    day.low_temp_c,
                    day.description,
                    day.icon,
                    now,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_location(&self, location: &str) -> Result<(), WeatherError> {
        let key = location_key(location);
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM current_weather WHERE location_key = ?1",
            params![key],
        )?;
        tx.execute(
            "DELETE FROM forecast_days WHERE location_key = ?1",
            params![key],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn last_updated(&self, location: &str) -> Result<Option<DateTime<Utc>>, WeatherError> {
        let key = location_key(location);
        let conn = self.conn.lock();
        let current: Option<i64> = conn
            .query_row(
                "SELECT updated_at FROM current_weather WHERE location_key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        let forecast: Option<i64> = conn.query_row(
            "SELECT MAX(updated_at) FROM forecast_days WHERE location_key = ?1",
            params![key],
            |row| row.get(0),
        )?;

        Ok(current
            .into_iter()
            .chain(forecast)
            .max()
            .and_then(DateTime::from_timestamp_millis))
    }

    fn clear(&self) -> Result<(), WeatherError> {
        self.conn
            .lock()
            .execute_batch("DELETE FROM current_weather; DELETE FROM forecast_days;")?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct MemoryRecord {
    current: Option<CurrentWeather>,
    days: Vec<ForecastDay>,
    updated_at: DateTime<Utc>,
}

/// Process-local cache, used when no database file can be opened.
#[derive(Debug, Default)]
pub struct MemoryWeatherCache {
    records: RwLock<HashMap<String, MemoryRecord>>,
}

impl MemoryWeatherCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn upsert(&self, location: &str, f: impl FnOnce(&mut MemoryRecord)) {
        let mut records = self.records.write();
        let record = records
            .entry(location_key(location))
            .or_insert_with(|| MemoryRecord {
                current: None,
                days: Vec::new(),
                updated_at: Utc::now(),
            });
        f(record);
        record.updated_at = Utc::now();
    }
}

impl WeatherStore for MemoryWeatherCache {
    fn get_current(&self, location: &str) -> Result<Option<CurrentWeather>, WeatherError> {
        Ok(self
            .records
            .read()
            .get(&location_key(location))
            .and_then(|r| r.current.clone()))
    }

    fn get_forecast_days(&self, location: &str) -> Result<Vec<ForecastDay>, WeatherError> {
        Ok(self
            .records
            .read()
            .get(&location_key(location))
            .map(|r| r.days.clone())
            .unwrap_or_default())
    }

    fn put_current(&self, location: &str, weather: &CurrentWeather) -> Result<(), WeatherError> {
        self.upsert(location, |r| r.current = Some(weather.clone()));
        Ok(())
    }

    fn put_forecast(&self, location: &str, days: &[ForecastDay]) -> Result<(), WeatherError> {
        self.upsert(location, |r| r.days = days.to_vec());
        Ok(())
    }

    fn delete_location(&self, location: &str) -> Result<(), WeatherError> {
        self.records.write().remove(&location_key(location));
        Ok(())
    }

    fn last_updated(&self, location: &str) -> Result<Option<DateTime<Utc>>, WeatherError> {
        Ok(self
            .records
            .read()
            .get(&location_key(location))
            .map(|r| r.updated_at))
    }

    fn clear(&self) -> Result<(), WeatherError> {
        self.records.write().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    fn weather(location: &str, temperature_c: f64) -> CurrentWeather {
        CurrentWeather {
            location: location.to_string(),
            temperature_c,
            description: "Sunny".to_string(),
            humidity_pct: 45,
            wind_speed_kmh: 15.0,
            icon: "☀️".to_string(),
        }
    }

    fn day(label: &str, high: f64) -> ForecastDay {
        ForecastDay {
            day: label.to_string(),
            date: format!("{}, Jan 5", label),
            high_temp_c: high,
            low_temp_c: high - 6.0,
            description: "Cloudy".to_string(),
            icon: "☁️".to_string(),
        }
    }

    fn stores() -> Vec<Box<dyn WeatherStore>> {
        vec![
            Box::new(SqliteWeatherCache::in_memory().unwrap()),
            Box::new(MemoryWeatherCache::new()),
        ]
    }

    #[test]
    fn test_missing_location_is_absent() {
        for store in stores() {
            assert!(store.get_current("Nowhere").unwrap().is_none());
            assert!(store.get_forecast_days("Nowhere").unwrap().is_empty());
            assert!(store.last_updated("Nowhere").unwrap().is_none());
        }
    }

    #[test]
    fn test_put_current_replaces() {
        for store in stores() {
            store.put_current("Johannesburg", &weather("Johannesburg", 22.0)).unwrap();
            let mut second = weather("Johannesburg", 11.0);
            second.description = "Rainy".to_string();
            store.put_current("Johannesburg", &second).unwrap();

            assert_eq!(store.get_current("Johannesburg").unwrap(), Some(second));
        }
    }

    #[test]
    fn test_put_forecast_replaces_whole_set() {
        for store in stores() {
            let first = vec![day("Mon", 20.0), day("Tue", 21.0), day("Wed", 22.0)];
            let second = vec![day("Thu", 30.0), day("Fri", 31.0)];

            store.put_forecast("Durban", &first).unwrap();
            store.put_forecast("Durban", &second).unwrap();

            assert_eq!(store.get_forecast_days("Durban").unwrap(), second);
        }
    }

    #[test]
    fn test_forecast_keeps_insertion_order() {
        for store in stores() {
            let days = vec![day("Sat", 10.0), day("Sun", 30.0), day("Mon", 20.0)];
            store.put_forecast("Pretoria", &days).unwrap();
            assert_eq!(store.get_forecast_days("Pretoria").unwrap(), days);
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        for store in stores() {
            store.put_current("Cape Town", &weather("Cape Town", 18.0)).unwrap();
            let cached = store.get_current("CAPE TOWN").unwrap().unwrap();
            assert_eq!(cached.location, "Cape Town");
        }
    }

    #[test]
    fn test_locations_are_independent() {
        for store in stores() {
            store.put_current("Durban", &weather("Durban", 26.0)).unwrap();
            store.put_forecast("Durban", &[day("Mon", 27.0)]).unwrap();
            store.put_current("Pretoria", &weather("Pretoria", 24.0)).unwrap();

            store.delete_location("Pretoria").unwrap();
            assert!(store.get_current("Durban").unwrap().is_some());
            assert_eq!(store.get_forecast_days("Durban").unwrap().len(), 1);
        }
    }

    #[test]
    fn test_delete_is_idempotent() {
        for store in stores() {
            store.put_current("Durban", &weather("Durban", 26.0)).unwrap();
            store.put_forecast("Durban", &[day("Mon", 27.0)]).unwrap();

            store.delete_location("Durban").unwrap();
            store.delete_location("Durban").unwrap();

            assert!(store.get_current("Durban").unwrap().is_none());
            assert!(store.get_forecast_days("Durban").unwrap().is_empty());
        }
    }

    #[test]
    fn test_last_updated_tracks_writes() {
        for store in stores() {
            let before = Utc::now() - chrono::Duration::seconds(1);
            store.put_forecast("Bloemfontein", &[day("Mon", 19.0)]).unwrap();
            let updated = store.last_updated("Bloemfontein").unwrap().unwrap();
            assert!(updated >= before);
        }
    }

    #[test]
    fn test_clear_wipes_everything() {
        for store in stores() {
            store.put_current("Durban", &weather("Durban", 26.0)).unwrap();
            store.put_forecast("Pretoria", &[day("Mon", 24.0)]).unwrap();

            store.clear().unwrap();

            assert!(store.get_current("Durban").unwrap().is_none());
            assert!(store.get_forecast_days("Pretoria").unwrap().is_empty());
        }
    }

    #[test]
    fn test_sqlite_cache_persists_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache").join("weather_cache.db");

        {
            let cache = SqliteWeatherCache::open(&path).unwrap();
            cache.put_current("Durban", &weather("Durban", 26.0)).unwrap();
        }

        let reopened = SqliteWeatherCache::open(&path).unwrap();
        assert_eq!(
            reopened.get_current("durban").unwrap().map(|w| w.temperature_c),
            Some(26.0)
        );
    }
}
