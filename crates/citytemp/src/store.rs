//! SQLite store — tracked cities and their temperature readings.
//!
//! All rows live in a single SQLite database. The schema is applied
//! idempotently on open, so a fresh process migrates itself before
//! serving traffic.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no city with id {city_id}")]
    UnknownCity { city_id: i64 },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// A tracked city row.
#[derive(Debug, Clone, Serialize)]
pub struct City {
    pub id: i64,
    pub name: String,
    pub additional_info: Option<String>,
}

/// A single timestamped temperature reading, in degrees Celsius.
/// Readings are append-only; they are never updated after insertion.
#[derive(Debug, Clone, Serialize)]
pub struct Temperature {
    pub id: i64,
    pub city_id: i64,
    pub date_time: DateTime<Utc>,
    pub temperature: f64,
}

/// SQLite-backed city/temperature store.
///
/// One `Store` wraps one connection. CRUD handlers share a single store
/// behind a mutex; refresh tasks open their own so concurrent writers
/// never share a session.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the database at the given path.
    ///
    /// Creates all tables if they don't exist. Sets WAL journal mode so
    /// independent connections can write concurrently, enables foreign
    /// key enforcement, and sets a busy timeout for writer contention.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        // SQLite does not enforce REFERENCES clauses unless asked to,
        // and the pragma is per-connection.
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(Duration::from_secs(5))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS cities (
                id              INTEGER PRIMARY KEY,
                name            TEXT NOT NULL,
                additional_info TEXT
            );

            CREATE TABLE IF NOT EXISTS temperatures (
                id          INTEGER PRIMARY KEY,
                city_id     INTEGER NOT NULL
                            REFERENCES cities(id) ON DELETE CASCADE,
                date_time   TEXT NOT NULL,
                temperature REAL NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_temps_city ON temperatures(city_id);",
        )?;

        Ok(Self { conn })
    }

    /// Look up a city by id. Absence is `None`, not an error.
    pub fn get_city(&self, id: i64) -> Result<Option<City>> {
        let city = self
            .conn
            .query_row(
                "SELECT id, name, additional_info FROM cities WHERE id = ?1",
                params![id],
                city_from_row,
            )
            .optional()?;
        Ok(city)
    }

    /// Insert a new city and return the full row with its assigned id.
    pub fn create_city(&self, name: &str, additional_info: Option<&str>) -> Result<City> {
        self.conn.execute(
            "INSERT INTO cities (name, additional_info) VALUES (?1, ?2)",
            params![name, additional_info],
        )?;
        Ok(City {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
            additional_info: additional_info.map(str::to_string),
        })
    }

    /// Overwrite a city's fields. Returns `None` when the id is absent;
    /// never creates a new row.
    pub fn update_city(
        &self,
        id: i64,
        name: &str,
        additional_info: Option<&str>,
    ) -> Result<Option<City>> {
        let updated = self.conn.execute(
            "UPDATE cities SET name = ?1, additional_info = ?2 WHERE id = ?3",
            params![name, additional_info, id],
        )?;
        if updated == 0 {
            return Ok(None);
        }
        Ok(Some(City {
            id,
            name: name.to_string(),
            additional_info: additional_info.map(str::to_string),
        }))
    }

    /// Remove a city and return the removed row, or `None` if absent.
    /// Dependent temperature readings are cascade-deleted.
    pub fn delete_city(&self, id: i64) -> Result<Option<City>> {
        let Some(city) = self.get_city(id)? else {
            return Ok(None);
        };
        self.conn
            .execute("DELETE FROM cities WHERE id = ?1", params![id])?;
        Ok(Some(city))
    }

    /// List all tracked cities.
    pub fn list_cities(&self) -> Result<Vec<City>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, additional_info FROM cities ORDER BY id")?;
        let rows = stmt.query_map([], city_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::from)
    }

    /// Insert a temperature reading for a city.
    ///
    /// Rejects readings whose `city_id` references no existing city
    /// with `StoreError::UnknownCity`.
    pub fn create_temperature(
        &self,
        city_id: i64,
        date_time: DateTime<Utc>,
        temperature: f64,
    ) -> Result<Temperature> {
        let result = self.conn.execute(
            "INSERT INTO temperatures (city_id, date_time, temperature) \
             VALUES (?1, ?2, ?3)",
            params![city_id, date_time.to_rfc3339(), temperature],
        );
        match result {
            Ok(_) => Ok(Temperature {
                id: self.conn.last_insert_rowid(),
                city_id,
                date_time,
                temperature,
            }),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::UnknownCity { city_id })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// List temperature readings, optionally filtered to one city.
    pub fn list_temperatures(&self, city_id: Option<i64>) -> Result<Vec<Temperature>> {
        let mut rows = Vec::new();
        match city_id {
            Some(city_id) => {
                let mut stmt = self.conn.prepare(
                    "SELECT id, city_id, date_time, temperature \
                     FROM temperatures WHERE city_id = ?1 ORDER BY id",
                )?;
                let mapped = stmt.query_map(params![city_id], temperature_from_row)?;
                for row in mapped {
                    rows.push(row?);
                }
            }
            None => {
                let mut stmt = self.conn.prepare(
                    "SELECT id, city_id, date_time, temperature \
                     FROM temperatures ORDER BY id",
                )?;
                let mapped = stmt.query_map([], temperature_from_row)?;
                for row in mapped {
                    rows.push(row?);
                }
            }
        }
        Ok(rows)
    }
}

fn city_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<City> {
    Ok(City {
        id: row.get(0)?,
        name: row.get(1)?,
        additional_info: row.get(2)?,
    })
}

fn temperature_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Temperature> {
    let raw: String = row.get(2)?;
    let date_time = DateTime::parse_from_rfc3339(&raw)
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?
        .with_timezone(&Utc);
    Ok(Temperature {
        id: row.get(0)?,
        city_id: row.get(1)?,
        date_time,
        temperature: row.get(3)?,
    })
}
