//! Refresh orchestrator — concurrent fetch+persist across all cities.
//!
//! Snapshots the city list once, then launches one independent task per
//! city. A failure fetching or persisting one city never blocks or
//! corrupts the outcome for any other; the run completes only when every
//! task has finished.

use crate::store::{City, Store, StoreError, Temperature};
use crate::weather::{FetchError, WeatherClient};
use chrono::Utc;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;

/// Errors from a refresh run or a single per-city unit.
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("store lock poisoned: {0}")]
    Lock(String),
}

/// Outcome counts of one refresh run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Fetch current weather for every tracked city and persist one reading
/// per successful fetch.
///
/// The city list is read once through the shared store handle; cities
/// added mid-run are not picked up. Each per-city task opens its own
/// store connection for the write, so concurrent writers never share a
/// session. Per-city failures are logged and counted, never raised —
/// only the initial snapshot can fail this function.
pub async fn refresh_all(
    store: &Mutex<Store>,
    db_path: &Path,
    client: &Arc<WeatherClient>,
) -> Result<RefreshSummary, RefreshError> {
    let cities = {
        let store = store
            .lock()
            .map_err(|e| RefreshError::Lock(e.to_string()))?;
        store.list_cities()?
    };

    let mut summary = RefreshSummary {
        total: cities.len(),
        ..Default::default()
    };

    let mut tasks = JoinSet::new();
    for city in cities {
        let client = client.clone();
        let db_path = db_path.to_path_buf();
        tasks.spawn(async move {
            let result = process_city(&client, &city, &db_path).await;
            (city, result)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((city, Ok(reading))) => {
                summary.succeeded += 1;
                log::info!(
                    "refreshed '{}' (id {}): {:.1} C",
                    city.name,
                    city.id,
                    reading.temperature
                );
            }
            Ok((city, Err(e))) => {
                summary.failed += 1;
                log::warn!("refresh failed for '{}' (id {}): {}", city.name, city.id, e);
            }
            Err(e) => {
                summary.failed += 1;
                log::error!("refresh task panicked: {}", e);
            }
        }
    }

    Ok(summary)
}

/// One independent unit of work: fetch, then persist over a dedicated
/// connection.
async fn process_city(
    client: &WeatherClient,
    city: &City,
    db_path: &Path,
) -> Result<Temperature, RefreshError> {
    let payload = client.fetch_current(&city.name).await?;
    let store = Store::open(db_path)?;
    let reading = store.create_temperature(city.id, Utc::now(), payload.current.temp_c)?;
    Ok(reading)
}
