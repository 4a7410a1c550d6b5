//! City temperature management service.
//!
//! This crate provides:
//! - An SQLite-backed store of cities and their temperature readings
//! - A weather provider client with bounded retry
//! - A refresh orchestrator fanning out concurrent per-city updates
//! - A REST API over all of the above

pub mod config;
pub mod http_server;
pub mod refresh;
pub mod store;
pub mod weather;

pub use config::{Config, ConfigError};
pub use http_server::{create_router, run_http_server, AppState};
pub use refresh::{refresh_all, RefreshError, RefreshSummary};
pub use store::{City, Store, StoreError, Temperature};
pub use weather::{FetchError, WeatherClient, WeatherPayload};
