//! City temperature management server.
//!
//! Serves the city CRUD API and the temperature refresh endpoint.
//! Requires `WEATHER_API_KEY` and `WEATHER_API_URL` in the environment;
//! refuses to start without them.

use argh::FromArgs;
use citytemp::{run_http_server, AppState, Config, Store, WeatherClient};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

#[derive(FromArgs)]
/// City temperature management API server
struct Args {
    /// address to bind (default: 0.0.0.0)
    #[argh(option, default = "String::from(\"0.0.0.0\")")]
    host: String,

    /// port to listen on (default: 8000)
    #[argh(option, short = 'p', default = "8000")]
    port: u16,

    /// sqlite database path (overrides CITYTEMP_DB)
    #[argh(option)]
    db: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    let env = env_logger::Env::default().default_filter_or("info");
    env_logger::init_from_env(env);

    let args: Args = argh::from_env();

    let mut config = Config::from_env()?;
    if let Some(db) = args.db {
        config.db_path = db;
    }

    log::info!("Opening store at {}", config.db_path.display());
    let store = Store::open(&config.db_path)?;

    let weather = WeatherClient::new(&config.weather_api_url, &config.weather_api_key)?;

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(());

    // Set up Ctrl+C handler
    ctrlc::set_handler({
        let shutdown_tx = shutdown_tx.clone();
        move || {
            log::info!("Received Ctrl+C, shutting down gracefully...");
            shutdown_tx.send(()).ok();
        }
    })?;

    let state = AppState {
        store: Arc::new(Mutex::new(store)),
        db_path: config.db_path.clone(),
        weather: Arc::new(weather),
    };

    run_http_server(state, &args.host, args.port, shutdown_rx).await?;

    log::info!("Server stopped.");
    Ok(())
}
