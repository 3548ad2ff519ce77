//! APPRAISER: Price Aggregation & Valuation Engine
//!
//! Entry point. Loads configuration, initialises structured logging,
//! starts the HTTP API, and runs the periodic catalog refresh loop with
//! graceful shutdown.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use appraiser::api;
use appraiser::api::routes::ApiState;
use appraiser::appraiser::Appraiser;
use appraiser::config;
use appraiser::market::listings_api::ListingsApiClient;
use appraiser::storage::{self, JsonFileStore};

const BANNER: &str = r#"
    _    ____  ____  ____      _    ___ ____  _____ ____
   / \  |  _ \|  _ \|  _ \    / \  |_ _/ ___|| ____|  _ \
  / _ \ | |_) | |_) | |_) |  / _ \  | |\___ \|  _| | |_) |
 / ___ \|  __/|  __/|  _ <  / ___ \ | | ___) | |___|  _ <
/_/   \_\_|   |_|   |_| \_\/_/   \_\___|____/|_____|_| \_\

  Price Aggregation & Valuation Engine
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = std::env::var("APPRAISER_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let cfg = config::AppConfig::load(&config_path)?;

    init_logging();

    println!("{BANNER}");
    info!(
        service = %cfg.service.name,
        port = cfg.service.port,
        listings_api = %cfg.listings_api.base_url,
        refresh_interval_secs = cfg.service.refresh_interval_secs,
        tracked_items = cfg.items.len(),
        "APPRAISER starting up"
    );

    // -- Initialise components -------------------------------------------

    let token = cfg.listings_api.resolve_token();
    if cfg.listings_api.token_env.is_some() && token.is_none() {
        warn!("Listings API token env var configured but not set, sending unauthenticated requests");
    }
    let source = Arc::new(ListingsApiClient::new(&cfg.listings_api, token)?);
    let appraiser = Arc::new(Appraiser::from_config(&cfg, source));
    info!(
        mutations = appraiser.mutations().len(),
        traits = appraiser.traits().len(),
        "Catalogs loaded"
    );

    let store = JsonFileStore::new(&cfg.service.state_file);
    let stored = storage::load_tables(store.path()).await?;
    info!(tables = stored.len(), "Existing price tables");

    // -- HTTP API --------------------------------------------------------

    let state = Arc::new(ApiState::new(appraiser.clone(), cfg.sweep.request_budget()));
    let port = cfg.service.port;
    tokio::spawn(async move {
        if let Err(e) = api::serve(state, port).await {
            error!(error = %e, "API server stopped");
        }
    });

    // -- Refresh loop ----------------------------------------------------

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    if cfg.service.refresh_interval_secs == 0 || cfg.items.is_empty() {
        info!("Periodic refresh disabled. Press Ctrl+C to stop.");
        let _ = (&mut shutdown).await;
        info!("Shutdown signal received.");
        return Ok(());
    }

    let mut interval = tokio::time::interval(Duration::from_secs(cfg.service.refresh_interval_secs));
    info!(
        interval_secs = cfg.service.refresh_interval_secs,
        "Entering refresh loop. Press Ctrl+C to stop."
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let reports = appraiser.orchestrator().refresh(&cfg.items, &store).await;
                let suspect: usize = reports.iter().map(|r| r.suspect_count()).sum();
                info!(
                    swept = reports.len(),
                    suspect,
                    "Refresh complete"
                );
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    info!("APPRAISER shut down cleanly.");
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("appraiser=info"));

    let json_logging = std::env::var("APPRAISER_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
