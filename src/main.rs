//! ARBSCOPE: Cross-exchange crypto arbitrage spread dashboard
//!
//! Entry point. Loads configuration, initialises structured logging,
//! restores opportunity history from disk, starts the dashboard, and runs
//! the fetch→compute→publish loop with graceful shutdown.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info};

use arbscope::config;
use arbscope::dashboard::{self, DashboardInfo, DashboardState};
use arbscope::engine::slippage;
use arbscope::engine::{CostModel, OpportunityEngine, RefreshSettings, Refresher};
use arbscope::exchanges::ExchangeRegistry;
use arbscope::prices::coingecko::CoinGeckoClient;
use arbscope::storage::{self, OpportunityStore};

const BANNER: &str = r#"
    _    ____  ____  ____   ____ ___  ____  _____
   / \  |  _ \| __ )/ ___| / ___/ _ \|  _ \| ____|
  / _ \ | |_) |  _ \\___ \| |  | | | | |_) |  _|
 / ___ \|  _ <| |_) |___) | |__| |_| |  __/| |___
/_/   \_\_| \_\____/|____/ \____\___/|_|   |_____|

  Cross-exchange arbitrage spread scanner
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = std::env::var("ARBSCOPE_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let cfg = config::AppConfig::load(&config_path)?;

    init_logging();

    println!("{BANNER}");
    info!(
        name = %cfg.app.name,
        config = %config_path,
        interval_secs = cfg.refresh.interval_secs,
        capital_base = cfg.refresh.capital_base,
        pairs = cfg.pairs.len(),
        "ARBSCOPE starting up"
    );

    // -- Initialise components -------------------------------------------

    let registry = Arc::new(
        ExchangeRegistry::from_config(&cfg.exchanges).context("Invalid exchange configuration")?,
    );
    let settings = RefreshSettings::from_config(&cfg.refresh).context("Invalid refresh configuration")?;
    let costs = CostModel::from_config(&cfg.costs).context("Invalid cost configuration")?;
    let slippage = slippage::from_config(&cfg.costs).context("Invalid slippage configuration")?;
    let engine = Arc::new(OpportunityEngine::new(registry.clone(), costs, slippage));

    // Opportunity store, seeded from the last run's history
    let store = Arc::new(OpportunityStore::new(cfg.storage.history_limit));
    storage::restore_history_file(&store, &cfg.storage.history_file).await;

    let (events, _) = broadcast::channel(cfg.dashboard.event_buffer.max(1));

    let source = Arc::new(CoinGeckoClient::new(
        &cfg.price_source,
        cfg.pairs.clone(),
        registry.clone(),
    )?);

    if cfg.dashboard.enabled {
        let info = DashboardInfo {
            name: cfg.app.name.clone(),
            capital_base: settings.capital_base,
            refresh_interval_secs: cfg.refresh.interval_secs,
            broadcast_top_n: settings.broadcast_top_n,
        };
        let state = Arc::new(DashboardState::new(
            store.clone(),
            registry.clone(),
            cfg.pairs.clone(),
            events.clone(),
            info,
        ));
        dashboard::spawn_dashboard(state, cfg.dashboard.port).await?;
    }

    let refresher = Refresher::new(source, engine, store.clone(), events, settings);

    // -- Main loop -------------------------------------------------------

    let refresh_interval = Duration::from_secs(cfg.refresh.interval_secs.max(1));
    let mut interval = tokio::time::interval(refresh_interval);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        interval_secs = refresh_interval.as_secs(),
        "Entering refresh loop. Press Ctrl+C to stop."
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match refresher.run_cycle().await {
                    Ok(_) => {
                        if let Err(e) = persist_history(&store, &cfg.storage.history_file).await {
                            error!(error = %e, "Failed to save history");
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "Refresh cycle failed, continuing to next");
                    }
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    persist_history(&store, &cfg.storage.history_file).await?;
    info!(cycles = store.cycles().await, "ARBSCOPE shut down cleanly.");

    Ok(())
}

async fn persist_history(store: &OpportunityStore, path: &str) -> Result<()> {
    let history = store.history(store.history_limit()).await;
    storage::save_history(&history, path)
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("arbscope=info"));

    if std::env::var("ARBSCOPE_LOG_JSON").is_ok() {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
