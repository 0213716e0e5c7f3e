//! sentineld - community moderation daemon.

use sentineld::config::Config;
use sentineld::gateway::Gateway;
use sentineld::persist::scheduler;
use sentineld::platform::bridge::BridgeChat;
use sentineld::platform::ChatApi;
use sentineld::services::{appeals, leveling};
use sentineld::state::{Warden, WardenParams};
use sentineld::{http, metrics, watchdog};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    std::fs::create_dir_all(&config.daemon.data_dir)?;

    info!(
        bridge = %config.bridge.listen,
        data_dir = %config.daemon.data_dir.display(),
        "Starting sentineld"
    );

    // Prometheus metrics are optional.
    // Convention: metrics_port = 0 disables the HTTP endpoint (used by tests).
    let metrics_port = config.daemon.metrics_port;
    if metrics_port == 0 {
        info!("Metrics disabled");
    } else {
        metrics::init();
        tokio::spawn(async move {
            http::run_http_server(metrics_port).await;
        });
        info!(port = metrics_port, "Prometheus HTTP server started");
    }

    // Bridge + shared state
    let bridge = Arc::new(BridgeChat::new());
    let chat: Arc<dyn ChatApi> = bridge.clone();
    let warden = Warden::new(WardenParams { config, chat });

    let shutdown = CancellationToken::new();

    // Dirty-set flush task
    {
        let warden = Arc::clone(&warden);
        let token = shutdown.clone();
        let period = Duration::from_secs(warden.config.persistence.flush_interval_secs.max(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = interval.tick() => {}
                }
                scheduler::flush_dirty(&warden).await;
            }
        });
    }
    info!("Flag flush task started");

    // Full sweep save task (durability backstop against missed dirty-marking)
    {
        let warden = Arc::clone(&warden);
        let token = shutdown.clone();
        let period = Duration::from_secs(warden.config.persistence.sweep_interval_secs.max(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = interval.tick() => {}
                }
                scheduler::sweep_all(&warden).await;
            }
        });
    }
    info!("Flag sweep task started");

    // Blocklist reload task (runs every minute)
    if warden.config.moderation.enabled {
        let warden = Arc::clone(&warden);
        let token = shutdown.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = interval.tick() => {}
                }
                let filter = Arc::clone(&warden.filter);
                if let Err(e) = tokio::task::spawn_blocking(move || filter.reload()).await {
                    error!(error = %e, "blocklist reload task failed");
                }
            }
        });
        info!("Blocklist reload task started");
    }

    // Appeal expiry sweep (runs every minute)
    {
        let warden = Arc::clone(&warden);
        let token = shutdown.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = interval.tick() => {}
                }
                appeals::sweep_expired(&warden).await;
            }
        });
    }
    info!("Appeal expiry task started");

    // XP pin push task (runs every minute)
    if warden.config.leveling.enabled {
        let warden = Arc::clone(&warden);
        let token = shutdown.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = interval.tick() => {}
                }
                leveling::push_xp_pins(&warden).await;
            }
        });
        info!("XP push task started");
    }

    // Lag canary and resource health loop
    watchdog::spawn_lag_monitor(shutdown.clone());
    watchdog::spawn_health_monitor(Arc::clone(&warden), shutdown.clone());

    // Bridge gateway
    let gateway = Gateway::bind(Arc::clone(&warden), bridge).await?;
    let gateway_token = shutdown.clone();
    let gateway_task = tokio::spawn(async move { gateway.run(gateway_token).await });

    tokio::select! {
        result = gateway_task => {
            match result {
                Ok(Ok(())) => info!("Gateway exited"),
                Ok(Err(e)) => error!(error = %e, "Gateway failed"),
                Err(e) => error!(error = %e, "Gateway task panicked"),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    // Graceful shutdown: stop periodic work, then flush outstanding state
    // once so a clean exit loses nothing.
    shutdown.cancel();
    scheduler::flush_dirty(&warden).await;
    warden.appeals.save();
    info!("Shutdown flush complete");

    Ok(())
}
