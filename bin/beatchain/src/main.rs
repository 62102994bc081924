//! Beatchain - music NFT marketplace state service.
//!
//! # Usage
//!
//! ```bash
//! # Start against a local node with a network file
//! beatchain --networks networks.json
//!
//! # Start with environment overrides
//! RPC_URL=https://evm-rpc-testnet.sei-apis.com MARKETPLACE_ADDRESS=0x... beatchain
//! ```
//!
//! Sending `SIGHUP` reloads the network file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::signal;
use tokio::sync::{mpsc, watch};
use tracing::{Instrument, debug, error, info, info_span, warn};
use tracing_subscriber::{EnvFilter, fmt};

use beatchain_core::error::ServiceError;
use beatchain_core::metrics::init_metrics;
use beatchain_core::models::{Address, ChainId, NetworkDeployment, NetworkRegistry};
use beatchain_core::ports::LedgerGateway;
use beatchain_core::services::{MarketplaceService, RefreshTrigger, ServiceConfig};
use beatchain_evm::{EvmClient, EvmClientConfig};
use beatchain_graphql::{ServerConfig, build_schema, serve_with_shutdown};

/// Pending triggers before `refresh` requests start being rejected.
const TRIGGER_BUFFER: usize = 16;

/// Beatchain CLI - marketplace state service.
#[derive(Parser, Debug)]
#[command(name = "beatchain")]
#[command(about = "Beatchain - music NFT marketplace state service")]
#[command(version)]
struct Cli {
    /// EVM node JSON-RPC URL.
    #[arg(long, env = "RPC_URL", default_value = "http://127.0.0.1:8545")]
    rpc_url: String,

    /// JSON file mapping chain ids to contract deployments.
    #[arg(long, env = "NETWORKS_FILE")]
    networks: Option<PathBuf>,

    /// Marketplace contract of the connected chain (overrides the network file).
    #[arg(long, env = "MARKETPLACE_ADDRESS")]
    marketplace: Option<Address>,

    /// NFT factory contract of the connected chain (overrides the network file).
    #[arg(long, env = "FACTORY_ADDRESS")]
    factory: Option<Address>,

    /// GraphQL server port.
    #[arg(long, env = "GRAPHQL_PORT", default_value = "4000")]
    graphql_port: u16,

    /// Prometheus metrics port.
    #[arg(long, env = "METRICS_PORT", default_value = "9090")]
    metrics_port: u16,

    /// Enable JSON log output.
    #[arg(long, env = "JSON_LOGS")]
    json_logs: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Number of most recent blocks scanned for activity feeds.
    #[arg(long, env = "LOOKBACK_BLOCKS", default_value = "1000")]
    lookback_blocks: u64,

    /// Contract reads in flight per enumeration (1 = sequential).
    #[arg(long, env = "FETCH_CONCURRENCY", default_value = "1", value_parser = clap::value_parser!(u16).range(1..))]
    fetch_concurrency: u16,

    /// Seconds between automatic snapshot rebuilds.
    #[arg(long, env = "REFRESH_INTERVAL_SECS", default_value = "30")]
    refresh_interval_secs: u64,

    /// Seconds between checks of the connected chain id.
    #[arg(long, env = "CHAIN_POLL_SECS", default_value = "5")]
    chain_poll_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs);

    // Prometheus metrics exporter (optional - failures don't crash the app)
    let metrics_enabled = match format!("0.0.0.0:{}", cli.metrics_port).parse::<std::net::SocketAddr>() {
        Ok(metrics_addr) => {
            match PrometheusBuilder::new()
                .with_http_listener(metrics_addr)
                .install()
            {
                Ok(()) => {
                    init_metrics();
                    true
                }
                Err(e) => {
                    warn!("⚠️  Failed to start metrics exporter: {}. Continuing without metrics.", e);
                    false
                }
            }
        }
        Err(e) => {
            warn!("⚠️  Invalid metrics address: {}. Continuing without metrics.", e);
            false
        }
    };

    // ─────────────────────────────────────────────────────────────────────────
    // 🚀 STARTUP
    // ─────────────────────────────────────────────────────────────────────────
    info!("🚀 Starting Beatchain");
    debug!(rpc_url = %mask_password(&cli.rpc_url), "Ledger endpoint");

    // ─────────────────────────────────────────────────────────────────────────
    // 📡 LEDGER CONNECTION
    // ─────────────────────────────────────────────────────────────────────────
    info!("📡 Connecting to EVM node...");
    let client = EvmClient::connect(EvmClientConfig {
        rpc_url: cli.rpc_url.clone(),
    })
    .await
    .context("Failed to connect to EVM node")?;
    let client = Arc::new(client);

    let chain_id = client.chain_id().await.context("Failed to read chain id")?;
    let head = client
        .latest_block_number()
        .await
        .context("Failed to read latest block")?;

    info!(chain = chain_id, head, "🔗 Chain connected");

    // ─────────────────────────────────────────────────────────────────────────
    // 🗂️ NETWORK REGISTRY
    // ─────────────────────────────────────────────────────────────────────────
    let registry = load_registry(&cli, chain_id)?;
    match registry.resolve(chain_id) {
        Some(deployment) => info!(
            chain = chain_id,
            marketplace = ?deployment.marketplace.map(|a| a.to_hex()),
            factory = ?deployment.factory.map(|a| a.to_hex()),
            currency = deployment.currency(),
            "🗂️  Deployment resolved"
        ),
        None => warn!(
            chain = chain_id,
            supported = ?registry.supported_chains(),
            "⚠️  No deployment for the connected chain, views will stay empty"
        ),
    }

    let service_config = ServiceConfig {
        lookback_blocks: cli.lookback_blocks,
        fetch_concurrency: usize::from(cli.fetch_concurrency),
        refresh_interval: Duration::from_secs(cli.refresh_interval_secs.max(1)),
    };

    let (trigger_tx, trigger_rx) = mpsc::channel(TRIGGER_BUFFER);
    let service = Arc::new(MarketplaceService::new(
        service_config,
        client.clone(),
        registry,
        trigger_tx.clone(),
    ));

    trigger_tx
        .send(RefreshTrigger::NetworkChanged(chain_id))
        .await
        .context("Failed to queue initial rebuild")?;

    // ─────────────────────────────────────────────────────────────────────────
    // ⚡ SERVICES START
    // ─────────────────────────────────────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut graphql_shutdown_rx = shutdown_tx.subscribe();

    let graphql_config = ServerConfig {
        host: "0.0.0.0".to_string(),
        port: cli.graphql_port,
        enable_playground: true,
    };

    let schema = build_schema(service.clone());
    let graphql_port = cli.graphql_port;
    let graphql_handle = tokio::spawn(
        async move {
            let shutdown_signal = async move {
                while !*graphql_shutdown_rx.borrow() {
                    if graphql_shutdown_rx.changed().await.is_err() {
                        break;
                    }
                }
            };

            if let Err(e) = serve_with_shutdown(schema, graphql_config, shutdown_signal).await {
                error!(error = %e, "❌ Server error");
            }
            debug!("Server stopped");
        }
        .instrument(info_span!("graphql")),
    );

    let service_handle = tokio::spawn(
        async move {
            if let Err(e) = service.run(trigger_rx, shutdown_rx).await {
                match &e {
                    ServiceError::ShutdownRequested => {}
                    _ => error!(error = ?e, "❌ Marketplace service error"),
                }
            }
        }
        .instrument(info_span!("marketplace")),
    );

    let watcher_handle = tokio::spawn(
        watch_chain(
            client,
            trigger_tx.clone(),
            Duration::from_secs(cli.chain_poll_secs.max(1)),
            shutdown_tx.subscribe(),
        )
        .instrument(info_span!("chain_watcher")),
    );

    #[cfg(unix)]
    let reload_handle = tokio::spawn(
        reload_on_hangup(
            cli.networks.clone(),
            chain_id,
            cli.marketplace,
            cli.factory,
            trigger_tx,
            shutdown_tx.subscribe(),
        )
        .instrument(info_span!("registry")),
    );

    // ─────────────────────────────────────────────────────────────────────────
    // ✅ READY
    // ─────────────────────────────────────────────────────────────────────────
    info!("✅ Beatchain ready");
    info!("   ⚡ GraphQL:  http://localhost:{}/graphql", graphql_port);
    if metrics_enabled {
        info!(
            "   📊 Metrics:  http://localhost:{}/metrics",
            cli.metrics_port
        );
    } else {
        info!("   📊 Metrics:  disabled");
    }
    info!("   Press Ctrl+C to stop");

    shutdown_signal().await;

    // ─────────────────────────────────────────────────────────────────────────
    // 🛑 SHUTDOWN
    // ─────────────────────────────────────────────────────────────────────────
    info!("🛑 Shutting down...");
    let _ = shutdown_tx.send(true);

    match tokio::time::timeout(Duration::from_secs(30), service_handle).await {
        Ok(_) => debug!("Marketplace service stopped"),
        Err(_) => warn!("⚠️  Marketplace service shutdown timed out"),
    }

    match tokio::time::timeout(Duration::from_secs(10), graphql_handle).await {
        Ok(_) => debug!("GraphQL stopped"),
        Err(_) => warn!("⚠️  GraphQL shutdown timed out"),
    }

    watcher_handle.abort();
    #[cfg(unix)]
    reload_handle.abort();

    info!("🛑 Shutdown complete");
    Ok(())
}

/// Initialize tracing subscriber.
fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .init();
    }
}

/// Build the registry from the network file plus command-line overrides.
///
/// Overrides apply to the chain connected at startup.
fn load_registry(cli: &Cli, chain_id: ChainId) -> Result<NetworkRegistry> {
    let registry = match &cli.networks {
        Some(path) => read_registry(path)?,
        None => NetworkRegistry::new(),
    };
    Ok(apply_overrides(registry, chain_id, cli.marketplace, cli.factory))
}

fn read_registry(path: &Path) -> Result<NetworkRegistry> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read network file {}", path.display()))?;
    NetworkRegistry::from_json_str(&json)
        .with_context(|| format!("Failed to load network file {}", path.display()))
}

fn apply_overrides(
    mut registry: NetworkRegistry,
    chain_id: ChainId,
    marketplace: Option<Address>,
    factory: Option<Address>,
) -> NetworkRegistry {
    if marketplace.is_none() && factory.is_none() {
        return registry;
    }

    let mut deployment = registry
        .resolve(chain_id)
        .cloned()
        .unwrap_or_else(|| NetworkDeployment::new(chain_id));
    if marketplace.is_some() {
        deployment.marketplace = marketplace;
    }
    if factory.is_some() {
        deployment.factory = factory;
    }
    registry.insert(deployment);
    registry
}

/// Poll the node's chain id and report switches and connection loss.
async fn watch_chain<G: LedgerGateway>(
    gateway: Arc<G>,
    triggers: mpsc::Sender<RefreshTrigger>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut connected = true;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown_rx.changed() => return,
        }

        let trigger = match gateway.chain_id().await {
            Ok(chain_id) => {
                connected = true;
                RefreshTrigger::NetworkChanged(chain_id)
            }
            Err(e) if connected => {
                warn!(error = %e, "🔌 Lost connection to the node");
                connected = false;
                RefreshTrigger::Disconnected
            }
            Err(e) => {
                debug!(error = %e, "Node still unreachable");
                continue;
            }
        };

        if triggers.send(trigger).await.is_err() {
            debug!("Trigger channel closed");
            return;
        }
    }
}

/// Reload the network file on SIGHUP.
#[cfg(unix)]
async fn reload_on_hangup(
    networks: Option<PathBuf>,
    chain_id: ChainId,
    marketplace: Option<Address>,
    factory: Option<Address>,
    triggers: mpsc::Sender<RefreshTrigger>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut hangup = match signal::unix::signal(signal::unix::SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(e) => {
            warn!(error = %e, "⚠️  Failed to install SIGHUP handler, network file reload disabled");
            return;
        }
    };

    loop {
        tokio::select! {
            received = hangup.recv() => {
                if received.is_none() {
                    return;
                }
            }
            _ = shutdown_rx.changed() => return,
        }

        let Some(path) = &networks else {
            info!("No network file configured, nothing to reload");
            continue;
        };

        let registry = match read_registry(path) {
            Ok(registry) => registry,
            Err(e) => {
                error!(error = ?e, "❌ Network file reload failed, keeping current registry");
                continue;
            }
        };

        let registry = apply_overrides(registry, chain_id, marketplace, factory);

        if triggers.send(RefreshTrigger::RegistryChanged(registry)).await.is_err() {
            return;
        }
    }
}

/// Mask password in RPC URL for logging.
fn mask_password(url_str: &str) -> String {
    match url::Url::parse(url_str) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some("****"));
            }
            url.to_string()
        }
        Err(_) => url_str.to_string(),
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "❌ Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "❌ Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
