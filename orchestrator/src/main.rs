//! Process entry point: load configuration, connect both chain adapters,
//! wire C1–C10 together, and serve the API and push-channel routers.

use std::net::SocketAddr;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use swap_orchestrator::api::{self, AppState};
use swap_orchestrator::chain::evm::EvmChainAdapter;
use swap_orchestrator::chain::terra::TerraChainAdapter;
use swap_orchestrator::chain::ChainAdapter;
use swap_orchestrator::config::Config;
use swap_orchestrator::coordinator::{Coordinator, SessionEvent};
use swap_orchestrator::monitor::{EventMonitor, MonitorConfig, MonitorEvent};
use swap_orchestrator::notifier::Notifier;
use swap_orchestrator::oracle::HttpPriceOracle;
use swap_orchestrator::quote::Quoter;
use swap_orchestrator::secret::SecretManager;
use swap_orchestrator::store::SessionStore;

use multichain_rs::evm::{EvmAdapter, EvmAdapterConfig};
use multichain_rs::terra::{TerraAdapter, TerraAdapterConfig};
use multichain_rs::ChainTag;

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> eyre::Result<()> {
    init_logging();
    info!("starting swap-orchestrator");

    let config = Config::load()?;
    info!(
        evm_chain_id = config.evm.chain_id,
        destination_chain_id = %config.destination.chain_id,
        "configuration loaded"
    );

    let evm_adapter = EvmAdapter::connect(EvmAdapterConfig {
        rpc_urls: config.evm.rpc_urls.clone(),
        chain_id: config.evm.chain_id,
        escrow_address: config.evm.escrow_address.clone(),
        private_key: config.evm.private_key.clone(),
        required_confirmations: config.evm.required_confirmations,
    })
    .await?;
    let source_adapter: Arc<dyn ChainAdapter> = Arc::new(EvmChainAdapter::new(evm_adapter));

    let terra_adapter = TerraAdapter::connect(TerraAdapterConfig {
        lcd_url: config.destination.lcd_url.clone(),
        fallback_lcd_urls: config.destination.fallback_lcd_urls.clone(),
        chain_id: config.destination.chain_id.clone(),
        mnemonic: config.destination.mnemonic.clone(),
        bech32_prefix: config.destination.bech32_prefix.clone(),
        escrow_address: config.destination.escrow_address.clone(),
        gas_denom: config.destination.gas_denom.clone(),
        gas_price: config.destination.gas_price,
        required_confirmations: config.destination.required_confirmations,
    })?;
    let destination_adapter: Arc<dyn ChainAdapter> = Arc::new(TerraChainAdapter::new(terra_adapter));

    let store = Arc::new(SessionStore::new(config.store));
    let secrets = Arc::new(SecretManager::with_lifetime_hours(config.secret_lifetime_hours));
    let notifier = Arc::new(Notifier::with_backlog(config.notifier_backlog));
    let oracle = Arc::new(HttpPriceOracle::new(config.oracle.base_url.clone())?);
    let quoter = Arc::new(Quoter::new(config.quoter, oracle));

    let coordinator = Arc::new(Coordinator::new(
        Arc::clone(&store),
        Arc::clone(&secrets),
        Arc::clone(&notifier),
        Arc::clone(&source_adapter),
        Arc::clone(&destination_adapter),
        config.retry.clone(),
    ));

    let app_state = AppState {
        store: Arc::clone(&store),
        secrets: Arc::clone(&secrets),
        notifier: Arc::clone(&notifier),
        coordinator: Arc::clone(&coordinator),
        quoter,
        timelock: config.timelock.clone(),
        channels: Default::default(),
        listener_seq: Arc::new(AtomicU64::new(0)),
    };

    let (shutdown_tx, _shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(wait_for_shutdown_signal(shutdown_tx));

    let (monitor_tx, monitor_rx) = mpsc::channel::<MonitorEvent>(256);
    spawn_monitor(
        ChainTag::Source,
        Arc::clone(&source_adapter),
        MonitorConfig {
            poll_interval: config.polling.source_interval,
            reorg_buffer_blocks: config.polling.max_reorg_depth,
            retry: config.retry.clone(),
        },
        monitor_tx.clone(),
    );
    spawn_monitor(
        ChainTag::Destination,
        Arc::clone(&destination_adapter),
        MonitorConfig {
            poll_interval: config.polling.destination_interval,
            reorg_buffer_blocks: config.polling.max_reorg_depth,
            retry: config.retry.clone(),
        },
        monitor_tx,
    );
    tokio::spawn(dispatch_monitor_events(
        monitor_rx,
        Arc::clone(&store),
        app_state.channels.clone(),
    ));

    tokio::spawn(sweep_task(Arc::clone(&store), Arc::clone(&secrets)));

    swap_orchestrator::metrics::UP.set(1.0);

    let api_addr = SocketAddr::from(([0, 0, 0, 0], config.listen_port));
    let push_addr = SocketAddr::from(([0, 0, 0, 0], config.push_channel_port));
    info!(%api_addr, %push_addr, "serving API and push channel");

    let api_listener = tokio::net::TcpListener::bind(api_addr).await?;
    let push_listener = tokio::net::TcpListener::bind(push_addr).await?;

    tokio::select! {
        result = axum::serve(api_listener, api::router(app_state.clone())) => {
            if let Err(e) = result {
                error!(error = %e, "API server exited");
            }
        }
        result = axum::serve(push_listener, api::push_channel_router(app_state)) => {
            if let Err(e) = result {
                error!(error = %e, "push channel server exited");
            }
        }
    }

    info!("swap-orchestrator stopped");
    Ok(())
}

/// Spawn one `EventMonitor` per chain. Each runs until the process exits;
/// the monitor's own shutdown channel is unused at top level since the
/// process terminates the task on exit rather than draining it gracefully.
fn spawn_monitor(
    chain: ChainTag,
    adapter: Arc<dyn ChainAdapter>,
    config: MonitorConfig,
    out: mpsc::Sender<MonitorEvent>,
) {
    let (_shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        let monitor = EventMonitor::new(chain, adapter, config);
        monitor.run(out, shutdown_rx).await;
    });
}

/// Route monitor output to the session driver it concerns: a matched
/// event goes to the one session whose hashlock matches, a reorg notice
/// fans out to every active session (both chains are shared by every
/// session this process drives).
async fn dispatch_monitor_events(
    mut events: mpsc::Receiver<MonitorEvent>,
    store: Arc<SessionStore>,
    channels: api::SessionChannels,
) {
    while let Some(event) = events.recv().await {
        match event {
            MonitorEvent::Chain(chain_event) => {
                let session = match store.find_by_hashlock(&chain_event.hashlock) {
                    Some(s) => s,
                    None => continue,
                };
                let channels = channels.read().await;
                if let Some(sender) = channels.get(&session.id) {
                    if sender.send(SessionEvent::Chain(chain_event)).await.is_err() {
                        warn!(session_id = %session.id, "session driver channel closed");
                    }
                }
            }
            MonitorEvent::Reorg { chain, from_height } => {
                let channels = channels.read().await;
                for (session_id, sender) in channels.iter() {
                    if sender
                        .send(SessionEvent::Reorg { chain, from_height })
                        .await
                        .is_err()
                    {
                        warn!(session_id, "session driver channel closed during reorg fan-out");
                    }
                }
            }
        }
    }
}

async fn sweep_task(store: Arc<SessionStore>, secrets: Arc<SecretManager>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(300));
    loop {
        ticker.tick().await;
        let sessions_removed = store.sweep_expired();
        let secrets_removed = secrets.sweep_expired();
        if sessions_removed > 0 || secrets_removed > 0 {
            info!(sessions_removed, secrets_removed, "periodic sweep complete");
        }
    }
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,swap_orchestrator=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(filter)
        .init();
}

async fn wait_for_shutdown_signal(shutdown_tx: mpsc::Sender<()>) {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c, shutting down"),
        _ = terminate => info!("received sigterm, shutting down"),
    }
    let _ = shutdown_tx.send(()).await;
}
