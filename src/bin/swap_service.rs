use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Parser as _;
use ed25519_dalek::SigningKey;
use highload_swap::assets::AssetCatalog;
use highload_swap::config::{ServiceTiming, SwapPolicy};
use highload_swap::notify::{LogNotifier, Notifier, TelegramNotifier};
use highload_swap::service::{Shutdown, drain, spawn_periodic};
use highload_swap::swap::orchestrator::{OrchestratorConfig, SwapOrchestrator};
use highload_swap::swap::reconciler::{ReconcilerConfig, ResultReconciler};
use highload_swap::swap::store::SqliteSwapStore;
use highload_swap::venue::ExecutionVenue;
use highload_swap::venue::routing::RoutingClient;
use highload_swap::wallet::rpc::TonRpcClient;
use highload_swap::wallet::{BatchSubmitter, DEFAULT_SUBWALLET_ID, HighloadWallet};

#[derive(Debug, clap::Parser)]
struct Args {
    #[arg(long)]
    rpc_endpoint: String,

    #[arg(long)]
    rpc_token: Option<String>,

    #[arg(long)]
    routing_url: String,

    #[arg(long)]
    routing_api_key: Option<String>,

    #[arg(long)]
    wallet_address: String,

    /// Hex-encoded 32-byte ed25519 secret key.
    #[arg(long)]
    wallet_secret_key: String,

    #[arg(long, default_value_t = DEFAULT_SUBWALLET_ID)]
    subwallet_id: u32,

    #[arg(long)]
    store_path: PathBuf,

    #[arg(long)]
    bot_token: Option<String>,

    #[arg(long)]
    chat_id: Option<String>,

    #[arg(long)]
    topic_id: Option<i64>,

    #[arg(long)]
    referral: Option<String>,

    #[arg(long, default_value_t = 5_000)]
    swap_interval_ms: u64,

    #[arg(long, default_value_t = 5_100)]
    track_interval_ms: u64,

    #[arg(long, default_value_t = 450)]
    inter_task_delay_ms: u64,

    #[arg(long, default_value_t = 10)]
    max_swaps_per_cycle: usize,

    #[arg(long, default_value_t = 10)]
    max_tracks_per_cycle: usize,

    #[arg(long, default_value_t = 10)]
    shutdown_grace_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    highload_swap::logging::init().ok();

    let args = Args::parse();

    let secret = hex::decode(&args.wallet_secret_key).context("decode wallet_secret_key hex")?;
    let secret: [u8; 32] = secret
        .try_into()
        .map_err(|_| anyhow::anyhow!("wallet_secret_key must be 32 bytes"))?;
    let signing_key = SigningKey::from_bytes(&secret);

    let notifier: Arc<dyn Notifier> = match (args.bot_token, args.chat_id) {
        (Some(token), Some(chat_id)) => {
            Arc::new(TelegramNotifier::new(token, chat_id, args.topic_id))
        }
        (None, None) => Arc::new(LogNotifier),
        _ => anyhow::bail!("bot_token and chat_id must be provided together"),
    };

    let timing = ServiceTiming {
        swap_interval: Duration::from_millis(args.swap_interval_ms),
        track_interval: Duration::from_millis(args.track_interval_ms),
        inter_task_delay: Duration::from_millis(args.inter_task_delay_ms),
        max_swaps_per_cycle: args.max_swaps_per_cycle,
        max_tracks_per_cycle: args.max_tracks_per_cycle,
        shutdown_grace: Duration::from_secs(args.shutdown_grace_secs),
    };

    let catalog = Arc::new(AssetCatalog::mainnet());
    let policy = SwapPolicy::mainnet();

    let store = Arc::new(Mutex::new(
        SqliteSwapStore::open(args.store_path).context("open swap store")?,
    ));

    let wallet: Arc<dyn BatchSubmitter> = Arc::new(HighloadWallet::new(
        args.wallet_address,
        signing_key,
        args.subwallet_id,
        TonRpcClient::new(args.rpc_endpoint, args.rpc_token),
    ));

    let venue: Arc<dyn ExecutionVenue> =
        Arc::new(RoutingClient::new(args.routing_url, args.routing_api_key));

    let supported: Vec<String> = policy
        .supported
        .iter()
        .filter_map(|id| catalog.by_id(*id))
        .map(|asset| asset.symbol.clone())
        .collect();
    tracing::info!(assets = ?supported, "starting asset swapper");
    notifier
        .send(&format!(
            "Starting asset swapper, supported assets are: [{}]",
            supported.join(", ")
        ))
        .await;

    let orchestrator = Arc::new(SwapOrchestrator::new(
        venue.clone(),
        wallet,
        notifier.clone(),
        store.clone(),
        catalog.clone(),
        policy,
        OrchestratorConfig {
            max_tasks_per_cycle: timing.max_swaps_per_cycle,
            inter_task_delay: timing.inter_task_delay,
            referral: args.referral,
            ..OrchestratorConfig::default()
        },
    ));

    let reconciler = Arc::new(ResultReconciler::new(
        venue,
        notifier.clone(),
        store,
        catalog,
        ReconcilerConfig {
            max_tasks_per_cycle: timing.max_tracks_per_cycle,
            ..ReconcilerConfig::default()
        },
    ));

    let shutdown = Shutdown::new();
    let handles = vec![
        spawn_periodic(
            "swapper",
            timing.swap_interval,
            shutdown.subscribe(),
            notifier.clone(),
            {
                let orchestrator = orchestrator.clone();
                move || {
                    let orchestrator = orchestrator.clone();
                    async move { orchestrator.run_cycle().await.map(|_| ()) }
                }
            },
        ),
        spawn_periodic(
            "tracker",
            timing.track_interval,
            shutdown.subscribe(),
            notifier.clone(),
            {
                let reconciler = reconciler.clone();
                move || {
                    let reconciler = reconciler.clone();
                    async move { reconciler.run_cycle().await.map(|_| ()) }
                }
            },
        ),
    ];

    tokio::signal::ctrl_c().await.context("wait for ctrl-c")?;
    tracing::info!("received interrupt, stopping services");
    notifier.send("Received interrupt, stopping services").await;

    shutdown.trigger();
    drain(handles, timing.shutdown_grace).await;
    tracing::info!("exiting");
    Ok(())
}
