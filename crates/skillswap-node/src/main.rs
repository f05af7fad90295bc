//! skillswap-node — the SkillSwap backend server binary.
//!
//! Startup sequence:
//!   1. Open (or initialise) the document store
//!   2. Build the external-service clients from the environment
//!   3. Ensure the vector index schema exists
//!   4. Start the JSON-RPC 2.0 server
//!   5. Run the auto-complete sweeper until shutdown

mod config;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use skillswap_cache::{Cache, MemoryCache};
use skillswap_economy::{EconomyEngine, FlatDemand};
use skillswap_embed::{Embedder, HttpEmbedder};
use skillswap_index::{HttpVectorIndex, MemoryVectorIndex, VectorIndex};
use skillswap_match::{Matcher, SearchService};
use skillswap_messaging::{MessagingService, ModerationService};
use skillswap_notify::{HttpNotifier, NotificationService, Notifier, NullNotifier};
use skillswap_portfolio::{PortfolioService, ReviewService};
use skillswap_profiles::ProfileService;
use skillswap_rpc::{RpcServer, RpcServerState};
use skillswap_store::{LockMap, StoreDb};
use skillswap_swaps::{CompletionService, SwapService};

use config::Config;

#[derive(Parser, Debug)]
#[command(
    name = "skillswap-node",
    version,
    about = "SkillSwap backend — reciprocal skill-exchange platform core"
)]
struct Args {
    /// Directory for the persistent document store.
    #[arg(long, default_value = "~/.skillswap/data")]
    data_dir: PathBuf,

    /// JSON-RPC listen address.
    #[arg(long, default_value = "127.0.0.1:8585")]
    rpc_addr: SocketAddr,

    /// Auto-complete sweep cadence in seconds.
    #[arg(long, default_value_t = 60)]
    sweep_interval_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,skillswap=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let cfg = Config::from_env();
    info!("SkillSwap node starting");

    // ── Document store ────────────────────────────────────────────────────────
    let data_dir = expand_tilde(&args.data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data dir {}", data_dir.display()))?;
    let store = Arc::new(StoreDb::open(&data_dir).context("opening document store")?);
    let locks = Arc::new(LockMap::new());

    // ── External services ─────────────────────────────────────────────────────
    let mut status: Vec<(String, String)> = Vec::new();

    let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
    status.push(("cache".into(), "in-process".into()));

    let embedder: Option<Arc<dyn Embedder>> = match &cfg.embed {
        Some(e) => {
            status.push(("embeddings".into(), format!("{} (dim {})", e.model, e.dimension)));
            Some(Arc::new(HttpEmbedder::new(
                e.endpoint.clone(),
                e.api_key.clone(),
                e.model.clone(),
                e.dimension,
            )))
        }
        None => {
            warn!("EMBED_ENDPOINT/EMBED_API_KEY unset; search and matching disabled");
            status.push(("embeddings".into(), "disabled".into()));
            None
        }
    };

    let index: Arc<dyn VectorIndex> = match &cfg.index {
        Some(i) => {
            status.push(("vector_index".into(), format!("http ({})", i.collection)));
            Arc::new(HttpVectorIndex::new(
                i.url.clone(),
                i.api_key.clone(),
                i.collection.clone(),
                i.dimension,
            ))
        }
        None => {
            status.push(("vector_index".into(), "in-process".into()));
            Arc::new(MemoryVectorIndex::new())
        }
    };
    if let Err(e) = index.ensure_index().await {
        // The index is not the source of truth; keep serving and reconcile
        // via reindex once it is reachable.
        warn!(error = %e, "vector index schema check failed");
    }

    let notifier: Arc<dyn Notifier> = match &cfg.email {
        Some(e) => {
            status.push(("email".into(), format!("enabled (from {})", e.from)));
            Arc::new(HttpNotifier::new(
                e.api_url.clone(),
                e.api_key.clone(),
                e.from.clone(),
            ))
        }
        None => {
            status.push(("email".into(), "disabled".into()));
            Arc::new(NullNotifier)
        }
    };
    let notify = Arc::new(NotificationService::new(
        notifier,
        cache.clone(),
        cfg.app_url.clone(),
    ));

    // ── Domain services ───────────────────────────────────────────────────────
    let economy = Arc::new(EconomyEngine::new(
        store.clone(),
        locks.clone(),
        Arc::new(FlatDemand),
    ));
    let profiles = Arc::new(ProfileService::new(
        store.clone(),
        locks.clone(),
        embedder.clone(),
        index.clone(),
        cache.clone(),
        notify.clone(),
    ));
    let matcher = Arc::new(Matcher::new(
        store.clone(),
        embedder.clone(),
        index.clone(),
        notify.clone(),
    ));
    let search = Arc::new(SearchService::new(embedder, index, cache));
    let messaging = Arc::new(MessagingService::new(
        store.clone(),
        locks.clone(),
        notify.clone(),
    ));
    let moderation = Arc::new(ModerationService::new(store.clone()));
    let swaps = Arc::new(SwapService::new(
        store.clone(),
        locks.clone(),
        economy.clone(),
        messaging.clone(),
        notify.clone(),
    ));
    let completion = Arc::new(CompletionService::new(
        store.clone(),
        locks.clone(),
        economy.clone(),
        notify,
    ));
    let reviews = Arc::new(ReviewService::new(
        store.clone(),
        locks.clone(),
        economy.clone(),
    ));
    let portfolio = Arc::new(PortfolioService::new(store.clone(), locks));

    // ── Auto-complete sweeper ─────────────────────────────────────────────────
    let sweeper = completion.clone();
    let sweep_interval = Duration::from_secs(args.sweep_interval_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            let now = chrono::Utc::now().timestamp();
            match sweeper.sweep_auto_complete(now).await {
                Ok(0) => {}
                Ok(n) => info!(finalized = n, "auto-complete sweep"),
                Err(e) => warn!(error = %e, "auto-complete sweep failed"),
            }
        }
    });

    // ── RPC server ────────────────────────────────────────────────────────────
    let state = Arc::new(RpcServerState {
        store,
        profiles,
        matcher,
        search,
        swaps,
        completion,
        economy,
        messaging,
        moderation,
        reviews,
        portfolio,
        subsystem_status: status,
    });
    let _rpc_handle = RpcServer::new(state)
        .start(args.rpc_addr)
        .await
        .context("starting RPC server")?;

    info!("node ready");
    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    Ok(())
}

/// Expand a leading `~` to the user's home directory (`HOME` or `USERPROFILE`).
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
