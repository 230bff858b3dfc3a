#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! `phantomd` entrypoint: parse CLI flags, merge the coin-config overlay,
//! bootstrap the address store and block-hash ring from remote explorers /
//! DNS seeds / the persistent cache, then hand off to the supervisor.
//!
//! Exits non-zero only on a fatal configuration error (spec §7
//! `ConfigError`); once the supervisor is running, the only way this
//! process stops is the restart watchdog's `exit(0)` or a signal.

use std::net::SocketAddrV4;
use std::sync::{Arc, Mutex};

use clap::Parser;
use tracing::{error, info, warn};

use phantomd::core::analyzer::SenseTriple;
use phantomd::core::block_ring::BlockRing;
use phantomd::core::broadcast_store::BroadcastStore;
use phantomd::core::config::{self, CliArgs, DaemonConfig};
use phantomd::core::types::Peer;
use phantomd::monitoring::metrics::Metrics;
use phantomd::networking::dns_seed;
use phantomd::networking::peer_fsm::PeerFsmConfig;
use phantomd::networking::peer_store::PeerStore;
use phantomd::networking::remote_chain;
use phantomd::ping_generator::PingGeneratorConfig;
use phantomd::storage::peer_cache::PeerCache;
use phantomd::supervisor::{self, SupervisorConfig};

fn init_logging(debug: bool) {
    let filter = if debug { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .json()
        .try_init();
}

fn load_config(cli: &CliArgs) -> anyhow::Result<DaemonConfig> {
    let coin = match &cli.coin_conf {
        Some(path) => match config::load_coin_conf(path) {
            Ok(c) => Some(c),
            Err(err) => {
                warn!(%path, error = %err, "coin config not readable, proceeding with CLI/defaults only");
                None
            }
        },
        None => None,
    };
    Ok(config::merge(cli, coin.as_ref())?)
}

/// Seed the peer store and block-hash ring from every bootstrap source
/// before any peer is dialed: the persistent peer cache, the literal
/// `bootstrap_ips` list, DNS seeds, remote-chain explorers, and finally
/// `bootstrap_hash` as a last-resort ring seed. Each source's failure is
/// logged and skipped (`BootstrapError`, spec §7); a missing ring seed
/// merely leaves the ping generator idle until 12 hashes accumulate from
/// gossip.
async fn bootstrap(
    cfg: &DaemonConfig,
    peer_store: &PeerStore,
    block_ring: &Mutex<BlockRing>,
    cache: Option<&PeerCache>,
) {
    if let Some(cache) = cache {
        let cached = cache.load_all();
        if !cached.is_empty() {
            info!(count = cached.len(), "seeded peer store from persistent cache");
            peer_store.store_peers(cached);
        }
    }

    for ip_port in &cfg.bootstrap_ips {
        match ip_port.parse::<SocketAddrV4>() {
            Ok(sock) => peer_store.store_peer(Peer {
                address: *sock.ip(),
                port: sock.port(),
                last_seen_unix: 0,
            }),
            Err(_) => warn!(%ip_port, "skipping unparseable bootstrap_ip"),
        }
    }

    let dns_peers = dns_seed::resolve_all(&cfg.dns_seeds, cfg.port).await;
    if !dns_peers.is_empty() {
        info!(count = dns_peers.len(), "seeded peer store from DNS seeds");
        peer_store.store_peers(dns_peers);
    }

    let mut ring_seeded = false;
    for chain_def in &cfg.bootstrap_chains {
        let chain = match remote_chain::from_format(
            &chain_def.format,
            chain_def.url.clone(),
            chain_def.username.clone(),
            chain_def.password.clone(),
        ) {
            Ok(c) => c,
            Err(err) => {
                warn!(format = %chain_def.format, url = %chain_def.url, error = %err, "unknown remote chain format");
                continue;
            }
        };

        match chain.get_peers(cfg.port).await {
            Ok(peers) if !peers.is_empty() => {
                info!(count = peers.len(), url = %chain_def.url, "seeded peer store from remote chain");
                peer_store.store_peers(peers);
            }
            Ok(_) => {}
            Err(err) => warn!(url = %chain_def.url, error = %err, "remote chain get_peers failed"),
        }

        if ring_seeded {
            continue;
        }
        match chain.get_chain_height().await {
            Ok(height) if height > 12 => match chain.get_block_hash(height - 12).await {
                Ok(hash) => {
                    block_ring
                        .lock()
                        .expect("block ring mutex poisoned")
                        .force_hash(hash);
                    info!(height = height - 12, url = %chain_def.url, "seeded block ring from remote chain");
                    ring_seeded = true;
                }
                Err(err) => warn!(url = %chain_def.url, error = %err, "remote chain get_block_hash failed"),
            },
            Ok(_) => warn!(url = %chain_def.url, "remote chain height too low to seed top-minus-12"),
            Err(err) => warn!(url = %chain_def.url, error = %err, "remote chain get_chain_height failed"),
        }
    }

    if !ring_seeded {
        if let Some(hash) = cfg.bootstrap_hash {
            info!("seeding block ring from configured bootstrap_hash");
            block_ring.lock().expect("block ring mutex poisoned").force_hash(hash);
        } else {
            warn!("no block ring seed available yet; ping generator will wait for gossip to fill the ring");
        }
    }
}

fn static_sense(cfg: &DaemonConfig) -> Option<SenseTriple> {
    match (cfg.sentinel_version, cfg.daemon_version) {
        (Some(sentinel_version), Some(daemon_version)) => Some(SenseTriple {
            outpoint_form: true,
            sentinel_version,
            daemon_version,
        }),
        _ => None,
    }
}

async fn serve_metrics(metrics: Arc<Metrics>) {
    use axum::extract::State;
    use axum::routing::get;
    use axum::Router;
    use prometheus::Encoder;

    async fn handler(State(metrics): State<Arc<Metrics>>) -> String {
        let encoder = prometheus::TextEncoder::new();
        let families = metrics.registry.gather();
        let mut buf = Vec::new();
        if encoder.encode(&families, &mut buf).is_err() {
            return String::new();
        }
        String::from_utf8(buf).unwrap_or_default()
    }

    let app = Router::new()
        .route("/metrics", get(handler))
        .with_state(metrics);
    let listener = match tokio::net::TcpListener::bind("127.0.0.1:9100").await {
        Ok(l) => l,
        Err(err) => {
            warn!(error = %err, "metrics listener failed to bind, metrics endpoint disabled");
            return;
        }
    };
    if let Err(err) = axum::serve(listener, app).await {
        warn!(error = %err, "metrics server stopped");
    }
}

#[tokio::main]
async fn main() {
    let cli = CliArgs::parse();
    init_logging(cli.debug);

    let cfg = match load_config(&cli) {
        Ok(c) => c,
        Err(err) => {
            error!(error = %err, "fatal configuration error");
            std::process::exit(1);
        }
    };
    info!(max_connections = cfg.max_connections, min_connections = cfg.min_connections, autosense = cfg.autosense, "phantomd starting");

    let metrics = match Metrics::new() {
        Ok(m) => Arc::new(m),
        Err(err) => {
            error!(?err, "failed to initialize metrics registry");
            std::process::exit(1);
        }
    };
    tokio::spawn(serve_metrics(metrics.clone()));

    let peer_cache = match PeerCache::open(&cfg.db_path) {
        Ok(cache) => Some(Arc::new(cache)),
        Err(err) => {
            warn!(error = %err, "peer cache unavailable, continuing without persistence");
            None
        }
    };

    let peer_store = Arc::new(PeerStore::new());
    let block_ring = Arc::new(Mutex::new(BlockRing::new()));
    let broadcast_store = Arc::new(Mutex::new(BroadcastStore::new()));

    bootstrap(&cfg, &peer_store, &block_ring, peer_cache.as_deref().map(Arc::as_ref)).await;

    if peer_store.is_empty() {
        error!("no peer addresses discovered from any bootstrap source");
        std::process::exit(1);
    }

    let static_sense = static_sense(&cfg);
    if static_sense.is_some() {
        info!("sentinel_version and daemon_version both set; auto-sense disabled");
    }

    let fsm_cfg = PeerFsmConfig {
        magic: cfg.magicbytes,
        protocol_number: cfg.protocol_number,
        user_agent: cfg.user_agent.clone(),
        bootstrap_locator: cfg.bootstrap_hash.unwrap_or([0u8; 32]),
        ..Default::default()
    };

    let ping_generator_cfg = PingGeneratorConfig {
        masternode_conf_path: cfg.masternode_conf.clone(),
        magic_message: cfg.magic_message.clone(),
        magic_message_newline: cfg.magic_message_newline,
        ..Default::default()
    };

    let supervisor_cfg = SupervisorConfig {
        max_connections: cfg.max_connections as usize,
        min_connections: cfg.min_connections,
        noblock_minutes: cfg.noblock_minutes,
        autosense: cfg.autosense && static_sense.is_none(),
        static_sense,
        fsm: fsm_cfg,
        ping_generator: ping_generator_cfg,
    };

    let shutdown = tokio_util::sync::CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received shutdown signal");
            shutdown_signal.cancel();
        }
    });

    supervisor::run(
        supervisor_cfg,
        peer_store,
        block_ring,
        broadcast_store,
        peer_cache,
        shutdown,
        metrics,
    )
    .await;
}
