//! Murmur Node - real-time fan-out relay server.

use anyhow::Context;
use clap::Parser;
use murmur_auth::{Identity, IdentityStore};
use murmur_node::api::{create_router, AppState};
use murmur_node::config::NodeConfig;
use murmur_node::observability::{init_logging, LogFormat};
use murmur_realtime::Relay;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Murmur Node - real-time fan-out relay
#[derive(Parser, Debug)]
#[command(name = "murmur-node")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "murmur.yaml")]
    config: PathBuf,

    /// API listen address
    #[arg(long)]
    api_addr: Option<SocketAddr>,

    /// Heartbeat period in milliseconds
    #[arg(long)]
    heartbeat_interval_ms: Option<u64>,

    /// History clear period in milliseconds
    #[arg(long)]
    history_clear_interval_ms: Option<u64>,

    /// Maximum messages replayed to a new session
    #[arg(long)]
    history_replay_cap: Option<usize>,

    /// Reject sessions without a valid token
    #[arg(long)]
    require_auth: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log format (pretty, json)
    #[arg(long)]
    log_format: Option<String>,
}

impl Args {
    fn apply(self, config: &mut NodeConfig) {
        if let Some(addr) = self.api_addr {
            config.api_addr = addr;
        }
        if let Some(ms) = self.heartbeat_interval_ms {
            config.heartbeat_interval_ms = ms;
        }
        if let Some(ms) = self.history_clear_interval_ms {
            config.history_clear_interval_ms = ms;
        }
        if self.history_replay_cap.is_some() {
            config.history_replay_cap = self.history_replay_cap;
        }
        if self.require_auth {
            config.require_auth = true;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
    }
}

fn seed_identities(config: &NodeConfig) -> anyhow::Result<IdentityStore> {
    let store = IdentityStore::new();
    for user in &config.users {
        let display_name = if user.display_name.is_empty() {
            user.id.clone()
        } else {
            user.display_name.clone()
        };
        let mut identity = Identity::new(user.id.clone(), display_name);
        identity.avatar_url = user.avatar_url.clone();

        store
            .register(identity)
            .with_context(|| format!("registering user {}", user.id))?;
        store.add_token(&user.id, &user.token)?;
    }
    Ok(store)
}

async fn shutdown_signal(cancel: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
    cancel.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = NodeConfig::load(Some(&args.config)).context("loading configuration")?;
    args.apply(&mut config);
    config.validate()?;

    init_logging(&config.log_level, LogFormat::parse(&config.log_format));

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Murmur node");
    tracing::info!(
        api_addr = %config.api_addr,
        heartbeat_interval_ms = config.heartbeat_interval_ms,
        history_clear_interval_ms = config.history_clear_interval_ms,
        history_replay_cap = ?config.history_replay_cap,
        require_auth = config.require_auth,
        users = config.users.len(),
        "Node configuration"
    );

    let identities = seed_identities(&config)?;
    let relay = Arc::new(Relay::new(config.relay_config()));
    let cancel = CancellationToken::new();
    let tasks = relay.start(&cancel);

    let app = create_router(AppState {
        relay: relay.clone(),
        identities: Arc::new(identities),
        require_auth: config.require_auth,
    });

    let listener = tokio::net::TcpListener::bind(config.api_addr)
        .await
        .with_context(|| format!("binding {}", config.api_addr))?;
    tracing::info!(addr = %config.api_addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await
        .context("serving HTTP")?;

    tasks.shutdown().await;
    tracing::info!("Murmur node stopped");
    Ok(())
}
