//! switchboard server binary.
//!
//! Reads `switchboard.toml` (or the path given with `--config`) plus
//! `SWITCHBOARD_*` environment overrides, opens the SQLite identity store,
//! checks that both platforms are reachable, and runs the two event loops.
//!
//! ```toml
//! store_path = "~/.local/share/switchboard/bridge.db"
//!
//! [bridge]
//! topic_chat  = -1001234567890
//! superadmins = [11111111]
//! announce    = "both"
//!
//! [telegram]
//! token          = "123:abc"
//! broadcast_chat = -1009876543210
//!
//! [gateway]
//! send_url = "http://127.0.0.1:3000/send"
//! port     = 8088
//! ```

use std::{
  future::IntoFuture as _,
  path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::Parser;
use serde::Deserialize;
use switchboard_bridge::{
  Bridge, BridgeConfig,
  adapters::{
    gateway::{self, GatewayClient, GatewayConfig},
    telegram::{TelegramClient, TelegramConfig},
  },
};
use switchboard_store_sqlite::SqliteStore;
use tokio::{net::TcpListener, sync::mpsc};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Inbound events buffered per platform before the transport is slowed down.
const EVENT_BUFFER: usize = 256;

#[derive(Parser)]
#[command(author, version, about = "Bridge external contacts into group-chat threads")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "switchboard.toml")]
  config: PathBuf,
}

#[derive(Deserialize)]
struct ServiceConfig {
  #[serde(default = "default_store_path")]
  store_path: PathBuf,
  bridge:     BridgeConfig,
  telegram:   TelegramConfig,
  gateway:    GatewayConfig,
}

fn default_store_path() -> PathBuf { PathBuf::from("switchboard.db") }

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("SWITCHBOARD")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("bridge.superadmins"),
    )
    .build()
    .context("failed to read config file")?;

  let service: ServiceConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServiceConfig")?;

  let store_path = expand_tilde(&service.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  // Both platforms must be reachable before any event is accepted.
  let telegram = TelegramClient::new(&service.telegram, service.bridge.topic_chat)?;
  let me = telegram
    .get_me()
    .await
    .context("telegram is unreachable")?;
  tracing::info!(bot = ?me.username, "connected to telegram");

  let gateway_client = GatewayClient::new(service.gateway.clone())?;
  gateway_client
    .probe()
    .await
    .context("external gateway is unreachable")?;

  let broadcast = telegram.broadcast(service.telegram.broadcast_chat);
  let bridge = Bridge::new(
    store,
    gateway_client,
    telegram.clone(),
    broadcast,
    service.bridge,
  );

  let (internal_tx, internal_rx) = mpsc::channel(EVENT_BUFFER);
  let (external_tx, external_rx) = mpsc::channel(EVENT_BUFFER);

  let address = format!("{}:{}", service.gateway.host, service.gateway.port);
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;
  tracing::info!("gateway webhook listening on http://{address}/inbound");
  let webhook = gateway::inbound_router(external_tx, service.gateway.secret.clone());

  tokio::spawn(telegram.poll(internal_tx));

  tokio::select! {
    res = axum::serve(listener, webhook).into_future() => res.context("webhook server error")?,
    () = bridge.clone().run_internal(internal_rx) => {}
    () = bridge.run_external(external_rx) => {}
    res = tokio::signal::ctrl_c() => {
      res.context("failed to listen for ctrl-c")?;
      tracing::info!("shutting down");
    }
  }

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
