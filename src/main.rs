mod api;
mod auth;
mod cache;
mod catalog;
mod commands;
mod config;
mod session;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::auth::AuthController;
use crate::cache::QueryCache;
use crate::catalog::{CachedCatalogClient, CatalogClient};
use crate::session::SessionStore;

#[derive(Parser, Debug)]
#[command(name = "kitdex")]
#[command(about = "A command-line client for a model kit collection catalog")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/kitdex/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: commands::Command,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = init_logging();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;

  // Wire the client stack explicitly: session store, transport, cache, and
  // the auth controller that listens for unauthorized notices.
  let store = SessionStore::open()?;
  let http = api::HttpClient::new(config.base_url()?, config.timeout(), store.clone())?;
  let unauthorized_rx = http.subscribe_unauthorized();
  let client = CatalogClient::new(http);
  let cache = QueryCache::new();
  let catalog = CachedCatalogClient::new(client.clone(), cache.clone());
  let mut auth = AuthController::new(client, cache, store, unauthorized_rx);
  auth.initialize();

  let mut ctx = commands::Context {
    auth,
    catalog,
    default_page_size: config.default_page_size,
  };
  commands::run(&mut ctx, args.command).await
}

/// Log to a file under the platform data dir; the terminal stays clean for
/// command output. Level comes from KITDEX_LOG (default "info").
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
  let log_dir = dirs::data_dir()?.join("kitdex").join("logs");
  std::fs::create_dir_all(&log_dir).ok()?;

  let appender = tracing_appender::rolling::daily(log_dir, "kitdex.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let filter = EnvFilter::try_from_env("KITDEX_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Some(guard)
}
