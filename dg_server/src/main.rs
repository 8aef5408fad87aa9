//! Dice wagering server.
//!
//! Serves the JSON game protocol over WebSocket, with wallets in PostgreSQL
//! and per-client play locks in Redis.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Error};
use dg_server::{
    api::{self, AppState, ConnectionTracker, StoreHealth},
    config::{CliOverrides, ServerConfig},
    logging, metrics,
};
use dice_game::{
    BetType, GameServices, RedisLock, RoundResolver, SeededRoller, WalletManager,
    db::Database, game::theoretical_rtp,
};
use log::{info, warn};
use pico_args::Arguments;

const HELP: &str = "\
Run the dice wagering server

USAGE:
  dg_server [OPTIONS]

OPTIONS:
  --bind          IP:PORT  Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:8080]
  --db-url        URL      Database connection string  [default: env DATABASE_URL]
  --redis-url     URL      Lock store connection string  [default: env REDIS_URL or redis://127.0.0.1:6379/0]
  --metrics-bind  IP:PORT  Prometheus scrape endpoint  [default: env METRICS_BIND, disabled if unset]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  DATABASE_URL             PostgreSQL connection string
  REDIS_URL                Redis connection string
  STARTING_BALANCE         Balance for new wallets  [default: 500]
  MAX_BET_AMOUNT           Largest accepted bet  [default: 250]
  LOCK_TTL_SECS            Play lock lifetime  [default: 30]
  (See .env.example for all configuration options)
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        return Ok(());
    }

    let overrides = CliOverrides {
        bind: pargs.opt_value_from_str("--bind")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
        redis_url: pargs.opt_value_from_str("--redis-url")?,
        metrics_bind: pargs.opt_value_from_str::<_, SocketAddr>("--metrics-bind")?,
    };

    let remaining = pargs.finish();
    if !remaining.is_empty() {
        anyhow::bail!("Unrecognized arguments: {:?}", remaining);
    }

    logging::init();

    let config = ServerConfig::from_env(overrides)?;
    config.validate()?;
    let game = &config.game;

    info!("Starting dice server at {}", config.bind);
    info!(
        "Starting balance {}, max bet {}, lock TTL {:?} (worst-case play {:?}), RTP {:.4}",
        game.starting_balance,
        game.max_bet_amount,
        game.lock_ttl,
        game.worst_case_play(),
        theoretical_rtp(BetType::Under)
    );

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(anyhow::Error::msg)?;
        info!("Prometheus metrics at http://{}/metrics", addr);
    }

    // Initialize database
    let db = Database::new(&config.database)
        .await
        .context("Failed to connect to database")?;
    db.ensure_schema()
        .await
        .context("Failed to create wallet schema")?;
    info!("Database connected successfully");

    let lock = RedisLock::connect(&config.redis_url, game.lock_ttl, game.lock_op_timeout)
        .await
        .context("Failed to connect to lock store")?;
    if let Err(e) = lock.ping().await {
        warn!("Lock store did not answer PING at startup: {}", e);
    }

    let pool = Arc::new(db.pool().clone());
    let wallet_manager = WalletManager::new(pool, game.starting_balance)
        .with_timeouts(game.query_timeout, game.transaction_timeout);

    let services = GameServices::new(
        Arc::new(wallet_manager),
        Arc::new(lock.clone()),
        RoundResolver::new(Arc::new(SeededRoller::from_entropy())),
        game.max_bet_amount,
    );

    let connections = Arc::new(ConnectionTracker::new());

    let api_state = AppState {
        services,
        health: Arc::new(StoreHealth {
            database: db.clone(),
            lock,
            timeout: game.query_timeout,
        }),
        connections: Arc::clone(&connections),
    };

    let app = api::create_router(api_state);

    // Start HTTP server
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    info!(
        "Server is running at ws://{}/ws. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(Arc::clone(&connections)))
        .await
        .context("Server error")?;

    info!("Shutting down server...");

    // Wagers in flight still need the pool
    let drain = game.worst_case_play();
    if !connections.wait_idle(drain).await {
        warn!(
            "{} connections still open after {:?}, closing the database anyway",
            connections.live(),
            drain
        );
    }
    db.close().await;

    Ok(())
}

/// Graceful shutdown signal; also tells open sessions to wind down
async fn shutdown_signal(connections: Arc<ConnectionTracker>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested, {} connections open", connections.live());
    connections.begin_shutdown();
}
