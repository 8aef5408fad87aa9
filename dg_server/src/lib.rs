//! WebSocket server for the dice wagering game.
//!
//! Wires the [`dice_game`] session engine to an axum WebSocket route, backed
//! by PostgreSQL for wallets and Redis for per-client locks.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
