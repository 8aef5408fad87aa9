//! HTTP/WebSocket API for the dice server.
//!
//! # Endpoints
//!
//! - `GET /ws` - WebSocket carrying the JSON game protocol
//! - `GET /health` - Database and lock store health
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use dg_server::api::{AppState, create_router};
//! # use dice_game::GameServices;
//! # use std::sync::Arc;
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let state: AppState = unimplemented!();
//!
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # CORS
//!
//! CORS is configured permissively for development. In production, configure
//! appropriate origins, methods, and headers.

pub mod connections;
pub mod websocket;

pub use connections::ConnectionTracker;

use async_trait::async_trait;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
};
use dice_game::{GameServices, RedisLock, db::Database};
use serde_json::json;
use std::{sync::Arc, time::Duration};
use tower_http::cors::CorsLayer;

/// Probes for the stores behind the game services.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn database_healthy(&self) -> bool;
    async fn lock_store_healthy(&self) -> bool;
}

/// Health probe over the production PostgreSQL pool and Redis lock.
pub struct StoreHealth {
    pub database: Database,
    pub lock: RedisLock,
    pub timeout: Duration,
}

#[async_trait]
impl HealthProbe for StoreHealth {
    async fn database_healthy(&self) -> bool {
        matches!(
            tokio::time::timeout(self.timeout, self.database.health_check()).await,
            Ok(Ok(()))
        )
    }

    async fn lock_store_healthy(&self) -> bool {
        self.lock.ping().await.is_ok()
    }
}

/// Application state shared across all HTTP handlers and WebSocket connections.
///
/// Cloned for each request (cheap due to Arc wrappers).
#[derive(Clone)]
pub struct AppState {
    /// Ledger, lock and resolver every session drives
    pub services: GameServices,
    /// Store probes for `/health`
    pub health: Arc<dyn HealthProbe>,
    /// Live WebSocket sessions and the shutdown flag they watch
    pub connections: Arc<ConnectionTracker>,
}

/// Create the API router with all endpoints and middleware.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(websocket::websocket_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` if both stores answer, or `503 Service Unavailable` if
/// either fails.
///
/// ```bash
/// curl http://localhost:8080/health
/// # {"status":"healthy","database":true,"lock_store":true,"timestamp":"2026-01-01T10:30:00Z"}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let (db_healthy, lock_healthy) = tokio::join!(
        state.health.database_healthy(),
        state.health.lock_store_healthy()
    );

    let overall_healthy = db_healthy && lock_healthy;

    let status_code = if overall_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if overall_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": db_healthy,
        "lock_store": lock_healthy,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
