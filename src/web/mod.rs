//! HTTP layer.
//!
//! Axum router over shared state. Handlers take what they need out of
//! [`AppState`] through `tokio::sync::RwLock` guards held one at a time.

pub mod handlers;
pub mod session;

use anyhow::{anyhow, Result};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use log::info;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::games::PuzzleStore;
use crate::storage::Storage;
use self::session::SessionMap;

/// Shared application state behind the router.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub storage: Arc<RwLock<Storage>>,
    pub sessions: Arc<RwLock<SessionMap>>,
    pub puzzles: Arc<RwLock<PuzzleStore>>,
}

impl AppState {
    /// Initialize storage under the configured data directory and seed the
    /// notice board.
    pub async fn new(config: Config) -> Result<Self> {
        let argon2_params = config
            .security
            .as_ref()
            .and_then(|s| s.argon2.as_ref())
            .and_then(|a| {
                argon2::Params::new(
                    a.memory_kib.unwrap_or(argon2::Params::DEFAULT_M_COST),
                    a.time_cost.unwrap_or(argon2::Params::DEFAULT_T_COST),
                    a.parallelism.unwrap_or(argon2::Params::DEFAULT_P_COST),
                    None,
                )
                .ok()
            });
        let mut storage =
            Storage::new_with_params(&config.storage.data_dir, argon2_params).await?;
        storage.seed_notices().await?;
        Ok(AppState {
            config: Arc::new(config),
            storage: Arc::new(RwLock::new(storage)),
            sessions: Arc::new(RwLock::new(SessionMap::new())),
            puzzles: Arc::new(RwLock::new(PuzzleStore::new())),
        })
    }
}

/// Build the application router.
pub fn app(state: AppState) -> Router {
    let max_body = state.config.storage.max_upload_bytes;
    Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/logout", post(handlers::logout))
        .route("/notices", get(handlers::list_notices))
        .route("/notices/:idx", get(handlers::notice_detail))
        .route("/grades", get(handlers::list_grades))
        .route(
            "/assignments",
            get(handlers::list_assignments).post(handlers::upload_assignment),
        )
        .route(
            "/assignments/download/:id",
            get(handlers::download_assignment),
        )
        .route("/games", get(handlers::games_view))
        .route("/api/games/puzzle/swap", post(handlers::puzzle_swap))
        .route("/api/games/volume/complete", post(handlers::volume_complete))
        .layer(DefaultBodyLimit::max(max_body))
        .with_state(state)
}

/// Bind the configured address and serve until shutdown.
pub async fn serve(state: AppState) -> Result<()> {
    let addr = state.config.server.bind_addr.clone();
    let name = state.config.server.name.clone();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow!("Failed to bind {}: {}", addr, e))?;
    info!("{} listening on {}", name, addr);
    axum::serve(listener, app(state))
        .await
        .map_err(|e| anyhow!("Server error: {}", e))
}
