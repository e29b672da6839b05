//! # pollcast-server
//!
//! HTTP and WebSocket front end for pollcast.
//!
//! Votes arrive over HTTP, are applied atomically by
//! [`pollcast_store::PollStore`], and the resulting poll state is pushed to
//! every WebSocket viewer that joined that poll's room.
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `POST /polls` | Create a poll |
//! | `GET /polls/:id` | Current poll state |
//! | `POST /polls/:id/vote` | Cast a vote |
//! | `GET /ws` | Realtime channel |
//! | `GET /status` | Liveness and counters |
//!
//! ## Quick Start
//!
//! ```no_run
//! use pollcast_server::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     pollcast_server::run(ServerConfig::default()).await.unwrap();
//! }
//! ```

mod api;
mod broadcast;
mod config;
mod error;
mod identity;
mod registrar;
mod rooms;
mod ws;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use pollcast_store::{MemoryStore, PollStore, StateStore};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use broadcast::{Broadcaster, PublishReport, ServerEvent};
pub use config::{Backend, ServerConfig, UnknownIdentityPolicy};
pub use error::{AppError, ServeError};
pub use identity::{client_address, resolve_voter, UNKNOWN_IDENTITY};
pub use registrar::{parse_option_index, Registrar};
pub use rooms::{ConnectionId, RoomRegistry};
pub use ws::ClientEvent;

/// Shared application state for Axum handlers.
pub struct AppState<S: StateStore> {
    /// Poll operations.
    pub registrar: Registrar<S>,
    /// Live viewer fan-out.
    pub broadcaster: Arc<Broadcaster>,
    /// Settings the server was started with.
    pub config: ServerConfig,
    started_at: Instant,
}

impl<S: StateStore + 'static> AppState<S> {
    /// Wire a store and a fresh broadcaster together.
    pub fn new(store: S, config: ServerConfig) -> Arc<Self> {
        let broadcaster = Arc::new(Broadcaster::new(config.viewer_queue));
        let registrar = Registrar::new(
            Arc::new(PollStore::new(store)),
            Arc::clone(&broadcaster),
            config.store_timeout,
        );
        Arc::new(Self {
            registrar,
            broadcaster,
            config,
            started_at: Instant::now(),
        })
    }

    /// Time since the state was created.
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Build the router over `state`.
pub fn router<S: StateStore + 'static>(state: Arc<AppState<S>>) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/polls", post(api::create_poll::<S>))
        .route("/polls/:id", get(api::get_poll::<S>))
        .route("/polls/:id/vote", post(api::vote::<S>))
        .route("/ws", get(ws::ws_handler::<S>))
        .route("/status", get(api::status::<S>))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `store` until Ctrl-C or SIGTERM.
pub async fn serve<S: StateStore + 'static>(store: S, config: ServerConfig) -> Result<(), ServeError> {
    let bind = config.bind;
    let app = router(AppState::new(store, config));

    let listener = TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "pollcast listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("server stopped");
    Ok(())
}

/// Open the configured backend and serve it.
pub async fn run(config: ServerConfig) -> Result<(), ServeError> {
    info!(backend = %config.backend, db = %config.db_path.display(), "opening store");

    match config.backend {
        Backend::Memory => serve(MemoryStore::new(), config).await,
        #[cfg(feature = "sqlite")]
        Backend::Sqlite => {
            let store = pollcast_store::SqliteStore::open_with_config(
                &config.db_path,
                config.sqlite.clone(),
            )
            .map_err(|e| {
                ServeError::Open {
                    backend: Backend::Sqlite,
                    source: Box::new(e),
                }
            })?;
            serve(store, config).await
        }
        #[cfg(feature = "redb")]
        Backend::Redb => {
            let store = pollcast_store::RedbStore::open(&config.db_path).map_err(|e| {
                ServeError::Open {
                    backend: Backend::Redb,
                    source: Box::new(e),
                }
            })?;
            serve(store, config).await
        }
        #[allow(unreachable_patterns)]
        other => Err(ServeError::BackendUnavailable(other)),
    }
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    match config.cors_origin.as_deref() {
        None | Some("*") => cors.allow_origin(Any),
        Some(origin) => match origin.parse::<HeaderValue>() {
            Ok(value) => cors.allow_origin(value),
            Err(_) => {
                warn!(origin, "invalid CORS origin, allowing any");
                cors.allow_origin(Any)
            }
        },
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, shutting down");
        } else {
            warn!("failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
