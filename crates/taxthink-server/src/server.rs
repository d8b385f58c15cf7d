use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;

use taxthink_advisor::ConversationService;
use taxthink_store::Database;

use crate::handlers::{self, AppState};

/// Server configuration.
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 5000 }
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/sessions",
            get(handlers::list_sessions).post(handlers::create_session),
        )
        .route(
            "/api/sessions/{id}",
            get(handlers::get_session).patch(handlers::update_session),
        )
        .route(
            "/api/sessions/{id}/messages",
            get(handlers::list_messages).post(handlers::send_message),
        )
        .route(
            "/api/sessions/{id}/data",
            get(handlers::list_session_data).post(handlers::upsert_session_datum),
        )
        .route(
            "/api/sessions/{id}/data/{category}",
            get(handlers::list_session_data_by_category),
        )
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Create and start the server. Returns a handle that keeps it alive.
pub async fn start(
    config: ServerConfig,
    db: Database,
    advisor: Arc<ConversationService>,
) -> Result<ServerHandle, std::io::Error> {
    let state = AppState { db, advisor };
    let router = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(port = local_addr.port(), "TaxThink server started");

    let server = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        _server: server,
    })
}

/// Handle returned by `start()`. Dropping it does not stop the server, but
/// keeps the spawned task reachable.
pub struct ServerHandle {
    pub port: u16,
    _server: tokio::task::JoinHandle<()>,
}
