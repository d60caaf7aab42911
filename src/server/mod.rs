//! JSON API over the aggregation engine.

mod handlers;
mod state;

use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::Settings;
use crate::geo::{HttpTransport, Registry, Transport};

pub use state::AppState;

pub fn build_router<T: Transport>(state: Arc<AppState<T>>) -> Router {
    Router::new()
        .route("/api/lookup", get(handlers::lookup::<T>))
        .route("/api/field", get(handlers::field::<T>))
        .route("/api/providers", get(handlers::providers::<T>))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the built-in providers over HTTP until the process is stopped.
pub async fn start(host: &str, port: u16, settings: Settings) -> std::io::Result<()> {
    let transport = HttpTransport::new(settings.timeout());
    let state = Arc::new(AppState::new(Arc::new(Registry::builtin()), Arc::new(transport), settings));
    let app = build_router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("ipinformer server listening on http://{}", addr);
    eprintln!("  ipinformer server listening on http://{}", addr);
    eprintln!("  Press Ctrl+C to stop.");

    axum::serve(listener, app).await
}
