//! Local server mounting both function routers on one port.

use axum::http::HeaderValue;
use axum::routing::get;
use axum::Router;
use push_api::PushState;
use recipe_api::AppState;
use recipe_core::config::{FetchSettings, PushSettings};
use recipe_core::fetch;
use recipe_core::kv::MemoryStore;
use recipe_core::reminder::Reminders;
use std::sync::Arc;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3001);

    let fetch_settings = FetchSettings::from_env();
    let recipe_state = AppState::new(
        fetch::build_client(&fetch_settings)?,
        fetch_settings.max_bytes,
    );

    let push_settings = PushSettings::from_env();
    let mut push_state = PushState::from_settings(&push_settings).await;
    if push_settings.kv_url.is_none() {
        warn!("Using in-memory reminder store");
        push_state.reminders = Some(Reminders::new(Arc::new(MemoryStore::new())));
    }

    let app = Router::new()
        .merge(recipe_api::router(recipe_state))
        .merge(push_api::router(push_state))
        .route("/health", get(recipe_api::health))
        .fallback(recipe_api::not_found)
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ));

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;

    info!(port, "Server starting");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to install CTRL+C handler");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
