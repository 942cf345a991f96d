use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod extract;
pub mod mailer;
pub mod models;
pub mod routes;
pub mod store;
pub mod validation;

use crate::{
    auth::{Passwords, TokenKeys},
    config::Config,
    mailer::Mailer,
    store::Store,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub tokens: TokenKeys,
    pub passwords: Passwords,
    pub mailer: Arc<dyn Mailer>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn Store>, mailer: Arc<dyn Mailer>) -> anyhow::Result<Self> {
        Ok(Self {
            tokens: TokenKeys::new(config.jwt_secret.as_bytes(), config.jwt_ttl),
            passwords: Passwords::new(config.hash_memory_kib, config.hash_iterations)?,
            store,
            mailer,
            config: Arc::new(config),
        })
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "✅ Backend up" }))
        .merge(routes::auth::routes(state.clone()))
        .merge(routes::users::routes(state.clone()))
        .merge(routes::posts::routes(state.clone()))
        .merge(routes::compounds::routes(state.clone()))
        .merge(routes::cycles::routes(state.clone()))
        .merge(routes::injections::routes(state.clone()))
        .merge(routes::side_effects::routes(state.clone()))
        .merge(routes::notifications::routes(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("❌ Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!("❌ Failed to listen for SIGTERM: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("👋 Shutdown signal received");
}
