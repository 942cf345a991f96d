use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use notnatty_backend::{
    app,
    config::{Config, StoreKind},
    mailer::LogMailer,
    shutdown_signal,
    store::{MemoryStore, PgStore, Store},
    AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("notnatty_backend=info,tower_http=info")),
        )
        .init();

    let config = Config::load()?;

    let store: Arc<dyn Store> = match config.store {
        StoreKind::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set when STORE=postgres")?;
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(database_url)
                .await?;

            if config.run_migrations {
                sqlx::migrate!().run(&pool).await?;
                tracing::info!("📦 Migrations applied");
            }

            let store = PgStore::new(pool);
            store.seed_compounds().await?;
            Arc::new(store)
        }
        StoreKind::Memory => {
            tracing::warn!("⚠️ Using the in-memory store, data is lost on exit");
            Arc::new(MemoryStore::with_default_compounds())
        }
    };

    let mailer = Arc::new(LogMailer::new(&config));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = AppState::new(config, store, mailer)?;

    tracing::info!("🧠 Server running at {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
