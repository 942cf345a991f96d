use std::{env, fmt::Display, str::FromStr};

use anyhow::{anyhow, bail, Context, Result};
use chrono::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

impl FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(StoreKind::Postgres),
            "memory" => Ok(StoreKind::Memory),
            other => Err(anyhow!("unknown store `{other}` (expected postgres or memory)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub store: StoreKind,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub run_migrations: bool,
    pub jwt_secret: String,
    pub jwt_ttl: Duration,
    pub hash_memory_kib: u32,
    pub hash_iterations: u32,
    pub frontend_url: String,
    pub mail_from: String,
    /// Write full verification and reset links, tokens included, to the log.
    /// Local development only.
    pub mail_log_links: bool,
    pub verification_ttl: Duration,
    pub reset_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3050,
            store: StoreKind::Postgres,
            database_url: None,
            database_max_connections: 5,
            run_migrations: true,
            jwt_secret: "dev-only-secret".into(),
            jwt_ttl: Duration::hours(168),
            hash_memory_kib: 19_456,
            hash_iterations: 2,
            frontend_url: "http://localhost:3000".into(),
            mail_from: "noreply@notnatty.com".into(),
            mail_log_links: false,
            verification_ttl: Duration::hours(24),
            reset_ttl: Duration::hours(1),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let defaults = Self::default();

        let store: StoreKind = try_load("STORE", "postgres")?;
        let database_url = env::var("DATABASE_URL").ok();
        if store == StoreKind::Postgres && database_url.is_none() {
            bail!("DATABASE_URL must be set when STORE=postgres");
        }

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ if cfg!(debug_assertions) => {
                warn!("JWT_SECRET not set, using the development secret");
                defaults.jwt_secret
            }
            _ => bail!("JWT_SECRET must be set"),
        };

        Ok(Self {
            port: try_load("PORT", "3050")?,
            store,
            database_url,
            database_max_connections: try_load("DATABASE_MAX_CONNECTIONS", "5")?,
            run_migrations: try_load("RUN_MIGRATIONS", "true")?,
            jwt_secret,
            jwt_ttl: Duration::hours(try_load("JWT_EXPIRES_IN_HOURS", "168")?),
            hash_memory_kib: try_load("HASH_MEMORY_KIB", "19456")?,
            hash_iterations: try_load("HASH_ITERATIONS", "2")?,
            frontend_url: try_load("FRONTEND_URL", &defaults.frontend_url)?,
            mail_from: try_load("MAIL_FROM", &defaults.mail_from)?,
            mail_log_links: try_load("MAIL_LOG_LINKS", "false")?,
            verification_ttl: Duration::hours(try_load("VERIFICATION_TTL_HOURS", "24")?),
            reset_ttl: Duration::hours(try_load("RESET_TTL_HOURS", "1")?),
        })
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse()
        .map_err(|e| anyhow!("{e}"))
        .with_context(|| format!("invalid {key} value `{raw}`"))
}
