//! Postgres implementation of the store traits. One file per concern, all
//! sharing the pool held by `PgStore`.

use sqlx::PgPool;

use super::{StoreResult, DEFAULT_COMPOUNDS};

mod compounds;
mod cycles;
mod logs;
mod notifications;
mod posts;
mod social;
mod users;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Installs the default compound catalogue. Rows whose id or name is
    /// already taken are left alone, so running this on every boot is harmless.
    pub async fn seed_compounds(&self) -> StoreResult<u64> {
        let mut inserted = 0;
        for seed in DEFAULT_COMPOUNDS {
            let result = sqlx::query(
                "INSERT INTO compounds (id, name, category, half_life_hours, dosage_unit)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT DO NOTHING",
            )
            .bind(seed.id)
            .bind(seed.name)
            .bind(seed.category)
            .bind(seed.half_life_hours)
            .bind(seed.dosage_unit)
            .execute(&self.pool)
            .await?;
            inserted += result.rows_affected();
        }

        if inserted > 0 {
            tracing::info!("🌱 Seeded {} default compounds", inserted);
        }
        Ok(inserted)
    }
}
