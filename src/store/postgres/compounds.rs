use async_trait::async_trait;
use uuid::Uuid;

use super::PgStore;
use crate::models::{Compound, NewCompound};
use crate::store::{CompoundStore, StoreResult};

const COMPOUND_COLUMNS: &str = "id, name, category, description, half_life_hours, dosage_unit, created_at";

#[async_trait]
impl CompoundStore for PgStore {
    async fn compounds(&self, category: Option<&str>) -> StoreResult<Vec<Compound>> {
        let compounds = sqlx::query_as::<_, Compound>(&format!(
            "SELECT {COMPOUND_COLUMNS} FROM compounds
             WHERE ($1::text IS NULL OR LOWER(category) = LOWER($1))
             ORDER BY name"
        ))
        .bind(category)
        .fetch_all(&self.pool)
        .await?;
        Ok(compounds)
    }

    async fn find_compound(&self, id: Uuid) -> StoreResult<Option<Compound>> {
        let compound = sqlx::query_as::<_, Compound>(&format!(
            "SELECT {COMPOUND_COLUMNS} FROM compounds WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(compound)
    }

    async fn create_compound(&self, draft: &NewCompound) -> StoreResult<Compound> {
        let compound = sqlx::query_as::<_, Compound>(&format!(
            "INSERT INTO compounds (id, name, category, description, half_life_hours, dosage_unit)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COMPOUND_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&draft.name)
        .bind(&draft.category)
        .bind(&draft.description)
        .bind(draft.half_life_hours)
        .bind(draft.dosage_unit.as_deref().unwrap_or("mg"))
        .fetch_one(&self.pool)
        .await?;
        Ok(compound)
    }
}
