use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use super::PgStore;
use crate::models::{Cycle, CycleCompound, CyclePatch, CycleStatus, NewCycle, NewCycleCompound};
use crate::store::{CycleStore, StoreResult};

const CYCLE_COLUMNS: &str = "id, user_id, name, description, start_date, end_date, goals, \
    status, notes, created_at, updated_at";

const CYCLE_COMPOUND_COLUMNS: &str = "id, cycle_id, compound_id, dosage, frequency, start_date, \
    end_date, notes, created_at";

#[derive(sqlx::FromRow)]
struct CycleRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    description: Option<String>,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    goals: Vec<String>,
    status: CycleStatus,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CycleRow {
    fn with_compounds(self, compounds: Vec<CycleCompound>) -> Cycle {
        Cycle {
            id: self.id,
            user_id: self.user_id,
            name: self.name,
            description: self.description,
            start_date: self.start_date,
            end_date: self.end_date,
            goals: self.goals,
            status: self.status,
            notes: self.notes,
            compounds,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

async fn insert_cycle_compound(
    conn: &mut PgConnection,
    cycle: Uuid,
    cycle_start: NaiveDate,
    draft: &NewCycleCompound,
) -> StoreResult<CycleCompound> {
    let added = sqlx::query_as::<_, CycleCompound>(&format!(
        "INSERT INTO cycle_compounds (id, cycle_id, compound_id, dosage, frequency, start_date, end_date, notes)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING {CYCLE_COMPOUND_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(cycle)
    .bind(draft.compound_id)
    .bind(draft.dosage)
    .bind(&draft.frequency)
    .bind(draft.start_date.unwrap_or(cycle_start))
    .bind(draft.end_date)
    .bind(&draft.notes)
    .fetch_one(conn)
    .await?;
    Ok(added)
}

impl PgStore {
    /// Loads the compounds of every row in one query and assembles the cycles.
    async fn attach_compounds(&self, rows: Vec<CycleRow>) -> StoreResult<Vec<Cycle>> {
        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
        let compounds = sqlx::query_as::<_, CycleCompound>(&format!(
            "SELECT {CYCLE_COMPOUND_COLUMNS} FROM cycle_compounds
             WHERE cycle_id = ANY($1)
             ORDER BY created_at"
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_cycle: HashMap<Uuid, Vec<CycleCompound>> = HashMap::new();
        for compound in compounds {
            by_cycle.entry(compound.cycle_id).or_default().push(compound);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let compounds = by_cycle.remove(&row.id).unwrap_or_default();
                row.with_compounds(compounds)
            })
            .collect())
    }

    async fn attach_one(&self, row: Option<CycleRow>) -> StoreResult<Option<Cycle>> {
        match row {
            Some(row) => Ok(self.attach_compounds(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl CycleStore for PgStore {
    async fn create_cycle(&self, user: Uuid, draft: &NewCycle) -> StoreResult<Cycle> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, CycleRow>(&format!(
            "INSERT INTO cycles (id, user_id, name, description, start_date, end_date, goals, status, notes)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {CYCLE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user)
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(draft.start_date)
        .bind(draft.end_date)
        .bind(&draft.goals)
        .bind(draft.status.unwrap_or_default())
        .bind(&draft.notes)
        .fetch_one(&mut *tx)
        .await?;

        let mut compounds = Vec::with_capacity(draft.compounds.len());
        for item in &draft.compounds {
            compounds.push(insert_cycle_compound(&mut tx, row.id, row.start_date, item).await?);
        }

        tx.commit().await?;
        Ok(row.with_compounds(compounds))
    }

    async fn cycles(&self, user: Uuid) -> StoreResult<Vec<Cycle>> {
        let rows = sqlx::query_as::<_, CycleRow>(&format!(
            "SELECT {CYCLE_COLUMNS} FROM cycles
             WHERE user_id = $1
             ORDER BY start_date DESC, created_at DESC"
        ))
        .bind(user)
        .fetch_all(&self.pool)
        .await?;
        self.attach_compounds(rows).await
    }

    async fn find_cycle(&self, user: Uuid, id: Uuid) -> StoreResult<Option<Cycle>> {
        let row = sqlx::query_as::<_, CycleRow>(&format!(
            "SELECT {CYCLE_COLUMNS} FROM cycles WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user)
        .fetch_optional(&self.pool)
        .await?;
        self.attach_one(row).await
    }

    async fn update_cycle(&self, user: Uuid, id: Uuid, patch: &CyclePatch) -> StoreResult<Option<Cycle>> {
        let row = sqlx::query_as::<_, CycleRow>(&format!(
            "UPDATE cycles SET
                name = COALESCE($3, name),
                description = COALESCE($4, description),
                start_date = COALESCE($5, start_date),
                end_date = COALESCE($6, end_date),
                goals = COALESCE($7, goals),
                status = COALESCE($8, status),
                notes = COALESCE($9, notes),
                updated_at = NOW()
             WHERE id = $1 AND user_id = $2
             RETURNING {CYCLE_COLUMNS}"
        ))
        .bind(id)
        .bind(user)
        .bind(&patch.name)
        .bind(&patch.description)
        .bind(patch.start_date)
        .bind(patch.end_date)
        .bind(&patch.goals)
        .bind(patch.status)
        .bind(&patch.notes)
        .fetch_optional(&self.pool)
        .await?;
        self.attach_one(row).await
    }

    async fn delete_cycle(&self, user: Uuid, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM cycles WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn add_cycle_compound(&self, user: Uuid, cycle: Uuid, draft: &NewCycleCompound) -> StoreResult<Option<CycleCompound>> {
        let mut conn = self.pool.acquire().await?;

        let start = sqlx::query_scalar::<_, NaiveDate>("SELECT start_date FROM cycles WHERE id = $1 AND user_id = $2")
            .bind(cycle)
            .bind(user)
            .fetch_optional(&mut *conn)
            .await?;
        let Some(start) = start else {
            return Ok(None);
        };

        let added = insert_cycle_compound(&mut conn, cycle, start, draft).await?;
        Ok(Some(added))
    }

    async fn remove_cycle_compound(&self, user: Uuid, cycle: Uuid, compound: Uuid) -> StoreResult<bool> {
        let result = sqlx::query(
            "DELETE FROM cycle_compounds
             WHERE cycle_id = $1 AND compound_id = $2
               AND cycle_id IN (SELECT id FROM cycles WHERE user_id = $3)",
        )
        .bind(cycle)
        .bind(compound)
        .bind(user)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
