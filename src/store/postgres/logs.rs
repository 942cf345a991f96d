use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::PgStore;
use crate::models::{
    Injection, InjectionPatch, NewInjection, NewSideEffect, SideEffect, SideEffectPatch,
};
use crate::store::{LogStore, StoreResult};

const INJECTION_COLUMNS: &str = "id, user_id, cycle_id, compound_id, dosage, injection_site, \
    injected_at, notes, created_at";

const SIDE_EFFECT_COLUMNS: &str = "id, user_id, cycle_id, symptoms, severity, \
    blood_pressure_systolic, blood_pressure_diastolic, mood_rating, libido_rating, \
    acne_severity, notes, recorded_at, created_at";

#[async_trait]
impl LogStore for PgStore {
    async fn create_injection(&self, user: Uuid, draft: &NewInjection) -> StoreResult<Injection> {
        let injection = sqlx::query_as::<_, Injection>(&format!(
            "INSERT INTO injections (id, user_id, cycle_id, compound_id, dosage, injection_site, injected_at, notes)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {INJECTION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user)
        .bind(draft.cycle_id)
        .bind(draft.compound_id)
        .bind(draft.dosage)
        .bind(&draft.injection_site)
        .bind(draft.injected_at.unwrap_or_else(Utc::now))
        .bind(&draft.notes)
        .fetch_one(&self.pool)
        .await?;
        Ok(injection)
    }

    async fn injections(&self, user: Uuid, cycle: Option<Uuid>) -> StoreResult<Vec<Injection>> {
        let injections = sqlx::query_as::<_, Injection>(&format!(
            "SELECT {INJECTION_COLUMNS} FROM injections
             WHERE user_id = $1 AND ($2::uuid IS NULL OR cycle_id = $2)
             ORDER BY injected_at DESC"
        ))
        .bind(user)
        .bind(cycle)
        .fetch_all(&self.pool)
        .await?;
        Ok(injections)
    }

    async fn find_injection(&self, user: Uuid, id: Uuid) -> StoreResult<Option<Injection>> {
        let injection = sqlx::query_as::<_, Injection>(&format!(
            "SELECT {INJECTION_COLUMNS} FROM injections WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user)
        .fetch_optional(&self.pool)
        .await?;
        Ok(injection)
    }

    async fn update_injection(&self, user: Uuid, id: Uuid, patch: &InjectionPatch) -> StoreResult<Option<Injection>> {
        let injection = sqlx::query_as::<_, Injection>(&format!(
            "UPDATE injections SET
                dosage = COALESCE($3, dosage),
                injection_site = COALESCE($4, injection_site),
                injected_at = COALESCE($5, injected_at),
                notes = COALESCE($6, notes)
             WHERE id = $1 AND user_id = $2
             RETURNING {INJECTION_COLUMNS}"
        ))
        .bind(id)
        .bind(user)
        .bind(patch.dosage)
        .bind(&patch.injection_site)
        .bind(patch.injected_at)
        .bind(&patch.notes)
        .fetch_optional(&self.pool)
        .await?;
        Ok(injection)
    }

    async fn delete_injection(&self, user: Uuid, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM injections WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_side_effect(&self, user: Uuid, draft: &NewSideEffect) -> StoreResult<SideEffect> {
        let effect = sqlx::query_as::<_, SideEffect>(&format!(
            "INSERT INTO side_effects (id, user_id, cycle_id, symptoms, severity,
                                       blood_pressure_systolic, blood_pressure_diastolic,
                                       mood_rating, libido_rating, acne_severity, notes, recorded_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             RETURNING {SIDE_EFFECT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user)
        .bind(draft.cycle_id)
        .bind(&draft.symptoms)
        .bind(draft.severity)
        .bind(draft.blood_pressure_systolic)
        .bind(draft.blood_pressure_diastolic)
        .bind(draft.mood_rating)
        .bind(draft.libido_rating)
        .bind(draft.acne_severity)
        .bind(&draft.notes)
        .bind(draft.recorded_at.unwrap_or_else(Utc::now))
        .fetch_one(&self.pool)
        .await?;
        Ok(effect)
    }

    async fn side_effects(&self, user: Uuid, cycle: Option<Uuid>) -> StoreResult<Vec<SideEffect>> {
        let effects = sqlx::query_as::<_, SideEffect>(&format!(
            "SELECT {SIDE_EFFECT_COLUMNS} FROM side_effects
             WHERE user_id = $1 AND ($2::uuid IS NULL OR cycle_id = $2)
             ORDER BY recorded_at DESC"
        ))
        .bind(user)
        .bind(cycle)
        .fetch_all(&self.pool)
        .await?;
        Ok(effects)
    }

    async fn find_side_effect(&self, user: Uuid, id: Uuid) -> StoreResult<Option<SideEffect>> {
        let effect = sqlx::query_as::<_, SideEffect>(&format!(
            "SELECT {SIDE_EFFECT_COLUMNS} FROM side_effects WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user)
        .fetch_optional(&self.pool)
        .await?;
        Ok(effect)
    }

    async fn update_side_effect(&self, user: Uuid, id: Uuid, patch: &SideEffectPatch) -> StoreResult<Option<SideEffect>> {
        let effect = sqlx::query_as::<_, SideEffect>(&format!(
            "UPDATE side_effects SET
                symptoms = COALESCE($3, symptoms),
                severity = COALESCE($4, severity),
                blood_pressure_systolic = COALESCE($5, blood_pressure_systolic),
                blood_pressure_diastolic = COALESCE($6, blood_pressure_diastolic),
                mood_rating = COALESCE($7, mood_rating),
                libido_rating = COALESCE($8, libido_rating),
                acne_severity = COALESCE($9, acne_severity),
                notes = COALESCE($10, notes),
                recorded_at = COALESCE($11, recorded_at)
             WHERE id = $1 AND user_id = $2
             RETURNING {SIDE_EFFECT_COLUMNS}"
        ))
        .bind(id)
        .bind(user)
        .bind(&patch.symptoms)
        .bind(patch.severity)
        .bind(patch.blood_pressure_systolic)
        .bind(patch.blood_pressure_diastolic)
        .bind(patch.mood_rating)
        .bind(patch.libido_rating)
        .bind(patch.acne_severity)
        .bind(&patch.notes)
        .bind(patch.recorded_at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(effect)
    }

    async fn delete_side_effect(&self, user: Uuid, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM side_effects WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
