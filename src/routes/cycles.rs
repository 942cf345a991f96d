use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::Value;
use uuid::Uuid;

use super::message;
use crate::{
    auth::AuthUser,
    error::AppError,
    extract::{ApiJson, ApiPath},
    models::{Cycle, CycleCompound, CyclePatch, NewCycle, NewCycleCompound},
    validation::{Validate, ValidationErrors},
    AppState,
};

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/cycles", get(list_cycles).post(create_cycle))
        .route("/cycles/:id", get(get_cycle).put(update_cycle).delete(delete_cycle))
        .route("/cycles/:id/compounds", post(add_compound))
        .route("/cycles/:id/compounds/:compound_id", delete(remove_compound))
        .with_state(state)
}

async fn list_cycles(State(state): State<AppState>, me: AuthUser) -> Result<Json<Vec<Cycle>>, AppError> {
    Ok(Json(state.store.cycles(me.id).await?))
}

async fn create_cycle(
    State(state): State<AppState>,
    me: AuthUser,
    ApiJson(draft): ApiJson<NewCycle>,
) -> Result<(StatusCode, Json<Cycle>), AppError> {
    draft.validate()?;

    let cycle = state.store.create_cycle(me.id, &draft).await?;
    tracing::info!("🔁 Cycle {} created with {} compounds", cycle.id, cycle.compounds.len());
    Ok((StatusCode::CREATED, Json(cycle)))
}

async fn get_cycle(
    State(state): State<AppState>,
    me: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Cycle>, AppError> {
    let cycle = state
        .store
        .find_cycle(me.id, id)
        .await?
        .ok_or(AppError::NotFound("Cycle"))?;
    Ok(Json(cycle))
}

async fn update_cycle(
    State(state): State<AppState>,
    me: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<CyclePatch>,
) -> Result<Json<Cycle>, AppError> {
    patch.validate()?;

    let current = state
        .store
        .find_cycle(me.id, id)
        .await?
        .ok_or(AppError::NotFound("Cycle"))?;
    let start = patch.start_date.unwrap_or(current.start_date);
    let end = patch.end_date.or(current.end_date);
    if end.is_some_and(|end| end < start) {
        return Err(ValidationErrors::single("endDate", "must not be before the start date").into());
    }

    let cycle = state
        .store
        .update_cycle(me.id, id, &patch)
        .await?
        .ok_or(AppError::NotFound("Cycle"))?;
    Ok(Json(cycle))
}

async fn delete_cycle(
    State(state): State<AppState>,
    me: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    if !state.store.delete_cycle(me.id, id).await? {
        return Err(AppError::NotFound("Cycle"));
    }
    Ok(Json(message("Cycle deleted successfully")))
}

async fn add_compound(
    State(state): State<AppState>,
    me: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(draft): ApiJson<NewCycleCompound>,
) -> Result<(StatusCode, Json<CycleCompound>), AppError> {
    draft.validate()?;

    let added = state
        .store
        .add_cycle_compound(me.id, id, &draft)
        .await?
        .ok_or(AppError::NotFound("Cycle"))?;
    Ok((StatusCode::CREATED, Json(added)))
}

async fn remove_compound(
    State(state): State<AppState>,
    me: AuthUser,
    ApiPath((id, compound_id)): ApiPath<(Uuid, Uuid)>,
) -> Result<Json<Value>, AppError> {
    if !state.store.remove_cycle_compound(me.id, id, compound_id).await? {
        return Err(AppError::NotFound("Cycle compound"));
    }
    Ok(Json(message("Compound removed from cycle")))
}
