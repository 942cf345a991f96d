use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde_json::Value;
use uuid::Uuid;

use super::{injections::{ensure_own_cycle, CycleFilter}, message};
use crate::{
    auth::AuthUser,
    error::AppError,
    extract::{ApiJson, ApiPath, ApiQuery},
    models::{NewSideEffect, SideEffect, SideEffectPatch},
    validation::Validate,
    AppState,
};

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/side-effects", get(list_side_effects).post(create_side_effect))
        .route(
            "/side-effects/:id",
            get(get_side_effect).put(update_side_effect).delete(delete_side_effect),
        )
        .with_state(state)
}

async fn list_side_effects(
    State(state): State<AppState>,
    me: AuthUser,
    ApiQuery(filter): ApiQuery<CycleFilter>,
) -> Result<Json<Vec<SideEffect>>, AppError> {
    Ok(Json(state.store.side_effects(me.id, filter.cycle_id).await?))
}

async fn create_side_effect(
    State(state): State<AppState>,
    me: AuthUser,
    ApiJson(draft): ApiJson<NewSideEffect>,
) -> Result<(StatusCode, Json<SideEffect>), AppError> {
    draft.validate()?;
    ensure_own_cycle(&state, me.id, draft.cycle_id).await?;

    let effect = state.store.create_side_effect(me.id, &draft).await?;
    if effect.severity >= 8 {
        tracing::info!("🩺 High severity side effect logged by {}", me.id);
    }
    Ok((StatusCode::CREATED, Json(effect)))
}

async fn get_side_effect(
    State(state): State<AppState>,
    me: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<SideEffect>, AppError> {
    let effect = state
        .store
        .find_side_effect(me.id, id)
        .await?
        .ok_or(AppError::NotFound("Side effect"))?;
    Ok(Json(effect))
}

async fn update_side_effect(
    State(state): State<AppState>,
    me: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<SideEffectPatch>,
) -> Result<Json<SideEffect>, AppError> {
    patch.validate()?;

    let effect = state
        .store
        .update_side_effect(me.id, id, &patch)
        .await?
        .ok_or(AppError::NotFound("Side effect"))?;
    Ok(Json(effect))
}

async fn delete_side_effect(
    State(state): State<AppState>,
    me: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    if !state.store.delete_side_effect(me.id, id).await? {
        return Err(AppError::NotFound("Side effect"));
    }
    Ok(Json(message("Side effect deleted successfully")))
}
