use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use super::message;
use crate::{
    auth::AuthUser,
    error::AppError,
    extract::{ApiJson, ApiPath, ApiQuery},
    models::{Injection, InjectionPatch, NewInjection},
    validation::Validate,
    AppState,
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleFilter {
    pub cycle_id: Option<Uuid>,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/injections", get(list_injections).post(create_injection))
        .route(
            "/injections/:id",
            get(get_injection).put(update_injection).delete(delete_injection),
        )
        .with_state(state)
}

/// A log may only point at one of the caller's own cycles.
pub(super) async fn ensure_own_cycle(state: &AppState, user: Uuid, cycle: Option<Uuid>) -> Result<(), AppError> {
    if let Some(id) = cycle {
        state.store.find_cycle(user, id).await?.ok_or(AppError::NotFound("Cycle"))?;
    }
    Ok(())
}

async fn list_injections(
    State(state): State<AppState>,
    me: AuthUser,
    ApiQuery(filter): ApiQuery<CycleFilter>,
) -> Result<Json<Vec<Injection>>, AppError> {
    Ok(Json(state.store.injections(me.id, filter.cycle_id).await?))
}

async fn create_injection(
    State(state): State<AppState>,
    me: AuthUser,
    ApiJson(draft): ApiJson<NewInjection>,
) -> Result<(StatusCode, Json<Injection>), AppError> {
    draft.validate()?;
    ensure_own_cycle(&state, me.id, draft.cycle_id).await?;

    let injection = state.store.create_injection(me.id, &draft).await?;
    Ok((StatusCode::CREATED, Json(injection)))
}

async fn get_injection(
    State(state): State<AppState>,
    me: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Injection>, AppError> {
    let injection = state
        .store
        .find_injection(me.id, id)
        .await?
        .ok_or(AppError::NotFound("Injection"))?;
    Ok(Json(injection))
}

async fn update_injection(
    State(state): State<AppState>,
    me: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<InjectionPatch>,
) -> Result<Json<Injection>, AppError> {
    patch.validate()?;

    let injection = state
        .store
        .update_injection(me.id, id, &patch)
        .await?
        .ok_or(AppError::NotFound("Injection"))?;
    Ok(Json(injection))
}

async fn delete_injection(
    State(state): State<AppState>,
    me: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    if !state.store.delete_injection(me.id, id).await? {
        return Err(AppError::NotFound("Injection"));
    }
    Ok(Json(message("Injection deleted successfully")))
}
