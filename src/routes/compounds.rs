use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::AppError,
    extract::{ApiJson, ApiPath, ApiQuery},
    models::{Compound, NewCompound},
    validation::Validate,
    AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct CategoryQuery {
    pub category: Option<String>,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/compounds", get(list_compounds).post(create_compound))
        .route("/compounds/:id", get(get_compound))
        .with_state(state)
}

async fn list_compounds(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CategoryQuery>,
) -> Result<Json<Vec<Compound>>, AppError> {
    let category = query.category.as_deref().map(str::trim).filter(|c| !c.is_empty());
    Ok(Json(state.store.compounds(category).await?))
}

async fn get_compound(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Compound>, AppError> {
    let compound = state
        .store
        .find_compound(id)
        .await?
        .ok_or(AppError::NotFound("Compound"))?;
    Ok(Json(compound))
}

async fn create_compound(
    State(state): State<AppState>,
    _me: AuthUser,
    ApiJson(mut draft): ApiJson<NewCompound>,
) -> Result<(StatusCode, Json<Compound>), AppError> {
    draft.validate()?;
    draft.name = draft.name.trim().to_string();
    draft.category = draft.category.trim().to_string();

    let compound = state.store.create_compound(&draft).await?;
    tracing::info!("💊 Compound {} added", compound.name);
    Ok((StatusCode::CREATED, Json(compound)))
}
