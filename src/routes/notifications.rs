use axum::{
    extract::State,
    routing::{delete, get, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{message, Paging};
use crate::{
    auth::AuthUser,
    error::AppError,
    extract::{ApiPath, ApiQuery},
    models::{Notification, Page, Pagination},
    AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/unread/count", get(unread_count))
        .route("/notifications/read-all", put(mark_all_read))
        .route("/notifications/read/clear", delete(clear_read))
        .route("/notifications/type/:kind", get(by_type))
        .route("/notifications/:id", delete(delete_notification))
        .route("/notifications/:id/read", put(mark_read))
        .with_state(state)
}

async fn list_notifications(
    State(state): State<AppState>,
    me: AuthUser,
    ApiQuery(params): ApiQuery<PageParams>,
) -> Result<Json<Page<Notification>>, AppError> {
    let paging = Paging::new(params.page, params.limit);
    let (items, total) = state
        .store
        .notifications(me.id, paging.limit, paging.offset)
        .await?;

    Ok(Json(Page { items, pagination: Pagination::new(paging.page, paging.limit, total) }))
}

async fn unread_count(State(state): State<AppState>, me: AuthUser) -> Result<Json<Value>, AppError> {
    let count = state.store.unread_count(me.id).await?;
    Ok(Json(json!({ "count": count })))
}

async fn mark_read(
    State(state): State<AppState>,
    me: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Notification>, AppError> {
    let notification = state
        .store
        .mark_read(me.id, id)
        .await?
        .ok_or(AppError::NotFound("Notification"))?;
    Ok(Json(notification))
}

async fn mark_all_read(State(state): State<AppState>, me: AuthUser) -> Result<Json<Value>, AppError> {
    let updated = state.store.mark_all_read(me.id).await?;
    Ok(Json(json!({ "message": "All notifications marked as read", "updated": updated })))
}

async fn delete_notification(
    State(state): State<AppState>,
    me: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    if !state.store.delete_notification(me.id, id).await? {
        return Err(AppError::NotFound("Notification"));
    }
    Ok(Json(message("Notification deleted successfully")))
}

async fn clear_read(State(state): State<AppState>, me: AuthUser) -> Result<Json<Value>, AppError> {
    let deleted = state.store.clear_read(me.id).await?;
    Ok(Json(json!({ "message": "Read notifications cleared", "deleted": deleted })))
}

async fn by_type(
    State(state): State<AppState>,
    me: AuthUser,
    ApiPath(kind): ApiPath<String>,
) -> Result<Json<Vec<Notification>>, AppError> {
    Ok(Json(state.store.notifications_by_type(me.id, &kind).await?))
}
