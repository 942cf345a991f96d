use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use uuid::Uuid;

use super::{message, notify};
use crate::{
    auth::AuthUser,
    error::AppError,
    extract::{ApiJson, ApiPath},
    models::{NewNotification, ProfilePatch, PublicProfile, User},
    validation::Validate,
    AppState,
};

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/users/profile", get(get_profile).put(update_profile).delete(deactivate))
        .route("/users/verified/list", get(verified_users))
        .route("/users/:id", get(get_user))
        .route("/users/:id/follow", post(follow).delete(unfollow))
        .route("/users/:id/followers", get(followers))
        .route("/users/:id/following", get(following))
        .with_state(state)
}

async fn existing_user(state: &AppState, id: Uuid) -> Result<User, AppError> {
    state.store.find_user(id).await?.ok_or(AppError::NotFound("User"))
}

fn profiles(users: Vec<User>) -> Json<Vec<PublicProfile>> {
    Json(users.into_iter().map(PublicProfile::from).collect())
}

async fn get_profile(State(state): State<AppState>, me: AuthUser) -> Result<Json<User>, AppError> {
    Ok(Json(existing_user(&state, me.id).await?))
}

async fn update_profile(
    State(state): State<AppState>,
    me: AuthUser,
    ApiJson(patch): ApiJson<ProfilePatch>,
) -> Result<Json<User>, AppError> {
    patch.validate()?;

    let user = state
        .store
        .update_profile(me.id, &patch)
        .await?
        .ok_or(AppError::NotFound("User"))?;
    Ok(Json(user))
}

/// Disables the caller's account. Existing tokens stop working at once and
/// login is refused until the account is re-enabled.
async fn deactivate(State(state): State<AppState>, me: AuthUser) -> Result<Json<Value>, AppError> {
    if !state.store.set_active(me.id, false).await? {
        return Err(AppError::NotFound("User"));
    }
    tracing::info!("🔒 User {} deactivated their account", me.id);
    Ok(Json(message("Account deactivated")))
}

async fn verified_users(State(state): State<AppState>) -> Result<Json<Vec<PublicProfile>>, AppError> {
    Ok(profiles(state.store.verified_users().await?))
}

async fn get_user(
    State(state): State<AppState>,
    _me: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<PublicProfile>, AppError> {
    Ok(Json(existing_user(&state, id).await?.into()))
}

async fn follow(
    State(state): State<AppState>,
    me: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    if id == me.id {
        return Err(AppError::BadRequest("You cannot follow yourself".into()));
    }

    let target = existing_user(&state, id).await?;
    let follower = existing_user(&state, me.id).await?;
    state.store.follow(me.id, id).await?;

    if target.settings.notifications.new_followers {
        notify(
            &state,
            NewNotification {
                user_id: target.id,
                kind: "follow",
                title: "New follower".into(),
                message: format!("{} started following you", follower.username),
                data: json!({ "followerId": follower.id }),
            },
        )
        .await;
    }

    Ok((StatusCode::CREATED, Json(message(format!("Now following {}", target.username)))))
}

async fn unfollow(
    State(state): State<AppState>,
    me: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    if !state.store.unfollow(me.id, id).await? {
        return Err(AppError::NotFound("Follow relationship"));
    }
    Ok(Json(message("Unfollowed successfully")))
}

async fn followers(
    State(state): State<AppState>,
    _me: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Vec<PublicProfile>>, AppError> {
    existing_user(&state, id).await?;
    Ok(profiles(state.store.followers(id).await?))
}

async fn following(
    State(state): State<AppState>,
    _me: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Vec<PublicProfile>>, AppError> {
    existing_user(&state, id).await?;
    Ok(profiles(state.store.following(id).await?))
}
