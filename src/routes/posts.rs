use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{message, notify, Paging};
use crate::{
    auth::AuthUser,
    error::AppError,
    extract::{ApiJson, ApiPath, ApiQuery},
    models::{
        Comment, LikeState, NewComment, NewNotification, NewPost, Page, Pagination, Post,
        PostPatch, PostType,
    },
    store::FeedQuery,
    validation::Validate,
    AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct FeedParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    #[serde(rename = "type")]
    pub post_type: Option<PostType>,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/posts", get(feed).post(create_post))
        .route("/posts/:id", get(get_post).put(update_post).delete(delete_post))
        .route("/posts/:id/like", post(toggle_like).delete(unlike))
        .route("/posts/:id/comments", get(list_comments).post(add_comment))
        .route("/posts/:id/comments/:comment_id", delete(delete_comment))
        .with_state(state)
}

async fn visible(state: &AppState, viewer: Uuid, id: Uuid) -> Result<Post, AppError> {
    state
        .store
        .visible_post(viewer, id)
        .await?
        .ok_or(AppError::NotFound("Post"))
}

async fn feed(
    State(state): State<AppState>,
    me: AuthUser,
    ApiQuery(params): ApiQuery<FeedParams>,
) -> Result<Json<Page<Post>>, AppError> {
    let paging = Paging::new(params.page, params.limit);
    let (items, total) = state
        .store
        .feed(
            me.id,
            FeedQuery { post_type: params.post_type, limit: paging.limit, offset: paging.offset },
        )
        .await?;

    Ok(Json(Page { items, pagination: Pagination::new(paging.page, paging.limit, total) }))
}

async fn create_post(
    State(state): State<AppState>,
    me: AuthUser,
    ApiJson(mut draft): ApiJson<NewPost>,
) -> Result<(StatusCode, Json<Post>), AppError> {
    draft.validate()?;

    if draft.privacy_level.is_none() {
        let author = state.store.find_user(me.id).await?.ok_or(AppError::NotFound("User"))?;
        draft.privacy_level = Some(author.settings.privacy.post_visibility);
    }

    let post = state.store.create_post(me.id, &draft).await?;
    tracing::info!("📝 Post {} created by {}", post.id, me.id);
    Ok((StatusCode::CREATED, Json(post)))
}

async fn get_post(
    State(state): State<AppState>,
    me: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Post>, AppError> {
    Ok(Json(visible(&state, me.id, id).await?))
}

async fn update_post(
    State(state): State<AppState>,
    me: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<PostPatch>,
) -> Result<Json<Post>, AppError> {
    patch.validate()?;

    let post = state
        .store
        .update_post(me.id, id, &patch)
        .await?
        .ok_or(AppError::NotFound("Post"))?;
    Ok(Json(post))
}

async fn delete_post(
    State(state): State<AppState>,
    me: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    if !state.store.delete_post(me.id, id).await? {
        return Err(AppError::NotFound("Post"));
    }
    Ok(Json(message("Post deleted successfully")))
}

async fn toggle_like(
    State(state): State<AppState>,
    me: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<LikeState>, AppError> {
    let post = visible(&state, me.id, id).await?;
    let like = state.store.toggle_like(me.id, id).await?;

    if like.liked && post.author_id != me.id {
        let author = state.store.find_user(post.author_id).await?;
        let liker = state.store.find_user(me.id).await?;
        if let (Some(author), Some(liker)) = (author, liker) {
            if author.settings.notifications.likes {
                notify(
                    &state,
                    NewNotification {
                        user_id: author.id,
                        kind: "like",
                        title: "New like".into(),
                        message: format!("{} liked your post", liker.username),
                        data: json!({ "postId": post.id, "likerId": liker.id }),
                    },
                )
                .await;
            }
        }
    }

    Ok(Json(like))
}

async fn unlike(
    State(state): State<AppState>,
    me: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<LikeState>, AppError> {
    let like = state
        .store
        .unlike(me.id, id)
        .await?
        .ok_or(AppError::NotFound("Like"))?;
    Ok(Json(like))
}

async fn list_comments(
    State(state): State<AppState>,
    me: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Vec<Comment>>, AppError> {
    visible(&state, me.id, id).await?;
    Ok(Json(state.store.comments(id).await?))
}

async fn add_comment(
    State(state): State<AppState>,
    me: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(draft): ApiJson<NewComment>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    draft.validate()?;

    let post = visible(&state, me.id, id).await?;
    let comment = state.store.add_comment(me.id, id, &draft).await?;

    if post.author_id != me.id {
        let author = state.store.find_user(post.author_id).await?;
        let commenter = state.store.find_user(me.id).await?;
        if let (Some(author), Some(commenter)) = (author, commenter) {
            if author.settings.notifications.comments {
                notify(
                    &state,
                    NewNotification {
                        user_id: author.id,
                        kind: "comment",
                        title: "New comment".into(),
                        message: format!("{} commented on your post", commenter.username),
                        data: json!({ "postId": post.id, "commentId": comment.id }),
                    },
                )
                .await;
            }
        }
    }

    Ok((StatusCode::CREATED, Json(comment)))
}

async fn delete_comment(
    State(state): State<AppState>,
    me: AuthUser,
    ApiPath((id, comment_id)): ApiPath<(Uuid, Uuid)>,
) -> Result<Json<Value>, AppError> {
    if !state.store.delete_comment(me.id, id, comment_id).await? {
        return Err(AppError::NotFound("Comment"));
    }
    Ok(Json(message("Comment deleted successfully")))
}
