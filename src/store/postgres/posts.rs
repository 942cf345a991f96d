use async_trait::async_trait;
use uuid::Uuid;

use super::PgStore;
use crate::models::{Comment, LikeState, NewComment, NewPost, Post, PostPatch};
use crate::store::{FeedQuery, PostStore, StoreError, StoreResult};

const POST_COLUMNS: &str = "id, author_id, content, post_type, privacy_level, compound_tags, \
    media_urls, likes_count, comments_count, created_at, updated_at";

const COMMENT_COLUMNS: &str = "id, post_id, author_id, content, created_at, updated_at";

/// Rows of `posts` the viewer bound at `$1` may read.
const VISIBLE_TO: &str = "(author_id = $1
    OR privacy_level = 'public'
    OR (privacy_level = 'followers' AND EXISTS (
        SELECT 1 FROM followers f WHERE f.follower_id = $1 AND f.following_id = posts.author_id)))";

#[async_trait]
impl PostStore for PgStore {
    async fn create_post(&self, author: Uuid, draft: &NewPost) -> StoreResult<Post> {
        let post = sqlx::query_as::<_, Post>(&format!(
            "INSERT INTO posts (id, author_id, content, post_type, privacy_level, compound_tags, media_urls)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {POST_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(author)
        .bind(&draft.content)
        .bind(draft.post_type)
        .bind(draft.privacy_level.unwrap_or_default())
        .bind(&draft.compound_tags)
        .bind(&draft.media_urls)
        .fetch_one(&self.pool)
        .await?;
        Ok(post)
    }

    async fn feed(&self, viewer: Uuid, query: FeedQuery) -> StoreResult<(Vec<Post>, i64)> {
        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM posts
             WHERE {VISIBLE_TO} AND ($2::post_type IS NULL OR post_type = $2)"
        ))
        .bind(viewer)
        .bind(query.post_type)
        .fetch_one(&self.pool)
        .await?;

        let posts = sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts
             WHERE {VISIBLE_TO} AND ($2::post_type IS NULL OR post_type = $2)
             ORDER BY created_at DESC
             LIMIT $3 OFFSET $4"
        ))
        .bind(viewer)
        .bind(query.post_type)
        .bind(i64::from(query.limit))
        .bind(i64::from(query.offset))
        .fetch_all(&self.pool)
        .await?;

        Ok((posts, total))
    }

    async fn visible_post(&self, viewer: Uuid, id: Uuid) -> StoreResult<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = $2 AND {VISIBLE_TO}"
        ))
        .bind(viewer)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(post)
    }

    async fn update_post(&self, author: Uuid, id: Uuid, patch: &PostPatch) -> StoreResult<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(&format!(
            "UPDATE posts SET
                content = COALESCE($3, content),
                post_type = COALESCE($4, post_type),
                privacy_level = COALESCE($5, privacy_level),
                compound_tags = COALESCE($6, compound_tags),
                media_urls = COALESCE($7, media_urls),
                updated_at = NOW()
             WHERE id = $1 AND author_id = $2
             RETURNING {POST_COLUMNS}"
        ))
        .bind(id)
        .bind(author)
        .bind(&patch.content)
        .bind(patch.post_type)
        .bind(patch.privacy_level)
        .bind(&patch.compound_tags)
        .bind(&patch.media_urls)
        .fetch_optional(&self.pool)
        .await?;
        Ok(post)
    }

    async fn delete_post(&self, author: Uuid, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1 AND author_id = $2")
            .bind(id)
            .bind(author)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn toggle_like(&self, user: Uuid, post: Uuid) -> StoreResult<LikeState> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM likes WHERE post_id = $1 AND user_id = $2")
            .bind(post)
            .bind(user)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        let state = if removed {
            let likes_count = sqlx::query_scalar::<_, i32>(
                "UPDATE posts SET likes_count = GREATEST(likes_count - 1, 0) WHERE id = $1 RETURNING likes_count",
            )
            .bind(post)
            .fetch_one(&mut *tx)
            .await?;
            LikeState { liked: false, likes_count }
        } else {
            let inserted = sqlx::query(
                "INSERT INTO likes (id, post_id, user_id) VALUES ($1, $2, $3)
                 ON CONFLICT (post_id, user_id) DO NOTHING",
            )
            .bind(Uuid::new_v4())
            .bind(post)
            .bind(user)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            // A concurrent request already inserted the like; leave the counter.
            let sql = if inserted > 0 {
                "UPDATE posts SET likes_count = likes_count + 1 WHERE id = $1 RETURNING likes_count"
            } else {
                "SELECT likes_count FROM posts WHERE id = $1"
            };
            let likes_count = sqlx::query_scalar::<_, i32>(sql)
                .bind(post)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(StoreError::InvalidReference)?;
            LikeState { liked: true, likes_count }
        };

        tx.commit().await?;
        Ok(state)
    }

    async fn unlike(&self, user: Uuid, post: Uuid) -> StoreResult<Option<LikeState>> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM likes WHERE post_id = $1 AND user_id = $2")
            .bind(post)
            .bind(user)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if removed == 0 {
            return Ok(None);
        }

        let likes_count = sqlx::query_scalar::<_, i32>(
            "UPDATE posts SET likes_count = GREATEST(likes_count - 1, 0) WHERE id = $1 RETURNING likes_count",
        )
        .bind(post)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(LikeState { liked: false, likes_count }))
    }

    async fn comments(&self, post: Uuid) -> StoreResult<Vec<Comment>> {
        let comments = sqlx::query_as::<_, Comment>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE post_id = $1 ORDER BY created_at"
        ))
        .bind(post)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    async fn add_comment(&self, author: Uuid, post: Uuid, draft: &NewComment) -> StoreResult<Comment> {
        let mut tx = self.pool.begin().await?;

        let comment = sqlx::query_as::<_, Comment>(&format!(
            "INSERT INTO comments (id, post_id, author_id, content)
             VALUES ($1, $2, $3, $4)
             RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(post)
        .bind(author)
        .bind(&draft.content)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE posts SET comments_count = comments_count + 1 WHERE id = $1")
            .bind(post)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(comment)
    }

    async fn delete_comment(&self, author: Uuid, post: Uuid, comment: Uuid) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM comments WHERE id = $1 AND post_id = $2 AND author_id = $3")
            .bind(comment)
            .bind(post)
            .bind(author)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if removed == 0 {
            return Ok(false);
        }

        sqlx::query("UPDATE posts SET comments_count = GREATEST(comments_count - 1, 0) WHERE id = $1")
            .bind(post)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }
}
