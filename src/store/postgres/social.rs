use async_trait::async_trait;
use uuid::Uuid;

use super::users::{UserRow, USER_COLUMNS};
use super::PgStore;
use crate::models::User;
use crate::store::{SocialStore, StoreResult};

#[async_trait]
impl SocialStore for PgStore {
    async fn follow(&self, follower: Uuid, following: Uuid) -> StoreResult<()> {
        sqlx::query("INSERT INTO followers (id, follower_id, following_id) VALUES ($1, $2, $3)")
            .bind(Uuid::new_v4())
            .bind(follower)
            .bind(following)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn unfollow(&self, follower: Uuid, following: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM followers WHERE follower_id = $1 AND following_id = $2")
            .bind(follower)
            .bind(following)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn followers(&self, user: Uuid) -> StoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE id IN (SELECT follower_id FROM followers WHERE following_id = $1)
             ORDER BY username"
        ))
        .bind(user)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn following(&self, user: Uuid) -> StoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE id IN (SELECT following_id FROM followers WHERE follower_id = $1)
             ORDER BY username"
        ))
        .bind(user)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }
}
