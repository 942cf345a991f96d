use async_trait::async_trait;
use uuid::Uuid;

use super::PgStore;
use crate::models::{NewNotification, Notification};
use crate::store::{NotificationStore, StoreResult};

const NOTIFICATION_COLUMNS: &str = "id, user_id, kind, title, message, data, is_read, created_at";

#[async_trait]
impl NotificationStore for PgStore {
    async fn notify(&self, notification: NewNotification) -> StoreResult<Notification> {
        let stored = sqlx::query_as::<_, Notification>(&format!(
            "INSERT INTO notifications (id, user_id, kind, title, message, data)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(notification.user_id)
        .bind(notification.kind)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.data)
        .fetch_one(&self.pool)
        .await?;
        Ok(stored)
    }

    async fn notifications(&self, user: Uuid, limit: u32, offset: u32) -> StoreResult<(Vec<Notification>, i64)> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM notifications WHERE user_id = $1")
            .bind(user)
            .fetch_one(&self.pool)
            .await?;

        let items = sqlx::query_as::<_, Notification>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications
             WHERE user_id = $1
             ORDER BY created_at DESC
             LIMIT $2 OFFSET $3"
        ))
        .bind(user)
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await?;

        Ok((items, total))
    }

    async fn unread_count(&self, user: Uuid) -> StoreResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT is_read",
        )
        .bind(user)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn mark_read(&self, user: Uuid, id: Uuid) -> StoreResult<Option<Notification>> {
        let notification = sqlx::query_as::<_, Notification>(&format!(
            "UPDATE notifications SET is_read = TRUE
             WHERE id = $1 AND user_id = $2
             RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(id)
        .bind(user)
        .fetch_optional(&self.pool)
        .await?;
        Ok(notification)
    }

    async fn mark_all_read(&self, user: Uuid) -> StoreResult<u64> {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND NOT is_read")
            .bind(user)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_notification(&self, user: Uuid, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_read(&self, user: Uuid) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE user_id = $1 AND is_read")
            .bind(user)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn notifications_by_type(&self, user: Uuid, kind: &str) -> StoreResult<Vec<Notification>> {
        let items = sqlx::query_as::<_, Notification>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications
             WHERE user_id = $1 AND kind = $2
             ORDER BY created_at DESC"
        ))
        .bind(user)
        .bind(kind)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }
}
