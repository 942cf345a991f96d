use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use super::PgStore;
use crate::models::{ProfilePatch, User, UserSettings, VerificationStatus};
use crate::store::{Credentials, NewUserRecord, StoreResult, UserStore};

pub(super) const USER_COLUMNS: &str = "id, email, username, full_name, bio, avatar_url, \
    height_cm, weight_kg, date_of_birth, verification_status, email_verified, is_active, \
    last_login_at, settings, created_at, updated_at";

#[derive(sqlx::FromRow)]
pub(super) struct UserRow {
    id: Uuid,
    email: String,
    username: String,
    full_name: Option<String>,
    bio: Option<String>,
    avatar_url: Option<String>,
    height_cm: Option<i32>,
    weight_kg: Option<f64>,
    date_of_birth: Option<NaiveDate>,
    verification_status: VerificationStatus,
    email_verified: bool,
    is_active: bool,
    last_login_at: Option<DateTime<Utc>>,
    settings: Json<UserSettings>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            username: row.username,
            full_name: row.full_name,
            bio: row.bio,
            avatar_url: row.avatar_url,
            height_cm: row.height_cm,
            weight_kg: row.weight_kg,
            date_of_birth: row.date_of_birth,
            verification_status: row.verification_status,
            email_verified: row.email_verified,
            is_active: row.is_active,
            last_login_at: row.last_login_at,
            settings: row.settings.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CredentialsRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, record: NewUserRecord) -> StoreResult<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (id, email, username, password_hash, full_name, settings,
                                verification_token, verification_expires)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&record.email)
        .bind(&record.username)
        .bind(&record.password_hash)
        .bind(&record.full_name)
        .bind(Json(UserSettings::default()))
        .bind(&record.verification_token)
        .bind(record.verification_expires)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn find_credentials(&self, email: &str) -> StoreResult<Option<Credentials>> {
        let row = sqlx::query_as::<_, CredentialsRow>(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Credentials {
            user: row.user.into(),
            password_hash: row.password_hash,
        }))
    }

    async fn email_or_username_taken(&self, email: &str, username: &str) -> StoreResult<bool> {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM users WHERE email = $1 OR username = $2)",
        )
        .bind(email)
        .bind(username)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    async fn update_profile(&self, id: Uuid, patch: &ProfilePatch) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET
                full_name = COALESCE($2, full_name),
                bio = COALESCE($3, bio),
                avatar_url = COALESCE($4, avatar_url),
                height_cm = COALESCE($5, height_cm),
                weight_kg = COALESCE($6, weight_kg),
                date_of_birth = COALESCE($7, date_of_birth),
                settings = COALESCE($8, settings),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(&patch.full_name)
        .bind(&patch.bio)
        .bind(&patch.avatar_url)
        .bind(patch.height_cm)
        .bind(patch.weight_kg)
        .bind(patch.date_of_birth)
        .bind(patch.settings.clone().map(Json))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query("UPDATE users SET last_login_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_active(&self, id: Uuid, active: bool) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE users SET is_active = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_verification_token(&self, id: Uuid, token: &str, expires: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query("UPDATE users SET verification_token = $2, verification_expires = $3 WHERE id = $1")
            .bind(id)
            .bind(token)
            .bind(expires)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn verify_email(&self, token: &str, now: DateTime<Utc>) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET
                email_verified = TRUE,
                verification_token = NULL,
                verification_expires = NULL,
                updated_at = $2
             WHERE verification_token = $1 AND verification_expires > $2
             RETURNING {USER_COLUMNS}"
        ))
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn set_reset_token(&self, id: Uuid, token: &str, expires: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query("UPDATE users SET reset_token = $2, reset_expires = $3 WHERE id = $1")
            .bind(id)
            .bind(token)
            .bind(expires)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn reset_password(&self, token: &str, password_hash: &str, now: DateTime<Utc>) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET
                password_hash = $2,
                reset_token = NULL,
                reset_expires = NULL,
                updated_at = $3
             WHERE reset_token = $1 AND reset_expires > $3
             RETURNING {USER_COLUMNS}"
        ))
        .bind(token)
        .bind(password_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn verified_users(&self) -> StoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE verification_status = 'verified' AND is_active
             ORDER BY username"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(User::from).collect())
    }
}
