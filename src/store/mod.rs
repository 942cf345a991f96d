//! Persistence seam. Handlers only see `dyn Store`; `PgStore` backs
//! production and `MemoryStore` backs tests and `STORE=memory` runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Comment, Compound, Cycle, CycleCompound, CyclePatch, Injection, InjectionPatch, LikeState,
    NewComment, NewCompound, NewCycle, NewCycleCompound, NewInjection, NewNotification, NewPost,
    NewSideEffect, Notification, Post, PostPatch, PostType, ProfilePatch, SideEffect,
    SideEffectPatch, User,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0}")]
    Conflict(String),

    #[error("referenced record does not exist")]
    InvalidReference,

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let Some(db_err) = e.as_database_error() {
            if let Some(code) = db_err.code() {
                tracing::info!("ℹ️ SQLSTATE code: {}", code);
                match &*code {
                    "23505" => {
                        let constraint = db_err.constraint().unwrap_or_default();
                        tracing::info!("🔒 Constraint violated: {}", constraint);
                        return StoreError::Conflict(conflict_message(constraint).to_string());
                    }
                    "23503" => return StoreError::InvalidReference,
                    _ => {}
                }
            }
            tracing::error!("❌ DB error: {}", db_err.message());
        } else {
            tracing::error!("❌ Unknown DB error: {}", e);
        }
        StoreError::Database(e)
    }
}

pub(crate) fn conflict_message(constraint: &str) -> &'static str {
    match constraint {
        "users_email_unique" => "email already exists",
        "users_username_unique" => "username already exists",
        "likes_post_user_unique" => "post is already liked",
        "followers_pair_unique" => "Already following this user",
        "compounds_name_unique" => "name already exists",
        "cycle_compounds_pair_unique" => "compound is already part of this cycle",
        _ => "record already exists",
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A compound every installation starts with. Ids are fixed so that a
/// client seeding its catalogue offline references the same rows the
/// server holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedCompound {
    pub id: Uuid,
    pub name: &'static str,
    pub category: &'static str,
    pub half_life_hours: Option<i32>,
    pub dosage_unit: &'static str,
}

impl SeedCompound {
    const fn new(n: u128, name: &'static str, category: &'static str, half_life_hours: Option<i32>, dosage_unit: &'static str) -> Self {
        Self { id: Uuid::from_u128(0x6e6f_746e_6174_7479_0000_0000_0000_0000 | n), name, category, half_life_hours, dosage_unit }
    }

    pub fn compound(&self, created_at: DateTime<Utc>) -> Compound {
        Compound {
            id: self.id,
            name: self.name.to_string(),
            category: self.category.to_string(),
            description: None,
            half_life_hours: self.half_life_hours,
            dosage_unit: self.dosage_unit.to_string(),
            created_at,
        }
    }
}

/// Compound catalogue installed on first boot.
pub const DEFAULT_COMPOUNDS: &[SeedCompound] = &[
    SeedCompound::new(1, "Testosterone Enanthate", "Testosterone", Some(168), "mg"),
    SeedCompound::new(2, "Testosterone Cypionate", "Testosterone", Some(168), "mg"),
    SeedCompound::new(3, "Testosterone Propionate", "Testosterone", Some(48), "mg"),
    SeedCompound::new(4, "Nandrolone Decanoate", "Nandrolone", Some(336), "mg"),
    SeedCompound::new(5, "Nandrolone Phenylpropionate", "Nandrolone", Some(72), "mg"),
    SeedCompound::new(6, "Boldenone Undecylenate", "Boldenone", Some(336), "mg"),
    SeedCompound::new(7, "Trenbolone Acetate", "Trenbolone", Some(72), "mg"),
    SeedCompound::new(8, "Trenbolone Enanthate", "Trenbolone", Some(168), "mg"),
    SeedCompound::new(9, "Methandrostenolone", "Oral", Some(6), "mg"),
    SeedCompound::new(10, "Oxandrolone", "Oral", Some(8), "mg"),
    SeedCompound::new(11, "Stanozolol", "Oral", Some(9), "mg"),
    SeedCompound::new(12, "Anastrozole", "AI", Some(46), "mg"),
    SeedCompound::new(13, "Letrozole", "AI", Some(48), "mg"),
    SeedCompound::new(14, "Tamoxifen", "SERM", Some(168), "mg"),
    SeedCompound::new(15, "Clomiphene", "SERM", Some(120), "mg"),
    SeedCompound::new(16, "Human Chorionic Gonadotropin", "HCG", Some(24), "IU"),
    SeedCompound::new(17, "Creatine Monohydrate", "Supplement", None, "g"),
    SeedCompound::new(18, "Whey Protein", "Supplement", None, "g"),
];

/// The part of the catalogue a client installs when it starts offline.
pub const OFFLINE_COMPOUNDS: [&str; 2] = ["Creatine Monohydrate", "Whey Protein"];

#[derive(Debug, Clone)]
pub struct NewUserRecord {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub verification_token: String,
    pub verification_expires: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub user: User,
    pub password_hash: String,
}

#[derive(Debug, Clone, Copy)]
pub struct FeedQuery {
    pub post_type: Option<PostType>,
    pub limit: u32,
    pub offset: u32,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, record: NewUserRecord) -> StoreResult<User>;
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    /// Looks up by lower-cased email.
    async fn find_credentials(&self, email: &str) -> StoreResult<Option<Credentials>>;
    async fn email_or_username_taken(&self, email: &str, username: &str) -> StoreResult<bool>;
    async fn update_profile(&self, id: Uuid, patch: &ProfilePatch) -> StoreResult<Option<User>>;
    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()>;
    /// `false` when no such user exists.
    async fn set_active(&self, id: Uuid, active: bool) -> StoreResult<bool>;
    async fn set_verification_token(&self, id: Uuid, token: &str, expires: DateTime<Utc>) -> StoreResult<()>;
    /// Consumes an unexpired verification token.
    async fn verify_email(&self, token: &str, now: DateTime<Utc>) -> StoreResult<Option<User>>;
    async fn set_reset_token(&self, id: Uuid, token: &str, expires: DateTime<Utc>) -> StoreResult<()>;
    /// Consumes an unexpired reset token and swaps the password hash.
    async fn reset_password(&self, token: &str, password_hash: &str, now: DateTime<Utc>) -> StoreResult<Option<User>>;
    async fn verified_users(&self) -> StoreResult<Vec<User>>;
}

#[async_trait]
pub trait SocialStore: Send + Sync {
    async fn follow(&self, follower: Uuid, following: Uuid) -> StoreResult<()>;
    async fn unfollow(&self, follower: Uuid, following: Uuid) -> StoreResult<bool>;
    async fn followers(&self, user: Uuid) -> StoreResult<Vec<User>>;
    async fn following(&self, user: Uuid) -> StoreResult<Vec<User>>;
}

/// Visibility rule for every read: own posts, public posts, and
/// followers-only posts of authors the viewer follows.
#[async_trait]
pub trait PostStore: Send + Sync {
    async fn create_post(&self, author: Uuid, draft: &NewPost) -> StoreResult<Post>;
    async fn feed(&self, viewer: Uuid, query: FeedQuery) -> StoreResult<(Vec<Post>, i64)>;
    async fn visible_post(&self, viewer: Uuid, id: Uuid) -> StoreResult<Option<Post>>;
    async fn update_post(&self, author: Uuid, id: Uuid, patch: &PostPatch) -> StoreResult<Option<Post>>;
    async fn delete_post(&self, author: Uuid, id: Uuid) -> StoreResult<bool>;
    async fn toggle_like(&self, user: Uuid, post: Uuid) -> StoreResult<LikeState>;
    /// `None` when the user had not liked the post.
    async fn unlike(&self, user: Uuid, post: Uuid) -> StoreResult<Option<LikeState>>;
    async fn comments(&self, post: Uuid) -> StoreResult<Vec<Comment>>;
    async fn add_comment(&self, author: Uuid, post: Uuid, draft: &NewComment) -> StoreResult<Comment>;
    async fn delete_comment(&self, author: Uuid, post: Uuid, comment: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait CompoundStore: Send + Sync {
    async fn compounds(&self, category: Option<&str>) -> StoreResult<Vec<Compound>>;
    async fn find_compound(&self, id: Uuid) -> StoreResult<Option<Compound>>;
    async fn create_compound(&self, draft: &NewCompound) -> StoreResult<Compound>;
}

#[async_trait]
pub trait CycleStore: Send + Sync {
    async fn create_cycle(&self, user: Uuid, draft: &NewCycle) -> StoreResult<Cycle>;
    async fn cycles(&self, user: Uuid) -> StoreResult<Vec<Cycle>>;
    async fn find_cycle(&self, user: Uuid, id: Uuid) -> StoreResult<Option<Cycle>>;
    async fn update_cycle(&self, user: Uuid, id: Uuid, patch: &CyclePatch) -> StoreResult<Option<Cycle>>;
    async fn delete_cycle(&self, user: Uuid, id: Uuid) -> StoreResult<bool>;
    /// `None` when the cycle is not the user's.
    async fn add_cycle_compound(&self, user: Uuid, cycle: Uuid, draft: &NewCycleCompound) -> StoreResult<Option<CycleCompound>>;
    async fn remove_cycle_compound(&self, user: Uuid, cycle: Uuid, compound: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait LogStore: Send + Sync {
    async fn create_injection(&self, user: Uuid, draft: &NewInjection) -> StoreResult<Injection>;
    async fn injections(&self, user: Uuid, cycle: Option<Uuid>) -> StoreResult<Vec<Injection>>;
    async fn find_injection(&self, user: Uuid, id: Uuid) -> StoreResult<Option<Injection>>;
    async fn update_injection(&self, user: Uuid, id: Uuid, patch: &InjectionPatch) -> StoreResult<Option<Injection>>;
    async fn delete_injection(&self, user: Uuid, id: Uuid) -> StoreResult<bool>;

    async fn create_side_effect(&self, user: Uuid, draft: &NewSideEffect) -> StoreResult<SideEffect>;
    async fn side_effects(&self, user: Uuid, cycle: Option<Uuid>) -> StoreResult<Vec<SideEffect>>;
    async fn find_side_effect(&self, user: Uuid, id: Uuid) -> StoreResult<Option<SideEffect>>;
    async fn update_side_effect(&self, user: Uuid, id: Uuid, patch: &SideEffectPatch) -> StoreResult<Option<SideEffect>>;
    async fn delete_side_effect(&self, user: Uuid, id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn notify(&self, notification: NewNotification) -> StoreResult<Notification>;
    async fn notifications(&self, user: Uuid, limit: u32, offset: u32) -> StoreResult<(Vec<Notification>, i64)>;
    async fn unread_count(&self, user: Uuid) -> StoreResult<i64>;
    async fn mark_read(&self, user: Uuid, id: Uuid) -> StoreResult<Option<Notification>>;
    async fn mark_all_read(&self, user: Uuid) -> StoreResult<u64>;
    async fn delete_notification(&self, user: Uuid, id: Uuid) -> StoreResult<bool>;
    async fn clear_read(&self, user: Uuid) -> StoreResult<u64>;
    async fn notifications_by_type(&self, user: Uuid, kind: &str) -> StoreResult<Vec<Notification>>;
}

pub trait Store:
    UserStore + SocialStore + PostStore + CompoundStore + CycleStore + LogStore + NotificationStore
{
}

impl<T> Store for T where
    T: UserStore + SocialStore + PostStore + CompoundStore + CycleStore + LogStore + NotificationStore
{
}
