use serde::{ Serialize, Deserialize };
use uuid::Uuid;
use chrono::{NaiveDate, DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "verification_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    #[default]
    Unverified,
    Pending,
    Verified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "post_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    #[default]
    Progress,
    Cycle,
    Motivation,
    Question,
    Achievement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "privacy_level", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PrivacyLevel {
    #[default]
    Public,
    Followers,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "cycle_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CycleStatus {
    Planned,
    #[default]
    Active,
    Completed,
    Paused,
    Cancelled,
}

// Users

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserSettings {
    pub privacy: PrivacySettings,
    pub notifications: NotificationSettings,
    pub units: UnitSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrivacySettings {
    pub profile_visibility: PrivacyLevel,
    pub cycle_visibility: PrivacyLevel,
    pub post_visibility: PrivacyLevel,
}

impl Default for PrivacySettings {
    fn default() -> Self {
        Self {
            profile_visibility: PrivacyLevel::Public,
            cycle_visibility: PrivacyLevel::Followers,
            post_visibility: PrivacyLevel::Public,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationSettings {
    pub new_followers: bool,
    pub likes: bool,
    pub comments: bool,
    pub cycle_reminders: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self { new_followers: true, likes: true, comments: true, cycle_reminders: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UnitSettings {
    pub weight: String,
    pub dosage: String,
    pub height: String,
}

impl Default for UnitSettings {
    fn default() -> Self {
        Self { weight: "kg".into(), dosage: "mg".into(), height: "cm".into() }
    }
}

/// The account as its owner sees it. The password hash and the one-shot
/// tokens never leave the store layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub height_cm: Option<i32>,
    pub weight_kg: Option<f64>,
    pub date_of_birth: Option<NaiveDate>,
    pub verification_status: VerificationStatus,
    pub email_verified: bool,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub settings: UserSettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: Uuid,
    pub username: String,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub verification_status: VerificationStatus,
    pub created_at: DateTime<Utc>,
}

impl From<User> for PublicProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            full_name: user.full_name,
            bio: user.bio,
            avatar_url: user.avatar_url,
            verification_status: user.verification_status,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub message: String,
    pub user: User,
    pub token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub height_cm: Option<i32>,
    pub weight_kg: Option<f64>,
    pub date_of_birth: Option<NaiveDate>,
    pub settings: Option<UserSettings>,
}

// Posts

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub post_type: PostType,
    pub privacy_level: PrivacyLevel,
    pub compound_tags: Vec<String>,
    pub media_urls: Vec<String>,
    pub likes_count: i32,
    pub comments_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub content: String,
    #[serde(default)]
    pub post_type: PostType,
    /// Falls back to the author's `settings.privacy.postVisibility`.
    pub privacy_level: Option<PrivacyLevel>,
    #[serde(default)]
    pub compound_tags: Vec<String>,
    #[serde(default)]
    pub media_urls: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPatch {
    pub content: Option<String>,
    pub post_type: Option<PostType>,
    pub privacy_level: Option<PrivacyLevel>,
    pub compound_tags: Option<Vec<String>>,
    pub media_urls: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeState {
    pub liked: bool,
    pub likes_count: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewComment {
    pub content: String,
}

// Compounds and cycles

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Compound {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub half_life_hours: Option<i32>,
    pub dosage_unit: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCompound {
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub half_life_hours: Option<i32>,
    pub dosage_unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cycle {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub goals: Vec<String>,
    pub status: CycleStatus,
    pub notes: Option<String>,
    pub compounds: Vec<CycleCompound>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CycleCompound {
    pub id: Uuid,
    pub cycle_id: Uuid,
    pub compound_id: Uuid,
    pub dosage: f64,
    pub frequency: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCycle {
    pub name: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub goals: Vec<String>,
    pub status: Option<CycleStatus>,
    pub notes: Option<String>,
    #[serde(default)]
    pub compounds: Vec<NewCycleCompound>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCycleCompound {
    pub compound_id: Uuid,
    pub dosage: f64,
    pub frequency: String,
    /// Defaults to the cycle's start date.
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CyclePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub goals: Option<Vec<String>>,
    pub status: Option<CycleStatus>,
    pub notes: Option<String>,
}

// Logs

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Injection {
    pub id: Uuid,
    pub user_id: Uuid,
    pub cycle_id: Option<Uuid>,
    pub compound_id: Uuid,
    pub dosage: f64,
    pub injection_site: String,
    pub injected_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInjection {
    pub cycle_id: Option<Uuid>,
    pub compound_id: Uuid,
    pub dosage: f64,
    pub injection_site: String,
    pub injected_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectionPatch {
    pub dosage: Option<f64>,
    pub injection_site: Option<String>,
    pub injected_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SideEffect {
    pub id: Uuid,
    pub user_id: Uuid,
    pub cycle_id: Option<Uuid>,
    pub symptoms: Vec<String>,
    pub severity: i32,
    pub blood_pressure_systolic: Option<i32>,
    pub blood_pressure_diastolic: Option<i32>,
    pub mood_rating: Option<i32>,
    pub libido_rating: Option<i32>,
    pub acne_severity: Option<i32>,
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSideEffect {
    pub cycle_id: Option<Uuid>,
    pub symptoms: Vec<String>,
    pub severity: i32,
    pub blood_pressure_systolic: Option<i32>,
    pub blood_pressure_diastolic: Option<i32>,
    pub mood_rating: Option<i32>,
    pub libido_rating: Option<i32>,
    pub acne_severity: Option<i32>,
    pub notes: Option<String>,
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SideEffectPatch {
    pub symptoms: Option<Vec<String>>,
    pub severity: Option<i32>,
    pub blood_pressure_systolic: Option<i32>,
    pub blood_pressure_diastolic: Option<i32>,
    pub mood_rating: Option<i32>,
    pub libido_rating: Option<i32>,
    pub acne_severity: Option<i32>,
    pub notes: Option<String>,
    pub recorded_at: Option<DateTime<Utc>>,
}

// Notifications

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub kind: &'static str,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
}

// Paging

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub pages: i64,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: i64) -> Self {
        let pages = if limit == 0 { 0 } else { (total + i64::from(limit) - 1) / i64::from(limit) };
        Self { page, limit, total, pages }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}
