use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    conflict_message, CompoundStore, Credentials, CycleStore, FeedQuery, LogStore,
    NewUserRecord, NotificationStore, PostStore, SocialStore, StoreError, StoreResult,
    UserStore, DEFAULT_COMPOUNDS,
};
use crate::models::{
    Comment, Compound, Cycle, CycleCompound, CyclePatch, Injection, InjectionPatch, LikeState,
    NewComment, NewCompound, NewCycle, NewCycleCompound, NewInjection, NewNotification, NewPost,
    NewSideEffect, Notification, Post, PostPatch, PrivacyLevel, ProfilePatch, SideEffect,
    SideEffectPatch, User, UserSettings, VerificationStatus,
};

struct UserRow {
    user: User,
    password_hash: String,
    verification: Option<(String, DateTime<Utc>)>,
    reset: Option<(String, DateTime<Utc>)>,
}

struct Follow {
    follower: Uuid,
    following: Uuid,
}

#[derive(Default)]
struct Tables {
    users: Vec<UserRow>,
    follows: Vec<Follow>,
    posts: Vec<Post>,
    /// (post, user)
    likes: HashSet<(Uuid, Uuid)>,
    comments: Vec<Comment>,
    compounds: Vec<Compound>,
    cycles: Vec<Cycle>,
    injections: Vec<Injection>,
    side_effects: Vec<SideEffect>,
    notifications: Vec<Notification>,
}

impl Tables {
    fn user(&self, id: Uuid) -> Option<&UserRow> {
        self.users.iter().find(|row| row.user.id == id)
    }

    fn user_mut(&mut self, id: Uuid) -> Option<&mut UserRow> {
        self.users.iter_mut().find(|row| row.user.id == id)
    }

    fn follows(&self, follower: Uuid, following: Uuid) -> bool {
        self.follows
            .iter()
            .any(|f| f.follower == follower && f.following == following)
    }

    fn can_see(&self, viewer: Uuid, post: &Post) -> bool {
        post.author_id == viewer
            || match post.privacy_level {
                PrivacyLevel::Public => true,
                PrivacyLevel::Followers => self.follows(viewer, post.author_id),
                PrivacyLevel::Private => false,
            }
    }

    fn has_compound(&self, id: Uuid) -> bool {
        self.compounds.iter().any(|c| c.id == id)
    }

    fn like_state(&self, post: Uuid, liked: bool) -> LikeState {
        let likes_count = self
            .posts
            .iter()
            .find(|p| p.id == post)
            .map(|p| p.likes_count)
            .unwrap_or_default();
        LikeState { liked, likes_count }
    }

    fn adjust_likes(&mut self, post: Uuid, delta: i32) {
        if let Some(p) = self.posts.iter_mut().find(|p| p.id == post) {
            p.likes_count = (p.likes_count + delta).max(0);
        }
    }
}

/// Process-local store with the same contracts as `PgStore`. One lock over
/// all tables keeps the cross-table updates (likes, comment counters,
/// cascades) atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_compounds() -> Self {
        let now = Utc::now();
        let compounds = DEFAULT_COMPOUNDS.iter().map(|seed| seed.compound(now)).collect();

        Self {
            tables: RwLock::new(Tables { compounds, ..Tables::default() }),
        }
    }
}

fn conflict(constraint: &str) -> StoreError {
    StoreError::Conflict(conflict_message(constraint).to_string())
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, record: NewUserRecord) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|row| row.user.email == record.email) {
            return Err(conflict("users_email_unique"));
        }
        if tables.users.iter().any(|row| row.user.username == record.username) {
            return Err(conflict("users_username_unique"));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: record.email,
            username: record.username,
            full_name: record.full_name,
            bio: None,
            avatar_url: None,
            height_cm: None,
            weight_kg: None,
            date_of_birth: None,
            verification_status: VerificationStatus::Unverified,
            email_verified: false,
            is_active: true,
            last_login_at: None,
            settings: UserSettings::default(),
            created_at: now,
            updated_at: now,
        };
        tables.users.push(UserRow {
            user: user.clone(),
            password_hash: record.password_hash,
            verification: Some((record.verification_token, record.verification_expires)),
            reset: None,
        });
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.user(id).map(|row| row.user.clone()))
    }

    async fn find_credentials(&self, email: &str) -> StoreResult<Option<Credentials>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|row| row.user.email == email)
            .map(|row| Credentials {
                user: row.user.clone(),
                password_hash: row.password_hash.clone(),
            }))
    }

    async fn email_or_username_taken(&self, email: &str, username: &str) -> StoreResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .any(|row| row.user.email == email || row.user.username == username))
    }

    async fn update_profile(&self, id: Uuid, patch: &ProfilePatch) -> StoreResult<Option<User>> {
        let mut tables = self.tables.write().await;
        let Some(row) = tables.user_mut(id) else {
            return Ok(None);
        };

        let user = &mut row.user;
        if let Some(v) = &patch.full_name {
            user.full_name = Some(v.clone());
        }
        if let Some(v) = &patch.bio {
            user.bio = Some(v.clone());
        }
        if let Some(v) = &patch.avatar_url {
            user.avatar_url = Some(v.clone());
        }
        if let Some(v) = patch.height_cm {
            user.height_cm = Some(v);
        }
        if let Some(v) = patch.weight_kg {
            user.weight_kg = Some(v);
        }
        if let Some(v) = patch.date_of_birth {
            user.date_of_birth = Some(v);
        }
        if let Some(v) = &patch.settings {
            user.settings = v.clone();
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        if let Some(row) = self.tables.write().await.user_mut(id) {
            row.user.last_login_at = Some(at);
        }
        Ok(())
    }

    async fn set_active(&self, id: Uuid, active: bool) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let Some(row) = tables.user_mut(id) else {
            return Ok(false);
        };
        row.user.is_active = active;
        row.user.updated_at = Utc::now();
        Ok(true)
    }

    async fn set_verification_token(&self, id: Uuid, token: &str, expires: DateTime<Utc>) -> StoreResult<()> {
        if let Some(row) = self.tables.write().await.user_mut(id) {
            row.verification = Some((token.to_string(), expires));
        }
        Ok(())
    }

    async fn verify_email(&self, token: &str, now: DateTime<Utc>) -> StoreResult<Option<User>> {
        let mut tables = self.tables.write().await;
        let row = tables.users.iter_mut().find(|row| {
            row.verification
                .as_ref()
                .is_some_and(|(t, expires)| t == token && *expires > now)
        });
        Ok(row.map(|row| {
            row.verification = None;
            row.user.email_verified = true;
            row.user.updated_at = now;
            row.user.clone()
        }))
    }

    async fn set_reset_token(&self, id: Uuid, token: &str, expires: DateTime<Utc>) -> StoreResult<()> {
        if let Some(row) = self.tables.write().await.user_mut(id) {
            row.reset = Some((token.to_string(), expires));
        }
        Ok(())
    }

    async fn reset_password(&self, token: &str, password_hash: &str, now: DateTime<Utc>) -> StoreResult<Option<User>> {
        let mut tables = self.tables.write().await;
        let row = tables.users.iter_mut().find(|row| {
            row.reset
                .as_ref()
                .is_some_and(|(t, expires)| t == token && *expires > now)
        });
        Ok(row.map(|row| {
            row.reset = None;
            row.password_hash = password_hash.to_string();
            row.user.updated_at = now;
            row.user.clone()
        }))
    }

    async fn verified_users(&self) -> StoreResult<Vec<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .filter(|row| row.user.verification_status == VerificationStatus::Verified && row.user.is_active)
            .map(|row| row.user.clone())
            .collect())
    }
}

#[async_trait]
impl SocialStore for MemoryStore {
    async fn follow(&self, follower: Uuid, following: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.user(follower).is_none() || tables.user(following).is_none() {
            return Err(StoreError::InvalidReference);
        }
        if tables.follows(follower, following) {
            return Err(conflict("followers_pair_unique"));
        }
        tables.follows.push(Follow { follower, following });
        Ok(())
    }

    async fn unfollow(&self, follower: Uuid, following: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.follows.len();
        tables
            .follows
            .retain(|f| !(f.follower == follower && f.following == following));
        Ok(tables.follows.len() < before)
    }

    async fn followers(&self, user: Uuid) -> StoreResult<Vec<User>> {
        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables
            .follows
            .iter()
            .filter(|f| f.following == user)
            .filter_map(|f| tables.user(f.follower).map(|row| row.user.clone()))
            .collect();
        users.sort_by(|x, y| x.username.cmp(&y.username));
        Ok(users)
    }

    async fn following(&self, user: Uuid) -> StoreResult<Vec<User>> {
        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables
            .follows
            .iter()
            .filter(|f| f.follower == user)
            .filter_map(|f| tables.user(f.following).map(|row| row.user.clone()))
            .collect();
        users.sort_by(|x, y| x.username.cmp(&y.username));
        Ok(users)
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn create_post(&self, author: Uuid, draft: &NewPost) -> StoreResult<Post> {
        let mut tables = self.tables.write().await;
        if tables.user(author).is_none() {
            return Err(StoreError::InvalidReference);
        }

        let now = Utc::now();
        let post = Post {
            id: Uuid::new_v4(),
            author_id: author,
            content: draft.content.clone(),
            post_type: draft.post_type,
            privacy_level: draft.privacy_level.unwrap_or_default(),
            compound_tags: draft.compound_tags.clone(),
            media_urls: draft.media_urls.clone(),
            likes_count: 0,
            comments_count: 0,
            created_at: now,
            updated_at: now,
        };
        tables.posts.push(post.clone());
        Ok(post)
    }

    async fn feed(&self, viewer: Uuid, query: FeedQuery) -> StoreResult<(Vec<Post>, i64)> {
        let tables = self.tables.read().await;
        let visible: Vec<&Post> = tables
            .posts
            .iter()
            .rev()
            .filter(|p| tables.can_see(viewer, p))
            .filter(|p| query.post_type.map_or(true, |t| p.post_type == t))
            .collect();

        let total = visible.len() as i64;
        let page = visible
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn visible_post(&self, viewer: Uuid, id: Uuid) -> StoreResult<Option<Post>> {
        let tables = self.tables.read().await;
        Ok(tables
            .posts
            .iter()
            .find(|p| p.id == id && tables.can_see(viewer, p))
            .cloned())
    }

    async fn update_post(&self, author: Uuid, id: Uuid, patch: &PostPatch) -> StoreResult<Option<Post>> {
        let mut tables = self.tables.write().await;
        let Some(post) = tables
            .posts
            .iter_mut()
            .find(|p| p.id == id && p.author_id == author)
        else {
            return Ok(None);
        };

        if let Some(v) = &patch.content {
            post.content = v.clone();
        }
        if let Some(v) = patch.post_type {
            post.post_type = v;
        }
        if let Some(v) = patch.privacy_level {
            post.privacy_level = v;
        }
        if let Some(v) = &patch.compound_tags {
            post.compound_tags = v.clone();
        }
        if let Some(v) = &patch.media_urls {
            post.media_urls = v.clone();
        }
        post.updated_at = Utc::now();
        Ok(Some(post.clone()))
    }

    async fn delete_post(&self, author: Uuid, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.posts.len();
        tables.posts.retain(|p| !(p.id == id && p.author_id == author));
        if tables.posts.len() == before {
            return Ok(false);
        }
        tables.likes.retain(|(post, _)| *post != id);
        tables.comments.retain(|c| c.post_id != id);
        Ok(true)
    }

    async fn toggle_like(&self, user: Uuid, post: Uuid) -> StoreResult<LikeState> {
        let mut tables = self.tables.write().await;
        if tables.user(user).is_none() || !tables.posts.iter().any(|p| p.id == post) {
            return Err(StoreError::InvalidReference);
        }

        let liked = if tables.likes.remove(&(post, user)) {
            tables.adjust_likes(post, -1);
            false
        } else {
            tables.likes.insert((post, user));
            tables.adjust_likes(post, 1);
            true
        };
        Ok(tables.like_state(post, liked))
    }

    async fn unlike(&self, user: Uuid, post: Uuid) -> StoreResult<Option<LikeState>> {
        let mut tables = self.tables.write().await;
        if !tables.likes.remove(&(post, user)) {
            return Ok(None);
        }
        tables.adjust_likes(post, -1);
        Ok(Some(tables.like_state(post, false)))
    }

    async fn comments(&self, post: Uuid) -> StoreResult<Vec<Comment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .comments
            .iter()
            .filter(|c| c.post_id == post)
            .cloned()
            .collect())
    }

    async fn add_comment(&self, author: Uuid, post: Uuid, draft: &NewComment) -> StoreResult<Comment> {
        let mut tables = self.tables.write().await;
        if tables.user(author).is_none() {
            return Err(StoreError::InvalidReference);
        }
        let Some(target) = tables.posts.iter_mut().find(|p| p.id == post) else {
            return Err(StoreError::InvalidReference);
        };
        target.comments_count += 1;

        let now = Utc::now();
        let comment = Comment {
            id: Uuid::new_v4(),
            post_id: post,
            author_id: author,
            content: draft.content.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.comments.push(comment.clone());
        Ok(comment)
    }

    async fn delete_comment(&self, author: Uuid, post: Uuid, comment: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.comments.len();
        tables
            .comments
            .retain(|c| !(c.id == comment && c.post_id == post && c.author_id == author));
        if tables.comments.len() == before {
            return Ok(false);
        }
        if let Some(p) = tables.posts.iter_mut().find(|p| p.id == post) {
            p.comments_count = (p.comments_count - 1).max(0);
        }
        Ok(true)
    }
}

#[async_trait]
impl CompoundStore for MemoryStore {
    async fn compounds(&self, category: Option<&str>) -> StoreResult<Vec<Compound>> {
        let tables = self.tables.read().await;
        let mut compounds: Vec<Compound> = tables
            .compounds
            .iter()
            .filter(|c| category.map_or(true, |cat| c.category.eq_ignore_ascii_case(cat)))
            .cloned()
            .collect();
        compounds.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(compounds)
    }

    async fn find_compound(&self, id: Uuid) -> StoreResult<Option<Compound>> {
        let tables = self.tables.read().await;
        Ok(tables.compounds.iter().find(|c| c.id == id).cloned())
    }

    async fn create_compound(&self, draft: &NewCompound) -> StoreResult<Compound> {
        let mut tables = self.tables.write().await;
        if tables.compounds.iter().any(|c| c.name == draft.name) {
            return Err(conflict("compounds_name_unique"));
        }

        let compound = Compound {
            id: Uuid::new_v4(),
            name: draft.name.clone(),
            category: draft.category.clone(),
            description: draft.description.clone(),
            half_life_hours: draft.half_life_hours,
            dosage_unit: draft.dosage_unit.clone().unwrap_or_else(|| "mg".into()),
            created_at: Utc::now(),
        };
        tables.compounds.push(compound.clone());
        Ok(compound)
    }
}

fn cycle_compound(cycle: &Cycle, draft: &NewCycleCompound, now: DateTime<Utc>) -> CycleCompound {
    CycleCompound {
        id: Uuid::new_v4(),
        cycle_id: cycle.id,
        compound_id: draft.compound_id,
        dosage: draft.dosage,
        frequency: draft.frequency.clone(),
        start_date: draft.start_date.unwrap_or(cycle.start_date),
        end_date: draft.end_date,
        notes: draft.notes.clone(),
        created_at: now,
    }
}

#[async_trait]
impl CycleStore for MemoryStore {
    async fn create_cycle(&self, user: Uuid, draft: &NewCycle) -> StoreResult<Cycle> {
        let mut tables = self.tables.write().await;
        if tables.user(user).is_none() || !draft.compounds.iter().all(|c| tables.has_compound(c.compound_id)) {
            return Err(StoreError::InvalidReference);
        }
        let mut seen = HashSet::new();
        if !draft.compounds.iter().all(|c| seen.insert(c.compound_id)) {
            return Err(conflict("cycle_compounds_pair_unique"));
        }

        let now = Utc::now();
        let mut cycle = Cycle {
            id: Uuid::new_v4(),
            user_id: user,
            name: draft.name.clone(),
            description: draft.description.clone(),
            start_date: draft.start_date,
            end_date: draft.end_date,
            goals: draft.goals.clone(),
            status: draft.status.unwrap_or_default(),
            notes: draft.notes.clone(),
            compounds: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        cycle.compounds = draft
            .compounds
            .iter()
            .map(|c| cycle_compound(&cycle, c, now))
            .collect();

        tables.cycles.push(cycle.clone());
        Ok(cycle)
    }

    async fn cycles(&self, user: Uuid) -> StoreResult<Vec<Cycle>> {
        let tables = self.tables.read().await;
        let mut cycles: Vec<Cycle> = tables
            .cycles
            .iter()
            .rev()
            .filter(|c| c.user_id == user)
            .cloned()
            .collect();
        cycles.sort_by(|a, b| b.start_date.cmp(&a.start_date));
        Ok(cycles)
    }

    async fn find_cycle(&self, user: Uuid, id: Uuid) -> StoreResult<Option<Cycle>> {
        let tables = self.tables.read().await;
        Ok(tables
            .cycles
            .iter()
            .find(|c| c.id == id && c.user_id == user)
            .cloned())
    }

    async fn update_cycle(&self, user: Uuid, id: Uuid, patch: &CyclePatch) -> StoreResult<Option<Cycle>> {
        let mut tables = self.tables.write().await;
        let Some(cycle) = tables
            .cycles
            .iter_mut()
            .find(|c| c.id == id && c.user_id == user)
        else {
            return Ok(None);
        };

        if let Some(v) = &patch.name {
            cycle.name = v.clone();
        }
        if let Some(v) = &patch.description {
            cycle.description = Some(v.clone());
        }
        if let Some(v) = patch.start_date {
            cycle.start_date = v;
        }
        if let Some(v) = patch.end_date {
            cycle.end_date = Some(v);
        }
        if let Some(v) = &patch.goals {
            cycle.goals = v.clone();
        }
        if let Some(v) = patch.status {
            cycle.status = v;
        }
        if let Some(v) = &patch.notes {
            cycle.notes = Some(v.clone());
        }
        cycle.updated_at = Utc::now();
        Ok(Some(cycle.clone()))
    }

    async fn delete_cycle(&self, user: Uuid, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.cycles.len();
        tables.cycles.retain(|c| !(c.id == id && c.user_id == user));
        if tables.cycles.len() == before {
            return Ok(false);
        }
        for injection in tables.injections.iter_mut().filter(|i| i.cycle_id == Some(id)) {
            injection.cycle_id = None;
        }
        for effect in tables.side_effects.iter_mut().filter(|s| s.cycle_id == Some(id)) {
            effect.cycle_id = None;
        }
        Ok(true)
    }

    async fn add_cycle_compound(&self, user: Uuid, cycle: Uuid, draft: &NewCycleCompound) -> StoreResult<Option<CycleCompound>> {
        let mut tables = self.tables.write().await;
        let known_compound = tables.has_compound(draft.compound_id);
        let Some(cycle) = tables
            .cycles
            .iter_mut()
            .find(|c| c.id == cycle && c.user_id == user)
        else {
            return Ok(None);
        };
        if !known_compound {
            return Err(StoreError::InvalidReference);
        }
        if cycle.compounds.iter().any(|c| c.compound_id == draft.compound_id) {
            return Err(conflict("cycle_compounds_pair_unique"));
        }

        let added = cycle_compound(cycle, draft, Utc::now());
        cycle.compounds.push(added.clone());
        Ok(Some(added))
    }

    async fn remove_cycle_compound(&self, user: Uuid, cycle: Uuid, compound: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let Some(cycle) = tables
            .cycles
            .iter_mut()
            .find(|c| c.id == cycle && c.user_id == user)
        else {
            return Ok(false);
        };
        let before = cycle.compounds.len();
        cycle.compounds.retain(|c| c.compound_id != compound);
        Ok(cycle.compounds.len() < before)
    }
}

#[async_trait]
impl LogStore for MemoryStore {
    async fn create_injection(&self, user: Uuid, draft: &NewInjection) -> StoreResult<Injection> {
        let mut tables = self.tables.write().await;
        let cycle_known = draft
            .cycle_id
            .map_or(true, |id| tables.cycles.iter().any(|c| c.id == id));
        if !tables.has_compound(draft.compound_id) || !cycle_known {
            return Err(StoreError::InvalidReference);
        }

        let now = Utc::now();
        let injection = Injection {
            id: Uuid::new_v4(),
            user_id: user,
            cycle_id: draft.cycle_id,
            compound_id: draft.compound_id,
            dosage: draft.dosage,
            injection_site: draft.injection_site.clone(),
            injected_at: draft.injected_at.unwrap_or(now),
            notes: draft.notes.clone(),
            created_at: now,
        };
        tables.injections.push(injection.clone());
        Ok(injection)
    }

    async fn injections(&self, user: Uuid, cycle: Option<Uuid>) -> StoreResult<Vec<Injection>> {
        let tables = self.tables.read().await;
        let mut injections: Vec<Injection> = tables
            .injections
            .iter()
            .filter(|i| i.user_id == user && cycle.map_or(true, |c| i.cycle_id == Some(c)))
            .cloned()
            .collect();
        injections.sort_by(|a, b| b.injected_at.cmp(&a.injected_at));
        Ok(injections)
    }

    async fn find_injection(&self, user: Uuid, id: Uuid) -> StoreResult<Option<Injection>> {
        let tables = self.tables.read().await;
        Ok(tables
            .injections
            .iter()
            .find(|i| i.id == id && i.user_id == user)
            .cloned())
    }

    async fn update_injection(&self, user: Uuid, id: Uuid, patch: &InjectionPatch) -> StoreResult<Option<Injection>> {
        let mut tables = self.tables.write().await;
        let Some(injection) = tables
            .injections
            .iter_mut()
            .find(|i| i.id == id && i.user_id == user)
        else {
            return Ok(None);
        };

        if let Some(v) = patch.dosage {
            injection.dosage = v;
        }
        if let Some(v) = &patch.injection_site {
            injection.injection_site = v.clone();
        }
        if let Some(v) = patch.injected_at {
            injection.injected_at = v;
        }
        if let Some(v) = &patch.notes {
            injection.notes = Some(v.clone());
        }
        Ok(Some(injection.clone()))
    }

    async fn delete_injection(&self, user: Uuid, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.injections.len();
        tables.injections.retain(|i| !(i.id == id && i.user_id == user));
        Ok(tables.injections.len() < before)
    }

    async fn create_side_effect(&self, user: Uuid, draft: &NewSideEffect) -> StoreResult<SideEffect> {
        let mut tables = self.tables.write().await;
        if let Some(id) = draft.cycle_id {
            if !tables.cycles.iter().any(|c| c.id == id) {
                return Err(StoreError::InvalidReference);
            }
        }

        let now = Utc::now();
        let effect = SideEffect {
            id: Uuid::new_v4(),
            user_id: user,
            cycle_id: draft.cycle_id,
            symptoms: draft.symptoms.clone(),
            severity: draft.severity,
            blood_pressure_systolic: draft.blood_pressure_systolic,
            blood_pressure_diastolic: draft.blood_pressure_diastolic,
            mood_rating: draft.mood_rating,
            libido_rating: draft.libido_rating,
            acne_severity: draft.acne_severity,
            notes: draft.notes.clone(),
            recorded_at: draft.recorded_at.unwrap_or(now),
            created_at: now,
        };
        tables.side_effects.push(effect.clone());
        Ok(effect)
    }

    async fn side_effects(&self, user: Uuid, cycle: Option<Uuid>) -> StoreResult<Vec<SideEffect>> {
        let tables = self.tables.read().await;
        let mut effects: Vec<SideEffect> = tables
            .side_effects
            .iter()
            .filter(|s| s.user_id == user && cycle.map_or(true, |c| s.cycle_id == Some(c)))
            .cloned()
            .collect();
        effects.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(effects)
    }

    async fn find_side_effect(&self, user: Uuid, id: Uuid) -> StoreResult<Option<SideEffect>> {
        let tables = self.tables.read().await;
        Ok(tables
            .side_effects
            .iter()
            .find(|s| s.id == id && s.user_id == user)
            .cloned())
    }

    async fn update_side_effect(&self, user: Uuid, id: Uuid, patch: &SideEffectPatch) -> StoreResult<Option<SideEffect>> {
        let mut tables = self.tables.write().await;
        let Some(effect) = tables
            .side_effects
            .iter_mut()
            .find(|s| s.id == id && s.user_id == user)
        else {
            return Ok(None);
        };

        if let Some(v) = &patch.symptoms {
            effect.symptoms = v.clone();
        }
        if let Some(v) = patch.severity {
            effect.severity = v;
        }
        if let Some(v) = patch.blood_pressure_systolic {
            effect.blood_pressure_systolic = Some(v);
        }
        if let Some(v) = patch.blood_pressure_diastolic {
            effect.blood_pressure_diastolic = Some(v);
        }
        if let Some(v) = patch.mood_rating {
            effect.mood_rating = Some(v);
        }
        if let Some(v) = patch.libido_rating {
            effect.libido_rating = Some(v);
        }
        if let Some(v) = patch.acne_severity {
            effect.acne_severity = Some(v);
        }
        if let Some(v) = &patch.notes {
            effect.notes = Some(v.clone());
        }
        if let Some(v) = patch.recorded_at {
            effect.recorded_at = v;
        }
        Ok(Some(effect.clone()))
    }

    async fn delete_side_effect(&self, user: Uuid, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.side_effects.len();
        tables.side_effects.retain(|s| !(s.id == id && s.user_id == user));
        Ok(tables.side_effects.len() < before)
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn notify(&self, notification: NewNotification) -> StoreResult<Notification> {
        let mut tables = self.tables.write().await;
        if tables.user(notification.user_id).is_none() {
            return Err(StoreError::InvalidReference);
        }

        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: notification.user_id,
            kind: notification.kind.to_string(),
            title: notification.title,
            message: notification.message,
            data: notification.data,
            is_read: false,
            created_at: Utc::now(),
        };
        tables.notifications.push(notification.clone());
        Ok(notification)
    }

    async fn notifications(&self, user: Uuid, limit: u32, offset: u32) -> StoreResult<(Vec<Notification>, i64)> {
        let tables = self.tables.read().await;
        let mine: Vec<&Notification> = tables
            .notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == user)
            .collect();
        let total = mine.len() as i64;
        let page = mine
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn unread_count(&self, user: Uuid) -> StoreResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .notifications
            .iter()
            .filter(|n| n.user_id == user && !n.is_read)
            .count() as i64)
    }

    async fn mark_read(&self, user: Uuid, id: Uuid) -> StoreResult<Option<Notification>> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user)
            .map(|n| {
                n.is_read = true;
                n.clone()
            }))
    }

    async fn mark_all_read(&self, user: Uuid) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        let mut changed = 0;
        for n in tables
            .notifications
            .iter_mut()
            .filter(|n| n.user_id == user && !n.is_read)
        {
            n.is_read = true;
            changed += 1;
        }
        Ok(changed)
    }

    async fn delete_notification(&self, user: Uuid, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.notifications.len();
        tables.notifications.retain(|n| !(n.id == id && n.user_id == user));
        Ok(tables.notifications.len() < before)
    }

    async fn clear_read(&self, user: Uuid) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.notifications.len();
        tables.notifications.retain(|n| !(n.user_id == user && n.is_read));
        Ok((before - tables.notifications.len()) as u64)
    }

    async fn notifications_by_type(&self, user: Uuid, kind: &str) -> StoreResult<Vec<Notification>> {
        let tables = self.tables.read().await;
        Ok(tables
            .notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == user && n.kind == kind)
            .cloned()
            .collect())
    }
}
