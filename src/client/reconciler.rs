//! Remote-first mutations with an outbox for the times the remote store is
//! out of reach.
//!
//! Every action validates its draft with the server's own rules, then tries
//! the remote. A record the server returns replaces anything local. When the
//! remote cannot be reached the draft is saved as a locally fabricated record
//! and queued; `sync()` replays the queue later. When the server answers with
//! a rejection nothing is fabricated and the caller gets the error.

use std::collections::VecDeque;

use thiserror::Error;
use uuid::Uuid;

use super::{
    cache::{LocalCache, Snapshot},
    remote::{RemoteApi, RemoteError, RemoteResult},
};
use crate::{
    models::{Cycle, Injection, LikeState, NewCycle, NewInjection, NewPost, NewSideEffect, Post, SideEffect},
    validation::{Validate, ValidationErrors},
};

pub const OFFLINE_LOAD: &str = "Loaded local data (offline).";
pub const OFFLINE_POST: &str = "Created local post (offline).";
pub const OFFLINE_CYCLE: &str = "Created local cycle (offline).";
pub const OFFLINE_INJECTION: &str = "Logged injection locally (offline).";
pub const OFFLINE_SIDE_EFFECT: &str = "Logged side effect locally (offline).";
pub const OFFLINE_DELETE: &str = "Deleted post locally (offline).";
pub const AWAITING_CYCLE: &str = "Saved locally until its cycle reaches the server.";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReconcileError {
    #[error("validation failed")]
    Invalid(#[from] ValidationErrors),

    #[error("{error} ({status}): {message}")]
    Rejected { status: u16, error: String, message: String },

    #[error("this action needs a connection to the server")]
    Offline,

    #[error("the post has not reached the server yet")]
    NotSynced,

    #[error("unreadable server response: {0}")]
    Protocol(String),
}

impl From<RemoteError> for ReconcileError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Transient(_) => ReconcileError::Offline,
            RemoteError::Rejected { status, error, message } => ReconcileError::Rejected { status, error, message },
            RemoteError::Decode(reason) => ReconcileError::Protocol(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The server accepted the action; `T` is its copy of the record.
    Synced(T),
    /// The remote was unreachable; `T` is the local stand-in, queued for `sync()`.
    SavedLocally { record: T, advisory: &'static str },
}

impl<T> Outcome<T> {
    pub fn record(&self) -> &T {
        match self {
            Outcome::Synced(record) | Outcome::SavedLocally { record, .. } => record,
        }
    }

    pub fn into_record(self) -> T {
        match self {
            Outcome::Synced(record) | Outcome::SavedLocally { record, .. } => record,
        }
    }

    pub fn advisory(&self) -> Option<&'static str> {
        match self {
            Outcome::Synced(_) => None,
            Outcome::SavedLocally { advisory, .. } => Some(advisory),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Outcome::SavedLocally { .. })
    }
}

/// A mutation waiting for the remote. Creates carry the fabricated record so
/// it survives a reload and can be swapped for the server's copy.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingOp {
    CreatePost { local: Post, draft: NewPost },
    CreateCycle { local: Cycle, draft: NewCycle },
    LogInjection { local: Injection, draft: NewInjection },
    LogSideEffect { local: SideEffect, draft: NewSideEffect },
    DeletePost { id: Uuid },
}

impl PendingOp {
    fn local_id(&self) -> Option<Uuid> {
        match self {
            PendingOp::CreatePost { local, .. } => Some(local.id),
            PendingOp::CreateCycle { local, .. } => Some(local.id),
            PendingOp::LogInjection { local, .. } => Some(local.id),
            PendingOp::LogSideEffect { local, .. } => Some(local.id),
            PendingOp::DeletePost { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub offline: bool,
    pub advisory: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RejectedOp {
    pub op: PendingOp,
    pub error: ReconcileError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    pub synced: usize,
    pub rejected: Vec<RejectedOp>,
    pub remaining: usize,
    /// A create reached the server but its reply was unreadable, so the
    /// cache was reloaded to pick up the server's copy.
    pub reloaded: bool,
}

pub struct Reconciler<R> {
    remote: R,
    cache: LocalCache,
    outbox: VecDeque<PendingOp>,
}

impl<R: RemoteApi> Reconciler<R> {
    pub fn new(remote: R, owner: Uuid) -> Self {
        Self { remote, cache: LocalCache::new(owner), outbox: VecDeque::new() }
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn pending(&self) -> usize {
        self.outbox.len()
    }

    pub fn outbox(&self) -> impl Iterator<Item = &PendingOp> {
        self.outbox.iter()
    }

    async fn fetch_snapshot(&self) -> RemoteResult<Snapshot> {
        Ok(Snapshot {
            posts: self.remote.posts().await?,
            cycles: self.remote.cycles().await?,
            injections: self.remote.injections().await?,
            side_effects: self.remote.side_effects().await?,
            compounds: self.remote.compounds().await?,
        })
    }

    /// Replaces the cache from the remote. Unreachable remote: existing data
    /// stays, empty collections are seeded and the report says so.
    pub async fn load(&mut self) -> Result<LoadReport, ReconcileError> {
        match self.fetch_snapshot().await {
            Ok(snapshot) => {
                self.cache.replace_all(snapshot);
                self.reapply_outbox();
                tracing::info!("📥 Loaded {} posts and {} cycles", self.cache.posts().len(), self.cache.cycles().len());
                Ok(LoadReport { offline: false, advisory: None })
            }
            Err(e) if e.is_transient() => {
                tracing::warn!("⚠️ Remote unreachable, using local data: {}", e);
                self.cache.seed_if_empty();
                Ok(LoadReport { offline: true, advisory: Some(OFFLINE_LOAD) })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// A fresh snapshot knows nothing of queued work; put it back on top.
    fn reapply_outbox(&mut self) {
        for op in &self.outbox {
            match op {
                PendingOp::CreatePost { local, .. } => self.cache.insert_post(local.clone()),
                PendingOp::CreateCycle { local, .. } => self.cache.insert_cycle(local.clone()),
                PendingOp::LogInjection { local, .. } => self.cache.insert_injection(local.clone()),
                PendingOp::LogSideEffect { local, .. } => self.cache.insert_side_effect(local.clone()),
                PendingOp::DeletePost { id } => {
                    self.cache.remove_post(*id);
                }
            }
        }
    }

    /// Settles a create: server copy on success, fabricated record plus an
    /// outbox entry when the remote is out of reach.
    fn settle<T: Clone>(
        &mut self,
        result: RemoteResult<T>,
        insert: impl FnOnce(&mut LocalCache, T),
        fabricate: impl FnOnce(&mut LocalCache) -> T,
        queue: impl FnOnce(T) -> PendingOp,
        advisory: &'static str,
    ) -> Result<Outcome<T>, ReconcileError> {
        match result {
            Ok(record) => {
                insert(&mut self.cache, record.clone());
                Ok(Outcome::Synced(record))
            }
            Err(e) if e.is_transient() => {
                tracing::warn!("⚠️ {} ({})", advisory, e);
                Ok(self.defer(fabricate, queue, advisory))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn defer<T: Clone>(
        &mut self,
        fabricate: impl FnOnce(&mut LocalCache) -> T,
        queue: impl FnOnce(T) -> PendingOp,
        advisory: &'static str,
    ) -> Outcome<T> {
        let record = fabricate(&mut self.cache);
        self.outbox.push_back(queue(record.clone()));
        Outcome::SavedLocally { record, advisory }
    }

    /// The server has never heard of a cycle whose create is still queued,
    /// so logs against it must wait behind it in the outbox.
    fn cycle_is_queued(&self, cycle: Option<Uuid>) -> bool {
        cycle.is_some_and(|id| {
            self.outbox
                .iter()
                .any(|op| matches!(op, PendingOp::CreateCycle { local, .. } if local.id == id))
        })
    }

    pub async fn create_post(&mut self, draft: NewPost) -> Result<Outcome<Post>, ReconcileError> {
        draft.validate()?;
        let result = self.remote.create_post(&draft).await;
        self.settle(
            result,
            LocalCache::insert_post,
            |cache| cache.insert_local_post(&draft),
            |local| PendingOp::CreatePost { local, draft: draft.clone() },
            OFFLINE_POST,
        )
    }

    pub async fn create_cycle(&mut self, draft: NewCycle) -> Result<Outcome<Cycle>, ReconcileError> {
        draft.validate()?;
        let result = self.remote.create_cycle(&draft).await;
        self.settle(
            result,
            LocalCache::insert_cycle,
            |cache| cache.insert_local_cycle(&draft),
            |local| PendingOp::CreateCycle { local, draft: draft.clone() },
            OFFLINE_CYCLE,
        )
    }

    pub async fn log_injection(&mut self, draft: NewInjection) -> Result<Outcome<Injection>, ReconcileError> {
        draft.validate()?;
        if self.cycle_is_queued(draft.cycle_id) {
            return Ok(self.defer(
                |cache| cache.insert_local_injection(&draft),
                |local| PendingOp::LogInjection { local, draft: draft.clone() },
                AWAITING_CYCLE,
            ));
        }
        let result = self.remote.create_injection(&draft).await;
        self.settle(
            result,
            LocalCache::insert_injection,
            |cache| cache.insert_local_injection(&draft),
            |local| PendingOp::LogInjection { local, draft: draft.clone() },
            OFFLINE_INJECTION,
        )
    }

    pub async fn log_side_effect(&mut self, draft: NewSideEffect) -> Result<Outcome<SideEffect>, ReconcileError> {
        draft.validate()?;
        if self.cycle_is_queued(draft.cycle_id) {
            return Ok(self.defer(
                |cache| cache.insert_local_side_effect(&draft),
                |local| PendingOp::LogSideEffect { local, draft: draft.clone() },
                AWAITING_CYCLE,
            ));
        }
        let result = self.remote.create_side_effect(&draft).await;
        self.settle(
            result,
            LocalCache::insert_side_effect,
            |cache| cache.insert_local_side_effect(&draft),
            |local| PendingOp::LogSideEffect { local, draft: draft.clone() },
            OFFLINE_SIDE_EFFECT,
        )
    }

    /// Deleting a post that only exists locally cancels its queued create.
    /// A 404 from the server means the post is already gone.
    pub async fn delete_post(&mut self, id: Uuid) -> Result<Outcome<()>, ReconcileError> {
        if let Some(pos) = self.outbox.iter().position(|op| op.local_id() == Some(id)) {
            self.outbox.remove(pos);
            self.cache.remove_post(id);
            return Ok(Outcome::Synced(()));
        }

        match self.remote.delete_post(id).await {
            Ok(()) => {
                self.cache.remove_post(id);
                Ok(Outcome::Synced(()))
            }
            Err(e) if e.status() == Some(404) => {
                self.cache.remove_post(id);
                Ok(Outcome::Synced(()))
            }
            Err(e) if e.is_transient() => {
                self.cache.remove_post(id);
                self.outbox.push_back(PendingOp::DeletePost { id });
                Ok(Outcome::SavedLocally { record: (), advisory: OFFLINE_DELETE })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Likes are never queued: the count shown must be the server's.
    pub async fn toggle_like(&mut self, id: Uuid) -> Result<LikeState, ReconcileError> {
        if self.outbox.iter().any(|op| op.local_id() == Some(id)) {
            return Err(ReconcileError::NotSynced);
        }
        let state = self.remote.toggle_like(id).await?;
        self.cache.apply_like(id, state);
        Ok(state)
    }

    /// Replays the outbox oldest first. Stops at the first transient
    /// failure; rejected operations are dropped along with their local record.
    pub async fn sync(&mut self) -> SyncReport {
        let mut report = SyncReport::default();

        while let Some(op) = self.outbox.front().cloned() {
            match self.replay(&op).await {
                Ok(()) => {
                    self.outbox.pop_front();
                    report.synced += 1;
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!("⚠️ Sync paused, remote unreachable: {}", e);
                    break;
                }
                Err(RemoteError::Decode(e)) => {
                    tracing::warn!("⚠️ Server accepted a queued change but its reply was unreadable: {}", e);
                    self.outbox.pop_front();
                    report.synced += 1;
                    report.reloaded = true;
                }
                Err(e) => {
                    tracing::warn!("⚠️ Server rejected a queued change: {}", e);
                    self.outbox.pop_front();
                    self.discard(&op);
                    report.rejected.push(RejectedOp { op, error: e.into() });
                }
            }
        }

        if report.reloaded {
            if let Err(e) = self.load().await {
                tracing::warn!("⚠️ Could not reload after an unreadable reply: {}", e);
            }
        }

        report.remaining = self.outbox.len();
        if report.synced > 0 {
            tracing::info!("📤 Synced {} queued changes, {} left", report.synced, report.remaining);
        }
        report
    }

    async fn replay(&mut self, op: &PendingOp) -> RemoteResult<()> {
        match op {
            PendingOp::CreatePost { local, draft } => {
                let post = self.remote.create_post(draft).await?;
                self.cache.replace_post(local.id, post);
            }
            PendingOp::CreateCycle { local, draft } => {
                let cycle = self.remote.create_cycle(draft).await?;
                self.repoint_cycle(local.id, cycle.id);
                self.cache.replace_cycle(local.id, cycle);
            }
            PendingOp::LogInjection { local, draft } => {
                let injection = self.remote.create_injection(draft).await?;
                self.cache.replace_injection(local.id, injection);
            }
            PendingOp::LogSideEffect { local, draft } => {
                let effect = self.remote.create_side_effect(draft).await?;
                self.cache.replace_side_effect(local.id, effect);
            }
            PendingOp::DeletePost { id } => {
                if let Err(e) = self.remote.delete_post(*id).await {
                    if e.status() != Some(404) {
                        return Err(e);
                    }
                }
            }
        }
        Ok(())
    }

    /// Queued logs recorded against a fabricated cycle must name the
    /// server's id once that cycle is created.
    fn repoint_cycle(&mut self, local: Uuid, server: Uuid) {
        for op in self.outbox.iter_mut() {
            match op {
                PendingOp::LogInjection { local: record, draft } if draft.cycle_id == Some(local) => {
                    draft.cycle_id = Some(server);
                    record.cycle_id = Some(server);
                }
                PendingOp::LogSideEffect { local: record, draft } if draft.cycle_id == Some(local) => {
                    draft.cycle_id = Some(server);
                    record.cycle_id = Some(server);
                }
                _ => {}
            }
        }
    }

    fn discard(&mut self, op: &PendingOp) {
        match op {
            PendingOp::CreatePost { local, .. } => {
                self.cache.remove_post(local.id);
            }
            PendingOp::CreateCycle { local, .. } => {
                self.cache.remove_cycle(local.id);
            }
            PendingOp::LogInjection { local, .. } => {
                self.cache.remove_injection(local.id);
            }
            PendingOp::LogSideEffect { local, .. } => {
                self.cache.remove_side_effect(local.id);
            }
            PendingOp::DeletePost { .. } => {}
        }
    }
}
