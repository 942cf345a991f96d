//! Device-side copy of the user's data. Holds whatever the last successful
//! load returned, plus records fabricated while the remote was unreachable.

use std::collections::HashSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    models::{
        Compound, Cycle, CycleCompound, Injection, LikeState, NewCycle, NewInjection, NewPost,
        NewSideEffect, Post, SideEffect,
    },
    store::{DEFAULT_COMPOUNDS, OFFLINE_COMPOUNDS},
};

/// Everything `load()` pulls from the remote in one go.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub posts: Vec<Post>,
    pub cycles: Vec<Cycle>,
    pub injections: Vec<Injection>,
    pub side_effects: Vec<SideEffect>,
    pub compounds: Vec<Compound>,
}

trait Keyed {
    fn key(&self) -> Uuid;
}

macro_rules! keyed {
    ($($ty:ty),*) => {
        $(impl Keyed for $ty {
            fn key(&self) -> Uuid {
                self.id
            }
        })*
    };
}

keyed!(Post, Cycle, Injection, SideEffect);

fn replace<T: Keyed>(records: &mut [T], id: Uuid, record: T) -> bool {
    match records.iter_mut().find(|r| r.key() == id) {
        Some(slot) => {
            *slot = record;
            true
        }
        None => false,
    }
}

fn remove<T: Keyed>(records: &mut Vec<T>, id: Uuid) -> Option<T> {
    let pos = records.iter().position(|r| r.key() == id)?;
    Some(records.remove(pos))
}

#[derive(Debug, Clone)]
pub struct LocalCache {
    owner: Uuid,
    data: Snapshot,
    liked: HashSet<Uuid>,
}

impl LocalCache {
    pub fn new(owner: Uuid) -> Self {
        Self { owner, data: Snapshot::default(), liked: HashSet::new() }
    }

    pub fn owner(&self) -> Uuid {
        self.owner
    }

    pub fn posts(&self) -> &[Post] {
        &self.data.posts
    }

    pub fn cycles(&self) -> &[Cycle] {
        &self.data.cycles
    }

    pub fn injections(&self) -> &[Injection] {
        &self.data.injections
    }

    pub fn side_effects(&self) -> &[SideEffect] {
        &self.data.side_effects
    }

    pub fn compounds(&self) -> &[Compound] {
        &self.data.compounds
    }

    pub fn is_liked(&self, post: Uuid) -> bool {
        self.liked.contains(&post)
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.data
    }

    /// Swaps the whole contents for a fresh remote snapshot.
    pub fn replace_all(&mut self, snapshot: Snapshot) {
        self.liked.retain(|id| snapshot.posts.iter().any(|p| p.id == *id));
        self.data = snapshot;
    }

    /// Fallback data for a first launch without connectivity: no user
    /// records and a small compound catalogue so drafts can be composed.
    pub fn seed_if_empty(&mut self) {
        if !self.data.compounds.is_empty() {
            return;
        }
        let now = Utc::now();
        self.data.compounds = DEFAULT_COMPOUNDS
            .iter()
            .filter(|seed| OFFLINE_COMPOUNDS.contains(&seed.name))
            .map(|seed| seed.compound(now))
            .collect();
    }

    // Posts

    pub fn insert_post(&mut self, post: Post) {
        self.data.posts.insert(0, post);
    }

    pub fn insert_local_post(&mut self, draft: &NewPost) -> Post {
        let now = Utc::now();
        let post = Post {
            id: Uuid::new_v4(),
            author_id: self.owner,
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
        self.insert_post(post.clone());
        post
    }

    pub fn replace_post(&mut self, id: Uuid, post: Post) -> bool {
        replace(&mut self.data.posts, id, post)
    }

    pub fn remove_post(&mut self, id: Uuid) -> Option<Post> {
        self.liked.remove(&id);
        remove(&mut self.data.posts, id)
    }

    pub fn apply_like(&mut self, post: Uuid, state: LikeState) {
        if state.liked {
            self.liked.insert(post);
        } else {
            self.liked.remove(&post);
        }
        if let Some(p) = self.data.posts.iter_mut().find(|p| p.id == post) {
            p.likes_count = state.likes_count;
        }
    }

    // Cycles

    pub fn insert_cycle(&mut self, cycle: Cycle) {
        self.data.cycles.insert(0, cycle);
    }

    pub fn insert_local_cycle(&mut self, draft: &NewCycle) -> Cycle {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let compounds = draft
            .compounds
            .iter()
            .map(|c| CycleCompound {
                id: Uuid::new_v4(),
                cycle_id: id,
                compound_id: c.compound_id,
                dosage: c.dosage,
                frequency: c.frequency.clone(),
                start_date: c.start_date.unwrap_or(draft.start_date),
                end_date: c.end_date,
                notes: c.notes.clone(),
                created_at: now,
            })
            .collect();
        let cycle = Cycle {
            id,
            user_id: self.owner,
            name: draft.name.clone(),
            description: draft.description.clone(),
            start_date: draft.start_date,
            end_date: draft.end_date,
            goals: draft.goals.clone(),
            status: draft.status.unwrap_or_default(),
            notes: draft.notes.clone(),
            compounds,
            created_at: now,
            updated_at: now,
        };
        self.insert_cycle(cycle.clone());
        cycle
    }

    /// Swaps a fabricated cycle for the server's copy and repoints the logs
    /// that referenced the fabricated id.
    pub fn replace_cycle(&mut self, id: Uuid, cycle: Cycle) -> bool {
        let server_id = cycle.id;
        for injection in self.data.injections.iter_mut().filter(|i| i.cycle_id == Some(id)) {
            injection.cycle_id = Some(server_id);
        }
        for effect in self.data.side_effects.iter_mut().filter(|s| s.cycle_id == Some(id)) {
            effect.cycle_id = Some(server_id);
        }
        replace(&mut self.data.cycles, id, cycle)
    }

    pub fn remove_cycle(&mut self, id: Uuid) -> Option<Cycle> {
        remove(&mut self.data.cycles, id)
    }

    // Logs

    pub fn insert_injection(&mut self, injection: Injection) {
        self.data.injections.insert(0, injection);
    }

    pub fn insert_local_injection(&mut self, draft: &NewInjection) -> Injection {
        let now = Utc::now();
        let injection = Injection {
            id: Uuid::new_v4(),
            user_id: self.owner,
            cycle_id: draft.cycle_id,
            compound_id: draft.compound_id,
            dosage: draft.dosage,
            injection_site: draft.injection_site.clone(),
            injected_at: draft.injected_at.unwrap_or(now),
            notes: draft.notes.clone(),
            created_at: now,
        };
        self.insert_injection(injection.clone());
        injection
    }

    pub fn replace_injection(&mut self, id: Uuid, injection: Injection) -> bool {
        replace(&mut self.data.injections, id, injection)
    }

    pub fn remove_injection(&mut self, id: Uuid) -> Option<Injection> {
        remove(&mut self.data.injections, id)
    }

    pub fn insert_side_effect(&mut self, effect: SideEffect) {
        self.data.side_effects.insert(0, effect);
    }

    pub fn insert_local_side_effect(&mut self, draft: &NewSideEffect) -> SideEffect {
        let now = Utc::now();
        let effect = SideEffect {
            id: Uuid::new_v4(),
            user_id: self.owner,
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
        self.insert_side_effect(effect.clone());
        effect
    }

    pub fn replace_side_effect(&mut self, id: Uuid, effect: SideEffect) -> bool {
        replace(&mut self.data.side_effects, id, effect)
    }

    pub fn remove_side_effect(&mut self, id: Uuid) -> Option<SideEffect> {
        remove(&mut self.data.side_effects, id)
    }
}
