mod common;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_trait::async_trait;
use chrono::NaiveDate;
use notnatty_backend::{
    app,
    client::{
        reconciler::{AWAITING_CYCLE, OFFLINE_CYCLE, OFFLINE_INJECTION, OFFLINE_LOAD, OFFLINE_POST},
        HttpRemote, ReconcileError, Reconciler, RemoteApi, RemoteError, RemoteResult,
    },
    models::{
        Compound, Cycle, Injection, LikeState, NewCycle, NewInjection, NewPost, NewSideEffect, Post,
        SideEffect,
    },
    store::MemoryStore,
    AppState,
};
use serde_json::json;
use tokio::net::TcpListener;
use uuid::Uuid;

use common::{test_config, RecordingMailer, PASSWORD};

async fn spawn_server() -> String {
    let store = Arc::new(MemoryStore::with_default_compounds());
    let state = AppState::new(test_config(), store, Arc::new(RecordingMailer::default())).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app(state)).await.unwrap() });
    format!("http://{addr}")
}

async fn sign_up(base: &str, username: &str) -> (HttpRemote, Uuid) {
    let email = format!("{username}@example.com");
    let response = reqwest::Client::new()
        .post(format!("{base}/auth/register"))
        .json(&json!({ "email": email, "username": username, "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);

    let (remote, user) = HttpRemote::login(base, &email, PASSWORD).await.unwrap();
    (remote, user.id)
}

/// A live `HttpRemote` that can be switched off, standing in for a phone
/// losing its connection.
struct Flaky {
    inner: HttpRemote,
    online: AtomicBool,
}

impl Flaky {
    fn offline(inner: HttpRemote) -> Self {
        Self { inner, online: AtomicBool::new(false) }
    }

    fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    fn reach(&self) -> RemoteResult<&HttpRemote> {
        if self.online.load(Ordering::SeqCst) {
            Ok(&self.inner)
        } else {
            Err(RemoteError::Transient("airplane mode".into()))
        }
    }
}

#[async_trait]
impl RemoteApi for Flaky {
    async fn posts(&self) -> RemoteResult<Vec<Post>> {
        self.reach()?.posts().await
    }

    async fn create_post(&self, draft: &NewPost) -> RemoteResult<Post> {
        self.reach()?.create_post(draft).await
    }

    async fn delete_post(&self, id: Uuid) -> RemoteResult<()> {
        self.reach()?.delete_post(id).await
    }

    async fn toggle_like(&self, id: Uuid) -> RemoteResult<LikeState> {
        self.reach()?.toggle_like(id).await
    }

    async fn cycles(&self) -> RemoteResult<Vec<Cycle>> {
        self.reach()?.cycles().await
    }

    async fn create_cycle(&self, draft: &NewCycle) -> RemoteResult<Cycle> {
        self.reach()?.create_cycle(draft).await
    }

    async fn injections(&self) -> RemoteResult<Vec<Injection>> {
        self.reach()?.injections().await
    }

    async fn create_injection(&self, draft: &NewInjection) -> RemoteResult<Injection> {
        self.reach()?.create_injection(draft).await
    }

    async fn side_effects(&self) -> RemoteResult<Vec<SideEffect>> {
        self.reach()?.side_effects().await
    }

    async fn create_side_effect(&self, draft: &NewSideEffect) -> RemoteResult<SideEffect> {
        self.reach()?.create_side_effect(draft).await
    }

    async fn compounds(&self) -> RemoteResult<Vec<Compound>> {
        self.reach()?.compounds().await
    }
}

#[tokio::test]
async fn reconciler_talks_to_a_live_server() {
    let base = spawn_server().await;
    let (remote, owner) = sign_up(&base, "online").await;
    let mut rec = Reconciler::new(remote, owner);

    let report = rec.load().await.unwrap();
    assert!(!report.offline);
    assert!(rec.cache().compounds().len() > 2);
    let compound = rec.cache().compounds()[0].id;

    let post = rec
        .create_post(NewPost { content: "synced straight away".into(), ..Default::default() })
        .await
        .unwrap();
    assert!(!post.is_local());
    let post = post.into_record();

    let like = rec.toggle_like(post.id).await.unwrap();
    assert!(like.liked);
    assert_eq!(like.likes_count, 1);

    let cycle = rec
        .create_cycle(NewCycle {
            name: "Live".into(),
            start_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            ..Default::default()
        })
        .await
        .unwrap()
        .into_record();
    rec.log_injection(NewInjection {
        cycle_id: Some(cycle.id),
        compound_id: compound,
        dosage: 100.0,
        injection_site: "delt".into(),
        ..Default::default()
    })
    .await
    .unwrap();

    rec.load().await.unwrap();
    assert_eq!(rec.cache().posts()[0].id, post.id);
    assert_eq!(rec.cache().posts()[0].likes_count, 1);
    assert_eq!(rec.cache().injections()[0].cycle_id, Some(cycle.id));

    let deleted = rec.delete_post(post.id).await.unwrap();
    assert!(!deleted.is_local());
    rec.load().await.unwrap();
    assert!(rec.cache().posts().is_empty());
}

#[tokio::test]
async fn server_rejections_are_not_queued() {
    let base = spawn_server().await;
    let (remote, owner) = sign_up(&base, "rejected").await;
    let mut rec = Reconciler::new(remote, owner);

    let err = rec
        .log_side_effect(NewSideEffect {
            cycle_id: Some(Uuid::new_v4()),
            symptoms: vec!["headache".into()],
            severity: 3,
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ReconcileError::Rejected { status: 404, .. }));
    assert_eq!(rec.pending(), 0);
    assert!(rec.cache().side_effects().is_empty());
}

#[tokio::test]
async fn bad_credentials_and_tokens_are_rejections() {
    let base = spawn_server().await;
    sign_up(&base, "someone").await;

    let Err(err) = HttpRemote::login(&base, "someone@example.com", "not-the-password").await else {
        panic!("login with a wrong password succeeded");
    };
    assert_eq!(
        err,
        RemoteError::Rejected { status: 401, error: "Invalid credentials".into(), message: "Email or password is incorrect".into() }
    );

    let mut rec = Reconciler::new(HttpRemote::new(base.as_str(), "forged").unwrap(), Uuid::new_v4());
    let err = rec.load().await.unwrap_err();
    assert!(matches!(err, ReconcileError::Rejected { status: 401, .. }));
}

#[tokio::test]
async fn unreachable_server_falls_back_to_local_data() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let remote = HttpRemote::new(format!("http://{addr}"), "token").unwrap();
    let mut rec = Reconciler::new(remote, Uuid::new_v4());

    let report = rec.load().await.unwrap();
    assert!(report.offline);
    assert_eq!(report.advisory, Some(OFFLINE_LOAD));
    assert_eq!(rec.cache().compounds().len(), 2);

    let outcome = rec
        .create_post(NewPost { content: "written on a plane".into(), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(outcome.advisory(), Some(OFFLINE_POST));
    assert_eq!(rec.cache().posts().len(), 1);

    let report = rec.sync().await;
    assert_eq!(report.synced, 0);
    assert_eq!(report.remaining, 1);
}

#[tokio::test]
async fn offline_work_on_seeded_compounds_syncs_after_reconnecting() {
    let base = spawn_server().await;
    let (remote, owner) = sign_up(&base, "commuter").await;
    let mut rec = Reconciler::new(Flaky::offline(remote), owner);

    let report = rec.load().await.unwrap();
    assert!(report.offline);
    let creatine = rec.cache().compounds().iter().find(|c| c.name == "Creatine Monohydrate").unwrap().id;

    let standalone = rec
        .log_injection(NewInjection { compound_id: creatine, dosage: 5.0, injection_site: "oral".into(), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(standalone.advisory(), Some(OFFLINE_INJECTION));

    let cycle = rec
        .create_cycle(NewCycle {
            name: "Summer".into(),
            start_date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(cycle.advisory(), Some(OFFLINE_CYCLE));
    let local_cycle = cycle.into_record().id;

    // Signal is back, but nothing has been synced yet.
    rec.remote().set_online(true);
    let shot = rec
        .log_injection(NewInjection {
            cycle_id: Some(local_cycle),
            compound_id: creatine,
            dosage: 5.0,
            injection_site: "oral".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(shot.advisory(), Some(AWAITING_CYCLE));
    assert_eq!(rec.pending(), 3);

    let report = rec.sync().await;
    assert!(report.rejected.is_empty(), "{:?}", report.rejected);
    assert_eq!(report.synced, 3);
    assert_eq!(report.remaining, 0);

    rec.load().await.unwrap();
    let server_cycle = rec.cache().cycles()[0].id;
    assert_ne!(server_cycle, local_cycle);
    let injections = rec.cache().injections();
    assert_eq!(injections.len(), 2);
    assert!(injections.iter().all(|i| i.compound_id == creatine));
    assert_eq!(injections.iter().filter(|i| i.cycle_id == Some(server_cycle)).count(), 1);
}
