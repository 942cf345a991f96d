#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use notnatty_backend::{
    app,
    config::{Config, StoreKind},
    mailer::{Mail, MailKind, Mailer},
    store::MemoryStore,
    AppState,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "correct-horse";

/// Keeps every mail so tests can pick the mailed tokens back up.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Mail>>,
}

impl RecordingMailer {
    pub fn count(&self, kind: MailKind) -> usize {
        self.sent.lock().unwrap().iter().filter(|m| m.kind == kind).count()
    }

    pub fn last_token(&self, kind: MailKind, to: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|m| m.kind == kind && m.to == to)
            .map(|m| m.token.clone())
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: Mail) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(mail);
        Ok(())
    }
}

pub fn test_config() -> Config {
    Config {
        store: StoreKind::Memory,
        jwt_secret: "integration-secret".into(),
        hash_memory_kib: 1024,
        hash_iterations: 1,
        ..Config::default()
    }
}

pub struct Session {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub token: String,
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub mails: Arc<RecordingMailer>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(MemoryStore::with_default_compounds());
        let mails = Arc::new(RecordingMailer::default());
        let state = AppState::new(config, store.clone(), mails.clone()).unwrap();
        Self { router: app(state), store, mails }
    }

    pub async fn request(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::Null) };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, Some(token), None).await
    }

    pub async fn register(&self, username: &str) -> Session {
        let email = format!("{username}@example.com");
        let (status, body) = self
            .request(
                Method::POST,
                "/auth/register",
                None,
                Some(json!({ "email": email, "username": username, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register {username}: {body}");

        Session {
            id: body["user"]["id"].as_str().unwrap().parse().unwrap(),
            username: username.to_string(),
            email,
            token: body["token"].as_str().unwrap().to_string(),
        }
    }

    pub async fn create_post(&self, author: &Session, content: &str, privacy: &str) -> Uuid {
        let (status, body) = self
            .post("/posts", &author.token, json!({ "content": content, "privacyLevel": privacy }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().parse().unwrap()
    }

    pub async fn compound_id(&self, name: &str) -> Uuid {
        let (_, body) = self.request(Method::GET, "/compounds", None, None).await;
        body.as_array()
            .unwrap()
            .iter()
            .find(|c| c["name"] == name)
            .and_then(|c| c["id"].as_str())
            .unwrap()
            .parse()
            .unwrap()
    }
}

pub fn fields(body: &Value) -> Vec<String> {
    body["details"]
        .as_array()
        .map(|details| details.iter().filter_map(|d| d["field"].as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}
