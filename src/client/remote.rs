use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    error::ErrorBody,
    models::{
        AuthResponse, Compound, Cycle, Injection, LikeState, LoginRequest, NewCycle,
        NewInjection, NewPost, NewSideEffect, Page, Post, SideEffect, User,
    },
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// How a call to the remote store failed. Only `Transient` failures are
/// worth retrying; everything else is an answer from the server.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    #[error("remote store unreachable: {0}")]
    Transient(String),

    #[error("{error} ({status}): {message}")]
    Rejected { status: u16, error: String, message: String },

    #[error("unreadable response: {0}")]
    Decode(String),
}

impl RemoteError {
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Transient(_))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// The calls the mobile client makes against the remote store.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn posts(&self) -> RemoteResult<Vec<Post>>;
    async fn create_post(&self, draft: &NewPost) -> RemoteResult<Post>;
    async fn delete_post(&self, id: Uuid) -> RemoteResult<()>;
    async fn toggle_like(&self, id: Uuid) -> RemoteResult<LikeState>;

    async fn cycles(&self) -> RemoteResult<Vec<Cycle>>;
    async fn create_cycle(&self, draft: &NewCycle) -> RemoteResult<Cycle>;

    async fn injections(&self) -> RemoteResult<Vec<Injection>>;
    async fn create_injection(&self, draft: &NewInjection) -> RemoteResult<Injection>;

    async fn side_effects(&self) -> RemoteResult<Vec<SideEffect>>;
    async fn create_side_effect(&self, draft: &NewSideEffect) -> RemoteResult<SideEffect>;

    async fn compounds(&self) -> RemoteResult<Vec<Compound>>;
}

/// `RemoteApi` over the JSON HTTP surface, authenticated with a bearer token.
#[derive(Clone)]
pub struct HttpRemote {
    http: Client,
    base_url: String,
    token: String,
}

impl HttpRemote {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// Logs in and returns a client bound to the issued token, plus the
    /// account it belongs to.
    pub async fn login(base_url: &str, email: &str, password: &str) -> RemoteResult<(Self, User)> {
        let mut remote = Self::new(base_url, "").map_err(transport)?;
        let body = LoginRequest { email: email.to_string(), password: password.to_string() };
        let auth: AuthResponse = remote.send(remote.http.post(remote.url("/auth/login")).json(&body)).await?;
        remote.token = auth.token;
        Ok((remote, auth.user))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> RemoteResult<T> {
        let request = if self.token.is_empty() { request } else { request.bearer_auth(&self.token) };
        let response = request.send().await.map_err(transport)?;
        read(response).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> RemoteResult<T> {
        self.send(self.http.get(self.url(path))).await
    }

    async fn post<T: DeserializeOwned, B: serde::Serialize + Sync>(&self, path: &str, body: &B) -> RemoteResult<T> {
        self.send(self.http.post(self.url(path)).json(body)).await
    }
}

fn transport(e: reqwest::Error) -> RemoteError {
    if e.is_builder() {
        RemoteError::Rejected { status: 0, error: "Invalid request".into(), message: e.to_string() }
    } else {
        RemoteError::Transient(e.to_string())
    }
}

async fn read<T: DeserializeOwned>(response: Response) -> RemoteResult<T> {
    let status = response.status();
    if status.is_server_error() {
        return Err(RemoteError::Transient(format!("server answered {status}")));
    }

    if !status.is_success() {
        let fallback = status.canonical_reason().unwrap_or("Error").to_string();
        return Err(match response.json::<ErrorBody>().await {
            Ok(body) => RemoteError::Rejected { status: status.as_u16(), error: body.error, message: body.message },
            Err(_) => RemoteError::Rejected { status: status.as_u16(), error: fallback, message: String::new() },
        });
    }

    response.json::<T>().await.map_err(|e| RemoteError::Decode(e.to_string()))
}

#[async_trait]
impl RemoteApi for HttpRemote {
    async fn posts(&self) -> RemoteResult<Vec<Post>> {
        let page: Page<Post> = self.get("/posts?limit=100").await?;
        Ok(page.items)
    }

    async fn create_post(&self, draft: &NewPost) -> RemoteResult<Post> {
        self.post("/posts", draft).await
    }

    async fn delete_post(&self, id: Uuid) -> RemoteResult<()> {
        let _: Value = self.send(self.http.delete(self.url(&format!("/posts/{id}")))).await?;
        Ok(())
    }

    async fn toggle_like(&self, id: Uuid) -> RemoteResult<LikeState> {
        self.send(self.http.post(self.url(&format!("/posts/{id}/like")))).await
    }

    async fn cycles(&self) -> RemoteResult<Vec<Cycle>> {
        self.get("/cycles").await
    }

    async fn create_cycle(&self, draft: &NewCycle) -> RemoteResult<Cycle> {
        self.post("/cycles", draft).await
    }

    async fn injections(&self) -> RemoteResult<Vec<Injection>> {
        self.get("/injections").await
    }

    async fn create_injection(&self, draft: &NewInjection) -> RemoteResult<Injection> {
        self.post("/injections", draft).await
    }

    async fn side_effects(&self) -> RemoteResult<Vec<SideEffect>> {
        self.get("/side-effects").await
    }

    async fn create_side_effect(&self, draft: &NewSideEffect) -> RemoteResult<SideEffect> {
        self.post("/side-effects", draft).await
    }

    async fn compounds(&self) -> RemoteResult<Vec<Compound>> {
        self.get("/compounds").await
    }
}
