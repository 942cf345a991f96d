//! Bearer tokens, password hashing and the one-shot tokens mailed for email
//! verification and password resets.

use std::sync::Arc;

use anyhow::anyhow;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use rand::{distributions::Alphanumeric, Rng, RngCore};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{error::AppError, models::User, AppState};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Access token is required")]
    MissingToken,

    #[error("The provided token is invalid")]
    InvalidToken,

    #[error("Your session has expired. Please log in again.")]
    TokenExpired,

    #[error("Email or password is incorrect")]
    InvalidCredentials,

    #[error("Your account has been disabled")]
    AccountDisabled,
}

impl AuthError {
    pub fn title(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "Missing token",
            AuthError::InvalidToken => "Invalid token",
            AuthError::TokenExpired => "Token expired",
            AuthError::InvalidCredentials => "Invalid credentials",
            AuthError::AccountDisabled => "Account disabled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct TokenKeys {
    inner: Arc<KeysInner>,
}

struct KeysInner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenKeys {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            inner: Arc::new(KeysInner {
                encoding: EncodingKey::from_secret(secret),
                decoding: DecodingKey::from_secret(secret),
                ttl,
            }),
        }
    }

    pub fn issue(&self, user: &User) -> anyhow::Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            iat: now.timestamp(),
            exp: (now + self.inner.ttl).timestamp(),
        };
        Ok(encode(&Header::default(), &claims, &self.inner.encoding)?)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.inner.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })
    }
}

/// Argon2id with configurable cost. Hashing runs on the blocking pool.
#[derive(Clone)]
pub struct Passwords {
    params: Params,
    decoy: Arc<str>,
}

impl Passwords {
    pub fn new(memory_kib: u32, iterations: u32) -> anyhow::Result<Self> {
        let params = Params::new(memory_kib, iterations, 1, None)
            .map_err(|e| anyhow!("invalid argon2 parameters: {e}"))?;
        let decoy = hash_with(&params, opaque_token().as_bytes())?;
        Ok(Self { params, decoy: decoy.into() })
    }

    pub async fn hash(&self, password: String) -> anyhow::Result<String> {
        let params = self.params.clone();
        tokio::task::spawn_blocking(move || hash_with(&params, password.as_bytes())).await?
    }

    /// A hash of a random secret at the configured cost. Checking a login
    /// for an unknown email against it costs as much as a real check.
    pub fn decoy_hash(&self) -> String {
        self.decoy.to_string()
    }

    pub async fn verify(&self, password: String, hash: String) -> anyhow::Result<bool> {
        tokio::task::spawn_blocking(move || {
            let parsed = PasswordHash::new(&hash).map_err(|e| anyhow!("stored hash is unreadable: {e}"))?;
            Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
        })
        .await?
    }
}

fn hash_with(params: &Params, password: &[u8]) -> anyhow::Result<String> {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    let salt = SaltString::encode_b64(&salt).map_err(|e| anyhow!("salt encoding failed: {e}"))?;
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params.clone())
        .hash_password(password, &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow!("password hashing failed: {e}"))
}

/// 64 alphanumeric characters, used for verification and reset links.
pub fn opaque_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

/// The caller, as named by a valid bearer token whose account still
/// exists and is active.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let claims = state.tokens.verify(token)?;
        match state.store.find_user(claims.sub).await? {
            Some(user) if user.is_active => Ok(AuthUser { id: user.id }),
            Some(_) => Err(AuthError::AccountDisabled.into()),
            None => Err(AuthError::InvalidToken.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{UserSettings, VerificationStatus};

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "a@b.com".into(),
            username: "abc".into(),
            full_name: None,
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
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn issued_tokens_verify() {
        let keys = TokenKeys::new(b"secret", Duration::hours(1));
        let user = user();
        let token = keys.issue(&user).unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, "a@b.com");
    }

    #[test]
    fn expired_and_foreign_tokens_are_rejected() {
        let expired = TokenKeys::new(b"secret", Duration::hours(-2));
        let token = expired.issue(&user()).unwrap();
        assert_eq!(expired.verify(&token).unwrap_err(), AuthError::TokenExpired);

        let other = TokenKeys::new(b"another", Duration::hours(1));
        let token = other.issue(&user()).unwrap();
        let keys = TokenKeys::new(b"secret", Duration::hours(1));
        assert_eq!(keys.verify(&token).unwrap_err(), AuthError::InvalidToken);
        assert_eq!(keys.verify("garbage").unwrap_err(), AuthError::InvalidToken);
    }

    #[tokio::test]
    async fn password_round_trip() {
        let passwords = Passwords::new(1024, 1).unwrap();
        let hash = passwords.hash("longenough1".into()).await.unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(passwords.verify("longenough1".into(), hash.clone()).await.unwrap());
        assert!(!passwords.verify("wrong-password".into(), hash).await.unwrap());
    }

    #[tokio::test]
    async fn decoy_hash_costs_the_same_and_matches_nothing() {
        let passwords = Passwords::new(1024, 1).unwrap();
        let decoy = passwords.decoy_hash();
        assert!(decoy.starts_with("$argon2id$v=19$m=1024,t=1,p=1$"));
        assert!(!passwords.verify("".into(), decoy.clone()).await.unwrap());
        assert!(!passwords.verify("longenough1".into(), decoy.clone()).await.unwrap());
        assert_eq!(passwords.clone().decoy_hash(), decoy);
    }

    #[test]
    fn opaque_tokens_are_unique() {
        let a = opaque_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, opaque_token());
    }
}
