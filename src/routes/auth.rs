use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use super::message;
use crate::{
    auth::{opaque_token, AuthError},
    error::AppError,
    extract::{ApiJson, ApiQuery},
    mailer::{Mail, MailKind},
    models::{AuthResponse, LoginRequest, RegisterRequest},
    store::NewUserRecord,
    validation::{Checks, Validate},
    AppState,
};

#[derive(Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Deserialize)]
pub struct TokenQuery {
    pub token: String,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/verify-email", get(verify_email))
        .route("/auth/resend-verification", post(resend_verification))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
        .with_state(state)
}

async fn send_mail(state: &AppState, mail: Mail) {
    let kind = mail.kind;
    if let Err(e) = state.mailer.send(mail).await {
        tracing::error!("❌ Failed to send {:?} mail: {:#}", kind, e);
    }
}

async fn register(
    State(state): State<AppState>,
    ApiJson(mut body): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    body.email = body.email.trim().to_lowercase();
    body.username = body.username.trim().to_lowercase();
    body.validate()?;

    if state.store.email_or_username_taken(&body.email, &body.username).await? {
        tracing::warn!("⚠️ Registration refused, {} / {} already taken", body.email, body.username);
        return Err(AppError::Conflict("User already exists".into()));
    }

    let password_hash = state.passwords.hash(body.password).await?;
    let verification_token = opaque_token();
    let user = state
        .store
        .create_user(NewUserRecord {
            email: body.email,
            username: body.username,
            password_hash,
            full_name: body.full_name.map(|name| name.trim().to_string()),
            verification_token: verification_token.clone(),
            verification_expires: Utc::now() + state.config.verification_ttl,
        })
        .await?;

    send_mail(
        &state,
        Mail {
            kind: MailKind::Verification,
            to: user.email.clone(),
            username: user.username.clone(),
            token: verification_token,
        },
    )
    .await;

    let token = state.tokens.issue(&user)?;
    tracing::info!("👤 Registered {}", user.username);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "User registered successfully".into(),
            user,
            token,
        }),
    ))
}

async fn login(
    State(state): State<AppState>,
    ApiJson(mut body): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    body.email = body.email.trim().to_lowercase();
    body.validate()?;

    let Some(credentials) = state.store.find_credentials(&body.email).await? else {
        state.passwords.verify(body.password, state.passwords.decoy_hash()).await?;
        tracing::warn!("⚠️ Login for unknown email {}", body.email);
        return Err(AuthError::InvalidCredentials.into());
    };

    if !state.passwords.verify(body.password, credentials.password_hash).await? {
        tracing::warn!("⚠️ Wrong password for {}", credentials.user.username);
        return Err(AuthError::InvalidCredentials.into());
    }

    if !credentials.user.is_active {
        return Err(AuthError::AccountDisabled.into());
    }

    let now = Utc::now();
    state.store.record_login(credentials.user.id, now).await?;
    let mut user = credentials.user;
    user.last_login_at = Some(now);

    let token = state.tokens.issue(&user)?;
    tracing::info!("🔑 {} logged in", user.username);

    Ok(Json(AuthResponse {
        message: "Login successful".into(),
        user,
        token,
    }))
}

async fn verify_email(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TokenQuery>,
) -> Result<Json<Value>, AppError> {
    let user = state
        .store
        .verify_email(&query.token, Utc::now())
        .await?
        .ok_or(AppError::InvalidToken("Verification token is invalid or has expired"))?;

    tracing::info!("✅ Email verified for {}", user.username);
    Ok(Json(json!({ "message": "Email verified successfully", "user": user })))
}

async fn resend_verification(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<EmailRequest>,
) -> Result<Json<Value>, AppError> {
    let email = body.email.trim().to_lowercase();

    if let Some(credentials) = state.store.find_credentials(&email).await? {
        let user = credentials.user;
        if !user.email_verified {
            let token = opaque_token();
            state
                .store
                .set_verification_token(user.id, &token, Utc::now() + state.config.verification_ttl)
                .await?;
            send_mail(
                &state,
                Mail { kind: MailKind::Verification, to: user.email, username: user.username, token },
            )
            .await;
        }
    }

    Ok(Json(message(
        "If the account exists and is unverified, a verification email has been sent",
    )))
}

async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<EmailRequest>,
) -> Result<Json<Value>, AppError> {
    let email = body.email.trim().to_lowercase();

    if let Some(credentials) = state.store.find_credentials(&email).await? {
        let user = credentials.user;
        let token = opaque_token();
        state
            .store
            .set_reset_token(user.id, &token, Utc::now() + state.config.reset_ttl)
            .await?;
        send_mail(
            &state,
            Mail { kind: MailKind::PasswordReset, to: user.email, username: user.username, token },
        )
        .await;
    }

    Ok(Json(message(
        "If the account exists, a password reset email has been sent",
    )))
}

async fn reset_password(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ResetPasswordRequest>,
) -> Result<Json<Value>, AppError> {
    Checks::new()
        .text("token", &body.token, 1..=255)
        .password("newPassword", &body.new_password)
        .finish()?;

    let password_hash = state.passwords.hash(body.new_password).await?;
    let user = state
        .store
        .reset_password(&body.token, &password_hash, Utc::now())
        .await?
        .ok_or(AppError::InvalidToken("Reset token is invalid or has expired"))?;

    tracing::info!("🔑 Password reset for {}", user.username);
    Ok(Json(message("Password reset successfully")))
}
