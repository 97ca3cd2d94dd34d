// src/handlers/auth.rs

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use sqlx::SqlitePool;

use crate::{
    config::Config,
    error::AppError,
    models::{
        session::Session,
        user::{Authenticatable, LoginRequest, NewUser, RegisterRequest, User},
    },
    utils::{
        hash::{hash_password, verify_dummy_password},
        session::{clear_session_cookie, session_cookie, sign_session_token, token_from_headers, verify_session_token},
    },
    validation::Violation,
};

const INVALID_CREDENTIALS: &str = "Invalid email or password.";

/// Describes the registration form.
pub async fn register_form() -> impl IntoResponse {
    Json(json!({
        "fields": ["first_name", "last_name", "email", "phone", "password", "confirm_password"],
    }))
}

/// Registers a new user.
///
/// Every broken rule is reported at once as a 422. The account is active
/// immediately and the password is stored as an Argon2 hash.
pub async fn register(
    State(pool): State<SqlitePool>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let payload = payload.normalized();

    let mut errors = payload.clean();

    let email = payload.email.as_deref().unwrap_or_default();
    let phone = payload.phone.as_deref().unwrap_or_default();

    // Store lookups only for values that are otherwise well-formed.
    if !errors.has_field("email") && User::email_taken(&pool, email).await? {
        errors.add("email", Violation::DuplicateEmail);
    }
    if !errors.has_field("phone") && User::phone_taken(&pool, phone).await? {
        errors.add("phone", Violation::DuplicatePhone);
    }
    errors.into_result()?;

    let hashed_password = hash_password(payload.password.as_deref().unwrap_or_default())?;

    let user = User::create(
        &pool,
        NewUser {
            email,
            first_name: payload.first_name.as_deref().unwrap_or_default(),
            last_name: payload.last_name.as_deref().unwrap_or_default(),
            phone,
            password_hash: &hashed_password,
            is_staff: false,
        },
    )
    .await?;

    tracing::info!(user_id = user.id, "Registered new user");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Registration successful! You can now log in.",
            "user": user,
        })),
    ))
}

/// Describes the login form.
pub async fn login_form() -> impl IntoResponse {
    Json(json!({ "fields": ["email", "password"] }))
}

/// Authenticates a user and opens a session.
///
/// Unknown email, wrong password and inactive account all yield the same
/// 401 after one Argon2 verification, so neither the response nor its timing
/// reveals which accounts exist. Expired sessions are purged on the way.
pub async fn login(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    payload.clean().into_result()?;

    let email = payload.email.as_deref().unwrap_or_default().trim();
    let password = payload.password.as_deref().unwrap_or_default();

    let authenticated = match User::find_by_email(&pool, email).await? {
        Some(user) => user.can_authenticate(password)?.then_some(user),
        None => {
            verify_dummy_password(password);
            None
        }
    };
    let Some(user) = authenticated else {
        tracing::info!("Rejected login attempt");
        return Err(AppError::AuthError(INVALID_CREDENTIALS.to_string()));
    };

    let purged = Session::purge_expired(&pool, Utc::now()).await?;
    if purged > 0 {
        tracing::debug!(purged, "Purged expired sessions");
    }

    let session = Session::create(&pool, user.id, config.session_ttl_seconds).await?;
    let token = sign_session_token(&session, &config.session_secret)?;
    User::touch_last_login(&pool, user.id).await?;

    tracing::info!(user_id = user.id, session_id = %session.id, "User logged in");

    Ok((
        [(header::SET_COOKIE, session_cookie(&token, &config))],
        Json(json!({
            "message": format!("Welcome back {}!", user.first_name),
            "token": token,
            "type": "Bearer",
            "expires_at": session.expires_at,
        })),
    ))
}

/// Ends the current session, if any.
///
/// Always succeeds, so calling it twice or without a session is harmless.
pub async fn logout(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    if let Some(claims) = token_from_headers(&headers)
        .and_then(|token| verify_session_token(&token, &config.session_secret).ok())
    {
        if Session::delete(&pool, &claims.sid).await? {
            tracing::info!(session_id = %claims.sid, "User logged out");
        }
    }

    Ok((
        [(header::SET_COOKIE, clear_session_cookie(&config))],
        Json(json!({ "message": "You have been logged out." })),
    ))
}
