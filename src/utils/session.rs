// src/utils/session.rs

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::{
    config::Config,
    error::AppError,
    models::{
        session::Session,
        user::{Authenticatable, User},
    },
    state::AppState,
};

pub const SESSION_COOKIE: &str = "session";

/// Session token claims.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - Stores the User ID (as string).
    pub sub: String,
    /// Server-side session id; the token is worthless once that row is gone.
    pub sid: String,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

/// The authenticated actor of a request, inserted by [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
}

impl CurrentUser {
    pub fn id(&self) -> i64 {
        self.user.id
    }
}

/// Signs a token binding `session` to its user.
pub fn sign_session_token(session: &Session, secret: &str) -> Result<String, AppError> {
    let claims = Claims {
        sub: session.user_id.to_string(),
        sid: session.id.clone(),
        exp: usize::try_from(session.expires_at.timestamp()).unwrap_or(0),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies signature and expiry of a session token.
pub fn verify_session_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;

    Ok(token_data.claims)
}

/// Finds the session token in the `session` cookie or a Bearer header.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string());

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
    })
}

/// `Set-Cookie` value carrying a freshly issued token.
pub fn session_cookie(token: &str, config: &Config) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, config.session_ttl_seconds
    );
    if config.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that makes the client drop its session cookie.
pub fn clear_session_cookie(config: &Config) -> String {
    let mut cookie = format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE);
    if config.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Resolves a token into the acting user.
///
/// `None` unless the signature verifies, the session row still exists and
/// has not expired, and its user is active. Expired rows are removed on the way.
pub async fn resolve_session(
    pool: &SqlitePool,
    config: &Config,
    token: &str,
) -> Result<Option<CurrentUser>, AppError> {
    let Ok(claims) = verify_session_token(token, &config.session_secret) else {
        return Ok(None);
    };

    let Some(session) = Session::find(pool, &claims.sid).await? else {
        return Ok(None);
    };

    if session.is_expired(Utc::now()) {
        Session::delete(pool, &session.id).await?;
        tracing::debug!(session_id = %session.id, "Dropped expired session");
        return Ok(None);
    }

    if claims.sub != session.user_id.to_string() {
        tracing::warn!(session_id = %session.id, "Session token subject does not match its session");
        return Ok(None);
    }

    let user = User::find_by_id(pool, session.user_id)
        .await?
        .filter(|user| user.is_active());

    Ok(user.map(|user| CurrentUser { user }))
}

/// Axum Middleware: Authentication.
///
/// Resolves the request's session and injects [`CurrentUser`] into the
/// request extensions for handlers to use. Otherwise returns 401.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let unauthenticated = || AppError::AuthError("Authentication required.".to_string());

    let token = token_from_headers(req.headers()).ok_or_else(unauthenticated)?;

    let current = resolve_session(&state.pool, &state.config, &token)
        .await?
        .ok_or_else(unauthenticated)?;

    req.extensions_mut().insert(current);
    Ok(next.run(req).await)
}
