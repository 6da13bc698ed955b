//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user registration, login, and logout.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect},
    Json,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{error_response, ErrorBody};
use crate::web::middleware::session_id_from_headers;
use crate::web::state::AppState;
use learnsphere_core::ports::PortError;

const SESSION_LIFETIME_DAYS: i64 = 30;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

//=========================================================================================
// Session Cookie Helpers
//=========================================================================================

fn session_cookie(session_id: &str) -> String {
    format!(
        "session={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        session_id,
        Duration::days(SESSION_LIFETIME_DAYS).num_seconds()
    )
}

fn clear_session_cookie() -> String {
    "session=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0".to_string()
}

/// Creates a fresh auth session for the account and returns the
/// `Set-Cookie` value carrying its token.
async fn start_session(
    state: &AppState,
    account_id: i64,
) -> Result<String, (StatusCode, Json<ErrorBody>)> {
    let session_id = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::days(SESSION_LIFETIME_DAYS);

    state
        .db
        .create_auth_session(&session_id, account_id, expires_at)
        .await
        .map_err(|e| {
            error!(error = %e, "failed to create auth session");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create session")
        })?;

    Ok(session_cookie(&session_id))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /register - Create a new account and start a session.
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account created, session started", body = MessageResponse),
        (status = 400, description = "Username already exists", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    if state
        .db
        .get_account_by_username(&req.username)
        .await
        .is_ok()
    {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Username already exists",
        ));
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "failed to hash password");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to hash password")
        })?
        .to_string();

    // The unique constraint is the backstop for the pre-check above racing
    // with a concurrent registration of the same username.
    let account = state
        .db
        .create_account(&req.username, &password_hash)
        .await
        .map_err(|e| match e {
            PortError::Conflict(msg) => error_response(StatusCode::BAD_REQUEST, msg),
            other => {
                error!(error = %other, "failed to create account");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create account")
            }
        })?;

    let cookie = start_session(&state, account.id).await?;

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(MessageResponse {
            message: "Registered successfully".to_string(),
        }),
    ))
}

/// POST /login - Login with an existing account.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = MessageResponse),
        (status = 401, description = "Invalid credentials", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    // A generic message for both unknown usernames and bad passwords, so no
    // account-existence detail leaks.
    let invalid =
        || error_response(StatusCode::UNAUTHORIZED, "Invalid credentials");

    let account = state
        .db
        .get_account_by_username(&req.username)
        .await
        .map_err(|_| invalid())?;

    let parsed_hash = PasswordHash::new(&account.password_hash).map_err(|e| {
        error!(error = %e, "failed to parse stored password hash");
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "Authentication error")
    })?;

    let valid = Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_ok();
    if !valid {
        return Err(invalid());
    }

    let cookie = start_session(&state, account.id).await?;

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(MessageResponse {
            message: "Logged in successfully".to_string(),
        }),
    ))
}

/// GET /logout - Invalidate the current session and redirect home.
///
/// Sits behind `require_auth`, so the cookie is known to carry a valid
/// session when the handler runs.
#[utoipa::path(
    get,
    path = "/logout",
    responses(
        (status = 303, description = "Session ended, redirected to the index page"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let session_id = session_id_from_headers(&headers).ok_or_else(|| {
        error_response(StatusCode::UNAUTHORIZED, "No session found")
    })?;

    state
        .db
        .delete_auth_session(session_id)
        .await
        .map_err(|e| {
            error!(error = %e, "failed to delete auth session");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to logout")
        })?;

    Ok((
        [(header::SET_COOKIE, clear_session_cookie())],
        Redirect::to("/"),
    ))
}
