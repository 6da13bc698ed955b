//! services/api/src/web/middleware.rs
//!
//! Authentication middleware and cookie-session helpers.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

use crate::web::state::AppState;

/// Extracts the session token from a request's `Cookie` header, if present.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<&str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    cookie_header.split(';').find_map(|c| {
        let c = c.trim();
        c.strip_prefix("session=")
    })
}

/// Resolves the request's session cookie to an account id, if a valid,
/// unexpired session exists. Used by routes that work anonymously but
/// persist extra data for logged-in users.
pub async fn session_account(state: &AppState, headers: &HeaderMap) -> Option<i64> {
    let session_id = session_id_from_headers(headers)?;
    match state.db.validate_auth_session(session_id).await {
        Ok(account_id) => Some(account_id),
        Err(e) => {
            debug!(error = %e, "session cookie did not resolve to an account");
            None
        }
    }
}

/// Middleware that validates the auth session cookie and extracts the
/// account id.
///
/// If valid, inserts the account id into request extensions for handlers to
/// use. If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let account_id = session_account(&state, req.headers())
        .await
        .ok_or(StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(account_id);
    Ok(next.run(req).await)
}
