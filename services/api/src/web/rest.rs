//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the JSON API endpoints and the master
//! definition for the OpenAPI specification.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};

use crate::error::{error_response, ErrorBody};
use crate::web::middleware::session_account;
use crate::web::state::AppState;
use learnsphere_core::domain::SkillLevel;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::register_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
        generate_handler,
        run_handler,
        onboard_handler,
        history_handler,
    ),
    components(schemas(
        crate::web::auth::RegisterRequest,
        crate::web::auth::LoginRequest,
        crate::web::auth::MessageResponse,
        GenerateRequest,
        RunRequest,
        OnboardRequest,
        OnboardResponse,
        HistoryEntry,
        ErrorBody,
    )),
    tags(
        (name = "LearnSphere API", description = "API endpoints for AI-assisted ML learning.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Request and Response Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct GenerateRequest {
    pub topic: Option<String>,
    pub level: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct RunRequest {
    #[serde(default)]
    pub code: String,
}

#[derive(Deserialize, ToSchema)]
pub struct OnboardRequest {
    pub level: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct OnboardResponse {
    pub status: String,
    pub level: Option<String>,
}

/// One past generation, as returned by `/api/history`.
#[derive(Serialize, ToSchema)]
pub struct HistoryEntry {
    pub id: i64,
    pub topic: String,
    /// The stored `GenerationResult`, still serialized as JSON text.
    pub content: String,
    pub created_at: DateTime<Utc>,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Generate a structured explanation of an ML topic.
///
/// Returns 400 only for a missing/empty topic. Upstream failures never
/// surface as 5xx: the pipeline degrades to its fixed mock payload, and the
/// caller cannot tell the two apart. When the request carries a valid
/// session cookie the result is also persisted to that account's history.
#[utoipa::path(
    post,
    path = "/api/generate",
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "A GenerationResult with exactly the keys explanation, code, xray, diagram"),
        (status = 400, description = "Topic missing or empty", body = ErrorBody)
    )
)]
pub async fn generate_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<GenerateRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let topic = req.topic.as_deref().map(str::trim).unwrap_or("");
    if topic.is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "Topic is required"));
    }

    let level = req
        .level
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or(SkillLevel::Beginner.as_str());

    let result = state.pipeline.generate(topic, level).await;

    if let Some(account_id) = session_account(&state, &headers).await {
        // History persistence is best-effort: a storage failure degrades
        // to an unsaved result, never to a failed response.
        match serde_json::to_string(&result) {
            Ok(content) => {
                if let Err(e) = state
                    .db
                    .save_history_record(account_id, topic, &content)
                    .await
                {
                    error!(error = %e, account_id, "failed to persist history record");
                }
            }
            Err(e) => error!(error = %e, "failed to serialize generation result"),
        }
    }

    Ok(Json(result))
}

/// Execute submitted code and capture its output.
///
/// Always 200 for a well-formed body; execution failures are reported in
/// the `error` field with partial `output` preserved.
#[utoipa::path(
    post,
    path = "/api/run",
    request_body = RunRequest,
    responses(
        (status = 200, description = "Captured {output, error} of the execution")
    )
)]
pub async fn run_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RunRequest>,
) -> impl IntoResponse {
    let outcome = state.executor.run(&req.code).await;
    Json(outcome)
}

/// Record the user's self-assessed skill level.
///
/// Echoes the submitted level; when a valid session exists and the label is
/// one of the known levels, it is also persisted to the account.
#[utoipa::path(
    post,
    path = "/api/onboard",
    request_body = OnboardRequest,
    responses(
        (status = 200, description = "Level acknowledged", body = OnboardResponse)
    )
)]
pub async fn onboard_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<OnboardRequest>,
) -> impl IntoResponse {
    let parsed = req.level.as_deref().and_then(SkillLevel::parse);
    if let Some(level) = parsed {
        if let Some(account_id) = session_account(&state, &headers).await {
            if let Err(e) = state.db.set_account_level(account_id, level).await {
                error!(error = %e, account_id, "failed to persist skill level");
            }
        }
    }

    Json(OnboardResponse {
        status: "success".to_string(),
        level: req.level,
    })
}

/// List the authenticated account's past generations, newest first.
#[utoipa::path(
    get,
    path = "/api/history",
    responses(
        (status = 200, description = "The account's history records", body = [HistoryEntry]),
        (status = 401, description = "No active session"),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn history_handler(
    State(state): State<Arc<AppState>>,
    Extension(account_id): Extension<i64>,
) -> Result<Json<Vec<HistoryEntry>>, (StatusCode, Json<ErrorBody>)> {
    let records = state
        .db
        .history_for_account(account_id)
        .await
        .map_err(|e| {
            error!(error = %e, account_id, "failed to load history");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load history")
        })?;

    let entries = records
        .into_iter()
        .map(|r| HistoryEntry {
            id: r.id,
            topic: r.topic,
            content: r.content,
            created_at: r.created_at,
        })
        .collect();

    Ok(Json(entries))
}
