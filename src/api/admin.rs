//! Admin API endpoints

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use super::{ApiState, auth::require_api_key};
use crate::catalog::CatalogCounts;
use crate::db::{ConversationEntry, EscalationItem, EscalationStatus, Profile};
use crate::sweeper::CleanupReport;
use crate::Error;

/// Default page size for escalation listings
const DEFAULT_ESCALATION_LIMIT: usize = 50;

// --- Request/Response types ---

#[derive(Debug, Deserialize)]
pub struct EscalationQuery {
    /// `open` or `resolved`; all when absent
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub goal: Option<String>,
}

#[derive(Serialize)]
pub struct ConversationResponse {
    pub user_id: String,
    pub entries: Vec<ConversationEntry>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(code: &str, message: &str) -> Json<ErrorResponse> {
    Json(ErrorResponse {
        error: ErrorDetail {
            code: code.to_string(),
            message: message.to_string(),
        },
    })
}

fn internal(e: &Error) -> ApiError {
    tracing::error!(error = %e, "admin request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, error_response("internal_error", &e.to_string()))
}

// --- Handlers ---

/// Run a retention sweep now
async fn run_cleanup(State(state): State<Arc<ApiState>>) -> Result<Json<CleanupReport>, ApiError> {
    let report = state.sweeper.cleanup_now().map_err(|e| internal(&e))?;
    Ok(Json(report))
}

/// List escalations, newest first
async fn list_escalations(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<EscalationQuery>,
) -> Result<Json<Vec<EscalationItem>>, ApiError> {
    let status = match query.status.as_deref() {
        None => None,
        Some(s) => Some(EscalationStatus::from_str_value(s).ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                error_response("invalid_status", "status must be 'open' or 'resolved'"),
            )
        })?),
    };

    let items = state
        .escalations
        .list(status, query.limit.unwrap_or(DEFAULT_ESCALATION_LIMIT))
        .map_err(|e| internal(&e))?;
    Ok(Json(items))
}

/// Mark an escalation resolved
async fn resolve_escalation(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    match state.escalations.resolve(&id, state.clock.now_ms()) {
        Ok(()) => {
            tracing::info!(escalation_id = %id, "escalation resolved");
            Ok(StatusCode::NO_CONTENT)
        }
        Err(Error::NotFound(_)) => Err((
            StatusCode::NOT_FOUND,
            error_response("not_found", "Escalation not found"),
        )),
        Err(e) => Err(internal(&e)),
    }
}

/// Get a profile
async fn get_profile(
    State(state): State<Arc<ApiState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Profile>, ApiError> {
    let profile = state
        .profiles
        .get(&user_id)
        .map_err(|e| internal(&e))?
        .ok_or_else(|| (StatusCode::NOT_FOUND, error_response("not_found", "Profile not found")))?;
    Ok(Json(profile))
}

/// Create or replace a profile
async fn put_profile(
    State(state): State<Arc<ApiState>>,
    Path(user_id): Path<String>,
    Json(req): Json<ProfileRequest>,
) -> Result<Json<Profile>, ApiError> {
    let profile = Profile {
        user_id,
        display_name: req.display_name,
        language: req.language,
        interests: req.interests,
        location: req.location,
        goal: req.goal,
        updated_at_ms: state.clock.now_ms(),
    };
    state.profiles.upsert(&profile).map_err(|e| internal(&e))?;
    tracing::info!(user_id = %profile.user_id, "profile updated");
    Ok(Json(profile))
}

/// Unexpired conversation log for a user
async fn get_conversation(
    State(state): State<Arc<ApiState>>,
    Path(user_id): Path<String>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let entries = state
        .conversations
        .history(&user_id, state.clock.now_ms())
        .map_err(|e| internal(&e))?;
    Ok(Json(ConversationResponse { user_id, entries }))
}

/// Re-read the catalog CSV files
async fn reload_catalog(State(state): State<Arc<ApiState>>) -> Result<Json<CatalogCounts>, ApiError> {
    match state.catalog.reload() {
        Ok(counts) => Ok(Json(counts)),
        Err(e @ Error::Catalog(_)) => {
            tracing::warn!(error = %e, "catalog reload rejected");
            Err((StatusCode::UNPROCESSABLE_ENTITY, error_response("invalid_catalog", &e.to_string())))
        }
        Err(e) => Err(internal(&e)),
    }
}

/// Build admin router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/cleanup", post(run_cleanup))
        .route("/escalations", get(list_escalations))
        .route("/escalations/{id}/resolve", post(resolve_escalation))
        .route("/profiles/{user_id}", get(get_profile).put(put_profile))
        .route("/conversations/{user_id}", get(get_conversation))
        .route("/catalog/reload", post(reload_catalog))
        .layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .with_state(state)
}
