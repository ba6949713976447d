use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use publabels_core::{Address, ChangeId, Entry, EntryState};

use super::auth::{caller_from_headers, check_auth};
use super::error::{map_registry_error, AppError};
use super::limits::{resolve_page, PageQuery};
use super::SharedState;

// ==============================================================================
// DTOs
// ==============================================================================

/// Page of the change log as parallel arrays: `identifiers[i]` was
/// proposed as `entries[i]` under `change_ids[i]`.
#[derive(Serialize)]
pub(super) struct ChangesPage {
    total: usize,
    change_ids: Vec<ChangeId>,
    identifiers: Vec<Address>,
    entries: Vec<Entry>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct ReviewRequest {
    change_ids: Vec<ChangeId>,
}

#[derive(Serialize)]
pub(super) struct ReviewResponse {
    state: EntryState,
    change_ids: Vec<ChangeId>,
}

// ==============================================================================
// Handlers
// ==============================================================================

pub(super) async fn list_changes(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> Result<Json<ChangesPage>, AppError> {
    check_auth(&state.api_token, &headers)?;
    let (start, limit) = resolve_page(&query, state.max_page_size)?;

    let registry = state.registry.read().await;
    let page = registry.pending_changes(start, limit);

    Ok(Json(ChangesPage {
        total: registry.change_count(),
        change_ids: page.iter().map(|c| c.change_id).collect(),
        identifiers: page.iter().map(|c| c.identifier).collect(),
        entries: page.iter().map(|c| c.entry.clone()).collect(),
    }))
}

pub(super) async fn approve_changes(
    State(state): State<SharedState>,
    headers: HeaderMap,
    req: Result<Json<ReviewRequest>, JsonRejection>,
) -> Result<Json<ReviewResponse>, AppError> {
    check_auth(&state.api_token, &headers)?;
    let caller = caller_from_headers(&headers)?;
    let Json(req) = req.map_err(|e| AppError::BadRequest(e.to_string()))?;

    let mut registry = state.registry.write().await;
    registry
        .approve_pending_changes(&caller, &req.change_ids)
        .map_err(map_registry_error)?;

    Ok(Json(ReviewResponse {
        state: EntryState::Verified,
        change_ids: req.change_ids,
    }))
}

pub(super) async fn reject_changes(
    State(state): State<SharedState>,
    headers: HeaderMap,
    req: Result<Json<ReviewRequest>, JsonRejection>,
) -> Result<Json<ReviewResponse>, AppError> {
    check_auth(&state.api_token, &headers)?;
    let caller = caller_from_headers(&headers)?;
    let Json(req) = req.map_err(|e| AppError::BadRequest(e.to_string()))?;

    let mut registry = state.registry.write().await;
    registry
        .reject_pending_changes(&caller, &req.change_ids)
        .map_err(map_registry_error)?;

    Ok(Json(ReviewResponse {
        state: EntryState::Rejected,
        change_ids: req.change_ids,
    }))
}
