use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use publabels_core::{Address, ChangeId, Entry, EntryState};

use super::auth::{caller_from_headers, check_auth};
use super::error::{map_registry_error, AppError};
use super::limits::{effective_max_page_size, resolve_page, validate_batch_size, PageQuery};
use super::SharedState;

// ==============================================================================
// DTOs
// ==============================================================================

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct SetLabelsRequest {
    identifiers: Vec<Address>,
    labels: Vec<String>,
}

#[derive(Serialize)]
pub(super) struct SetLabelsResponse {
    /// Number of pairs published directly (admin callers).
    published: usize,
    /// Change ids assigned to pairs awaiting review (contributor callers).
    change_ids: Vec<ChangeId>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct LookupEntriesRequest {
    identifiers: Vec<Address>,
}

#[derive(Serialize)]
pub(super) struct LookupEntriesResponse {
    entries: Vec<Entry>,
}

#[derive(Serialize)]
pub(super) struct EntryRow {
    identifier: Address,
    label: String,
    state: EntryState,
    submitter: Address,
}

#[derive(Serialize)]
pub(super) struct EntriesPage {
    total: usize,
    entries: Vec<EntryRow>,
}

// ==============================================================================
// Handlers
// ==============================================================================

pub(super) async fn set_labels(
    State(state): State<SharedState>,
    headers: HeaderMap,
    req: Result<Json<SetLabelsRequest>, JsonRejection>,
) -> Result<Json<SetLabelsResponse>, AppError> {
    check_auth(&state.api_token, &headers)?;
    let caller = caller_from_headers(&headers)?;
    let Json(req) = req.map_err(|e| AppError::BadRequest(e.to_string()))?;

    let mut registry = state.registry.write().await;
    let change_ids = registry
        .set_labels(&caller, &req.identifiers, &req.labels)
        .map_err(map_registry_error)?;

    Ok(Json(SetLabelsResponse {
        published: req.identifiers.len() - change_ids.len(),
        change_ids,
    }))
}

pub(super) async fn list_entries(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> Result<Json<EntriesPage>, AppError> {
    check_auth(&state.api_token, &headers)?;
    let (start, limit) = resolve_page(&query, state.max_page_size)?;

    let registry = state.registry.read().await;
    let entries = registry
        .all_entries(start, limit)
        .into_iter()
        .map(|(identifier, entry)| EntryRow {
            identifier,
            label: entry.label,
            state: entry.state,
            submitter: entry.submitter,
        })
        .collect();

    Ok(Json(EntriesPage {
        total: registry.entry_count(),
        entries,
    }))
}

pub(super) async fn lookup_entries(
    State(state): State<SharedState>,
    headers: HeaderMap,
    req: Result<Json<LookupEntriesRequest>, JsonRejection>,
) -> Result<Json<LookupEntriesResponse>, AppError> {
    check_auth(&state.api_token, &headers)?;
    let Json(req) = req.map_err(|e| AppError::BadRequest(e.to_string()))?;
    if !req.identifiers.is_empty() {
        validate_batch_size(
            "identifiers",
            req.identifiers.len(),
            effective_max_page_size(state.max_page_size),
        )?;
    }

    let registry = state.registry.read().await;
    Ok(Json(LookupEntriesResponse {
        entries: registry.get_entries(&req.identifiers),
    }))
}
