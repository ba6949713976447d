use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use publabels_core::events::EventRecord;

use super::auth::check_auth;
use super::error::AppError;
use super::limits::{resolve_page, PageQuery};
use super::SharedState;

// ==============================================================================
// DTOs
// ==============================================================================

#[derive(Deserialize)]
pub(super) struct EventsQuery {
    since: Option<u64>,
    limit: Option<usize>,
}

#[derive(Serialize)]
pub(super) struct EventsResponse {
    /// Sequence to pass as `since` to continue after this page.
    next: u64,
    total: usize,
    records: Vec<EventRecord>,
}

// ==============================================================================
// Handler
// ==============================================================================

pub(super) async fn get_events(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<EventsQuery>,
) -> Result<Json<EventsResponse>, AppError> {
    check_auth(&state.api_token, &headers)?;
    let since = query.since.unwrap_or(0);
    let (_, limit) = resolve_page(&PageQuery::limit_only(query.limit), state.max_page_size)?;

    let registry = state.registry.read().await;
    let records = registry.events(since, limit).to_vec();
    let next = records
        .last()
        .map(|record| record.sequence + 1)
        .unwrap_or(since);

    Ok(Json(EventsResponse {
        next,
        total: registry.event_count(),
        records,
    }))
}
