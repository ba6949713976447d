use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::error::AppError;
use super::SharedState;

// ==============================================================================
// Hard Ceilings for Paginated Queries
// ==============================================================================
//
// These caps protect server resources regardless of CLI configuration.

pub(crate) const HARD_MAX_PAGE_SIZE: usize = 5_000;
pub(crate) const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Deserialize)]
pub(super) struct PageQuery {
    start: Option<usize>,
    limit: Option<usize>,
}

impl PageQuery {
    pub(super) fn limit_only(limit: Option<usize>) -> Self {
        Self { start: None, limit }
    }
}

#[derive(Serialize)]
pub(super) struct LimitsResponse {
    hard_max_page_size: usize,
    configured_max_page_size: usize,
    effective_max_page_size: usize,
    default_page_size: usize,
}

pub(super) async fn get_limits(State(state): State<SharedState>) -> Json<LimitsResponse> {
    Json(LimitsResponse {
        hard_max_page_size: HARD_MAX_PAGE_SIZE,
        configured_max_page_size: state.max_page_size,
        effective_max_page_size: effective_max_page_size(state.max_page_size),
        default_page_size: default_page_size(state.max_page_size),
    })
}

pub(super) fn effective_max_page_size(configured: usize) -> usize {
    configured.clamp(1, HARD_MAX_PAGE_SIZE)
}

fn default_page_size(configured: usize) -> usize {
    DEFAULT_PAGE_SIZE.min(effective_max_page_size(configured))
}

/// Resolve `(start, limit)` for a paginated read, applying the default
/// page size and rejecting limits outside `1..=max`.
pub(super) fn resolve_page(
    query: &PageQuery,
    configured: usize,
) -> Result<(usize, usize), AppError> {
    let max = effective_max_page_size(configured);
    let limit = query.limit.unwrap_or_else(|| default_page_size(configured));
    validate_batch_size("limit", limit, max)?;
    Ok((query.start.unwrap_or(0), limit))
}

pub(super) fn validate_batch_size(field: &str, value: usize, max: usize) -> Result<(), AppError> {
    if value == 0 {
        return Err(AppError::BadRequest(format!("{field} must be at least 1")));
    }
    if value > max {
        return Err(AppError::BadRequest(format!("{field} must be at most {max}")));
    }
    Ok(())
}
