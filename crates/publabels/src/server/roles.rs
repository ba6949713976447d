use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use publabels_core::{Address, Role};

use super::auth::{caller_from_headers, check_auth};
use super::error::{map_registry_error, AppError};
use super::SharedState;

// ==============================================================================
// DTOs
// ==============================================================================

#[derive(Serialize)]
pub(super) struct RoleMembersResponse {
    role: Role,
    members: Vec<Address>,
}

#[derive(Serialize)]
pub(super) struct HasRoleResponse {
    role: Role,
    account: Address,
    has_role: bool,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct GrantRoleRequest {
    account: Address,
}

#[derive(Serialize)]
pub(super) struct RoleChangeResponse {
    role: Role,
    account: Address,
    /// `false` when the request was a no-op (already granted / not held).
    changed: bool,
}

// ==============================================================================
// Handlers
// ==============================================================================

pub(super) async fn list_role_members(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(role): Path<String>,
) -> Result<Json<RoleMembersResponse>, AppError> {
    check_auth(&state.api_token, &headers)?;
    let role = parse_role(&role)?;

    let registry = state.registry.read().await;
    Ok(Json(RoleMembersResponse {
        role,
        members: registry.members(role),
    }))
}

pub(super) async fn has_role(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path((role, account)): Path<(String, String)>,
) -> Result<Json<HasRoleResponse>, AppError> {
    check_auth(&state.api_token, &headers)?;
    let role = parse_role(&role)?;
    let account = parse_address(&account)?;

    let registry = state.registry.read().await;
    Ok(Json(HasRoleResponse {
        role,
        account,
        has_role: registry.has_role(role, &account),
    }))
}

pub(super) async fn grant_role(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(role): Path<String>,
    req: Result<Json<GrantRoleRequest>, JsonRejection>,
) -> Result<Json<RoleChangeResponse>, AppError> {
    check_auth(&state.api_token, &headers)?;
    let caller = caller_from_headers(&headers)?;
    let role = parse_role(&role)?;
    let Json(req) = req.map_err(|e| AppError::BadRequest(e.to_string()))?;

    let mut registry = state.registry.write().await;
    let changed = registry
        .grant_role(&caller, role, req.account)
        .map_err(map_registry_error)?;

    Ok(Json(RoleChangeResponse {
        role,
        account: req.account,
        changed,
    }))
}

pub(super) async fn revoke_role(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path((role, account)): Path<(String, String)>,
) -> Result<Json<RoleChangeResponse>, AppError> {
    check_auth(&state.api_token, &headers)?;
    let caller = caller_from_headers(&headers)?;
    let role = parse_role(&role)?;
    let account = parse_address(&account)?;

    let mut registry = state.registry.write().await;
    let changed = registry
        .revoke_role(&caller, role, account)
        .map_err(map_registry_error)?;

    Ok(Json(RoleChangeResponse {
        role,
        account,
        changed,
    }))
}

// ==============================================================================
// Helpers
// ==============================================================================

fn parse_role(raw: &str) -> Result<Role, AppError> {
    raw.parse::<Role>()
        .map_err(|e| AppError::NotFound(e.to_string()))
}

fn parse_address(raw: &str) -> Result<Address, AppError> {
    raw.parse::<Address>()
        .map_err(|e| AppError::BadRequest(format!("invalid address `{raw}`: {e}")))
}
