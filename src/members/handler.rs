//! HTTP handlers for member management. Everything here is staff-side, so
//! every handler is admin-gated.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::info;

use super::{CreateMember, MemberStatus, Members, UpdateMember};
use crate::api::{self, QueryParams, bad_request, success};
use crate::auth::{CurrentUser, require_admin};
use crate::handler::AppState;

const AUTOCOMPLETE_LIMIT: i32 = 10;

pub async fn register_member(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<CreateMember>,
) -> Response {
    if let Err(resp) = require_admin(&user) {
        return resp;
    }

    let members = Members::new(state.db.connection());
    match members.register(payload).await {
        Ok(member) => {
            info!(member_id = member.id, "member registered");
            api::created(member)
        }
        Err(e) => e.into_response(),
    }
}

pub async fn list_members(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(qp): Query<QueryParams>,
) -> Response {
    if let Err(resp) = require_admin(&user) {
        return resp;
    }

    let members = Members::new(state.db.connection());
    match members.list(qp.into_handler_params()).await {
        Ok(list) => success(list),
        Err(e) => e.into_response(),
    }
}

pub async fn get_member(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Response {
    if let Err(resp) = require_admin(&user) {
        return resp;
    }

    let members = Members::new(state.db.connection());
    match members.get(id).await {
        Ok(Some(member)) => success(member),
        Ok(None) => api::not_found("member not found"),
        Err(e) => e.into_response(),
    }
}

pub async fn update_member(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateMember>,
) -> Response {
    if let Err(resp) = require_admin(&user) {
        return resp;
    }

    let members = Members::new(state.db.connection());
    match members.update(id, payload).await {
        Ok(Some(member)) => success(member),
        Ok(None) => api::not_found("member not found"),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct SetStatus {
    pub status: String,
}

pub async fn set_member_status(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Json(payload): Json<SetStatus>,
) -> Response {
    if let Err(resp) = require_admin(&user) {
        return resp;
    }

    let status = match MemberStatus::from_str(&payload.status) {
        Some(status) => status,
        None => return bad_request("status must be one of active, inactive, suspended"),
    };

    let members = Members::new(state.db.connection());
    match members.set_status(id, status).await {
        Ok(Some(member)) => {
            info!(member_id = id, status = status.as_str(), "member status changed");
            success(member)
        }
        Ok(None) => api::not_found("member not found"),
        Err(e) => e.into_response(),
    }
}

pub async fn delete_member(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Response {
    if let Err(resp) = require_admin(&user) {
        return resp;
    }

    let members = Members::new(state.db.connection());
    match members.soft_delete(id).await {
        Ok(()) => {
            info!(member_id = id, "member soft-deleted");
            (axum::http::StatusCode::NO_CONTENT, ()).into_response()
        }
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

/// Autocomplete endpoint backing the member picker on the issue form.
pub async fn search_members(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<SearchParams>,
) -> Response {
    if let Err(resp) = require_admin(&user) {
        return resp;
    }

    let q = match params.q {
        Some(q) if !q.trim().is_empty() => q,
        _ => return bad_request("query parameter 'q' is required"),
    };

    let members = Members::new(state.db.connection());
    match members.search(q.trim(), AUTOCOMPLETE_LIMIT).await {
        Ok(hits) => success(hits),
        Err(e) => e.into_response(),
    }
}
