use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::info;

use crate::api::{self, QueryParams, bad_request, success};
use crate::auth::{CurrentUser, require_admin};
use crate::config;
use crate::db::Database;
use crate::model::{CreateBook, UpdateBook};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub auth: Arc<config::Auth>,
}

const DEFAULT_PAGE: u32 = 1;
const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 100;
const AUTOCOMPLETE_LIMIT: i32 = 10;

#[derive(Debug)]
pub struct HandlerParams {
    pub q: Option<String>,
    pub page: u32,
    pub limit: u32,
    pub offset: u32,
}

impl QueryParams {
    pub fn into_handler_params(self) -> HandlerParams {
        let page = self.page.unwrap_or(DEFAULT_PAGE).max(1);
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

        HandlerParams {
            q: self.q.filter(|q| !q.trim().is_empty()),
            page,
            limit,
            offset: (page - 1) * limit,
        }
    }
}

pub async fn healthcheck() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn get_books(State(state): State<AppState>, Query(qp): Query<QueryParams>) -> Response {
    let hp = qp.into_handler_params();
    match state.db.get_books(hp).await {
        Ok(books) => success(books),
        Err(e) => e.into_response(),
    }
}

pub async fn get_book(State(state): State<AppState>, Path(id): Path<i32>) -> Response {
    match state.db.get_book_by_id(id).await {
        Ok(Some(book)) => success(book),
        Ok(None) => api::not_found("book not found"),
        Err(e) => e.into_response(),
    }
}

pub async fn create_book(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<CreateBook>,
) -> Response {
    if let Err(resp) = require_admin(&user) {
        return resp;
    }

    match state.db.create_book(payload).await {
        Ok(book) => {
            info!(book_id = book.id, "book created");
            api::created(book)
        }
        Err(e) => e.into_response(),
    }
}

pub async fn update_book(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateBook>,
) -> Response {
    if let Err(resp) = require_admin(&user) {
        return resp;
    }

    match state.db.update_book(id, payload).await {
        Ok(book) => success(book),
        Err(e) => e.into_response(),
    }
}

pub async fn delete_book(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Response {
    if let Err(resp) = require_admin(&user) {
        return resp;
    }

    match state.db.soft_delete_book(id).await {
        Ok(()) => {
            info!(book_id = id, "book soft-deleted");
            (axum::http::StatusCode::NO_CONTENT, ()).into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn get_metadata(State(state): State<AppState>) -> Response {
    match state.db.get_metadata_aggregates().await {
        Ok(metadata) => success(metadata),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateNamed {
    pub name: String,
}

pub async fn create_author(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<CreateNamed>,
) -> Response {
    if let Err(resp) = require_admin(&user) {
        return resp;
    }
    if payload.name.trim().is_empty() {
        return bad_request("name is required");
    }

    match state.db.create_author(payload.name.trim()).await {
        Ok(author) => api::created(author),
        Err(e) => e.into_response(),
    }
}

pub async fn create_category(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<CreateNamed>,
) -> Response {
    if let Err(resp) = require_admin(&user) {
        return resp;
    }
    if payload.name.trim().is_empty() {
        return bad_request("name is required");
    }

    match state.db.create_category(payload.name.trim()).await {
        Ok(category) => api::created(category),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

/// Autocomplete endpoint backing the books search widget.
pub async fn search_books(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Response {
    let q = match params.q {
        Some(q) if !q.trim().is_empty() => q,
        _ => return bad_request("query parameter 'q' is required"),
    };

    match state.db.search_books(q.trim(), AUTOCOMPLETE_LIMIT).await {
        Ok(hits) => success(hits),
        Err(e) => e.into_response(),
    }
}
