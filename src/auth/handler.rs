//! HTTP handlers for sign-in, sign-out and account management.

use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;

use super::middleware::{clear_session_cookie, session_cookie, session_token};
use super::{Accounts, CreateUser, CurrentUser, require_admin};
use crate::api;
use crate::handler::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

pub async fn login(State(state): State<AppState>, Json(payload): Json<LoginRequest>) -> Response {
    let accounts = Accounts::new(state.db.connection());

    let user = match accounts.verify_credentials(&payload.username, &payload.password).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            tracing::info!(username = %payload.username, "rejected login attempt");
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "invalid username or password" })),
            )
                .into_response();
        }
        Err(e) => return e.into_response(),
    };

    let session = match accounts
        .create_session(user.id, state.auth.session_ttl_minutes)
        .await
    {
        Ok(session) => session,
        Err(e) => return e.into_response(),
    };

    tracing::info!(username = %user.username, "user signed in");
    (
        [(
            header::SET_COOKIE,
            session_cookie(&session.token, state.auth.session_ttl_minutes),
        )],
        Json(json!({ "data": user })),
    )
        .into_response()
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = session_token(&headers) {
        let accounts = Accounts::new(state.db.connection());
        if let Err(e) = accounts.delete_session(&token).await {
            tracing::error!("failed to delete session: {}", e);
        }
    }

    (
        [(header::SET_COOKIE, clear_session_cookie())],
        Json(json!({ "data": "signed out" })),
    )
        .into_response()
}

pub async fn me(Extension(user): Extension<CurrentUser>) -> Response {
    api::success(user)
}

/// Admin-only: create a login for a staff member or patron.
pub async fn create_user(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<CreateUser>,
) -> Response {
    if let Err(resp) = require_admin(&user) {
        return resp;
    }

    let accounts = Accounts::new(state.db.connection());
    match accounts.create_user(payload).await {
        Ok(created) => api::created(created),
        Err(e) => e.into_response(),
    }
}
