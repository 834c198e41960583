//! HTTP handlers for the loan workflow.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::info;

use super::{Circulation, Issue, IssueState, UpdateSettings};
use crate::api::{bad_request, success};
use crate::auth::{CurrentUser, require_admin};
use crate::handler::AppState;

#[derive(Debug, Deserialize)]
pub struct IssueRequest {
    pub book_id: i32,
    pub member_id: i32,
}

pub async fn issue_book(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<IssueRequest>,
) -> Response {
    if let Err(resp) = require_admin(&user) {
        return resp;
    }

    let circulation = Circulation::new(&state.db);
    match circulation.issue_book(payload.book_id, payload.member_id).await {
        Ok(issue) => {
            info!(
                issue_id = issue.id,
                book_id = issue.book_id,
                member_id = issue.member_id,
                due = %issue.due_date,
                "book issued"
            );
            crate::api::created(issue)
        }
        Err(e) => e.into_response(),
    }
}

pub async fn return_book(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Response {
    if let Err(resp) = require_admin(&user) {
        return resp;
    }

    let circulation = Circulation::new(&state.db);
    match circulation.return_book(id).await {
        Ok(issue) => {
            info!(issue_id = issue.id, fine = issue.fine, "book returned");
            success(issue)
        }
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct IssueListParams {
    pub state: Option<String>,
    pub member_id: Option<i32>,
}

pub async fn list_issues(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<IssueListParams>,
) -> Response {
    if let Err(resp) = require_admin(&user) {
        return resp;
    }

    let filter = match &params.state {
        Some(s) => match IssueState::from_str(s) {
            Some(filter) => Some(filter),
            None => return bad_request("state must be one of open, returned, overdue"),
        },
        None => None,
    };

    let circulation = Circulation::new(&state.db);
    match circulation.list_issues(filter, params.member_id).await {
        Ok(issues) => success(issues),
        Err(e) => e.into_response(),
    }
}

/// A signed-in member's own loan history. Admins without a linked member
/// profile just get an empty list.
pub async fn my_loans(State(state): State<AppState>, Extension(user): Extension<CurrentUser>) -> Response {
    let circulation = Circulation::new(&state.db);
    let loans = match user.member_id {
        Some(member_id) => circulation.list_issues(None, Some(member_id)).await,
        None => Ok(Vec::<Issue>::new()),
    };

    match loans {
        Ok(loans) => success(loans),
        Err(e) => e.into_response(),
    }
}

pub async fn get_settings(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Response {
    if let Err(resp) = require_admin(&user) {
        return resp;
    }

    let circulation = Circulation::new(&state.db);
    match circulation.settings().await {
        Ok(settings) => success(settings),
        Err(e) => e.into_response(),
    }
}

pub async fn update_settings(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<UpdateSettings>,
) -> Response {
    if let Err(resp) = require_admin(&user) {
        return resp;
    }

    let circulation = Circulation::new(&state.db);
    match circulation.update_settings(payload).await {
        Ok(settings) => {
            info!("circulation settings updated");
            success(settings)
        }
        Err(e) => e.into_response(),
    }
}
