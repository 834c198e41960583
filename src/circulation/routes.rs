use axum::{
    Router,
    routing::{get, post, put},
};

use super::handler;
use crate::handler::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/issues", get(handler::list_issues))
        .route("/issues", post(handler::issue_book))
        .route("/issues/:id/return", post(handler::return_book))
        .route("/my-loans", get(handler::my_loans))
        .route("/settings", get(handler::get_settings))
        .route("/settings", put(handler::update_settings))
}
