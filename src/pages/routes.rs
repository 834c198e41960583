use axum::{
    Router,
    routing::{get, post},
};

use super::handler;
use crate::handler::AppState;

/// The login form is the one page reachable without a session.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(handler::login_form))
        .route("/login", post(handler::login_submit))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handler::dashboard))
        .route("/logout", get(handler::logout))
        .route("/books", get(handler::books_page))
        .route("/members", get(handler::members_page))
        .route("/loans", get(handler::loans_page))
}
