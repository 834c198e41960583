use axum::{
    Router,
    routing::{get, post},
};

use super::handler;
use crate::handler::AppState;

/// Routes reachable without a session.
pub fn public_routes() -> Router<AppState> {
    Router::new().route("/login", post(handler::login))
}

/// Routes behind the auth middleware.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/logout", post(handler::logout))
        .route("/me", get(handler::me))
        .route("/users", post(handler::create_user))
}
