use axum::{
    Router,
    routing::{delete, get, post, put},
};

use super::handler;
use crate::handler::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handler::list_members))
        .route("/", post(handler::register_member))
        .route("/search", get(handler::search_members))
        .route("/:id", get(handler::get_member))
        .route("/:id", put(handler::update_member))
        .route("/:id", delete(handler::delete_member))
        .route("/:id/status", put(handler::set_member_status))
}
