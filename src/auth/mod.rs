//! Authentication module
//!
//! Session-based sign-in for the two roles the application knows about:
//! admins (staff) and members (patrons). Passwords are stored as salted
//! SHA-256 digests, sessions as database rows keyed by a random token that
//! travels in an HttpOnly cookie.
//!
//! The `users` table references `members`, so these migrations must run after
//! the members module's.

mod handler;
mod lib;
pub mod middleware;
mod routes;

pub use lib::*;
pub use middleware::{require_admin, require_auth, session_cookie, clear_session_cookie};
pub use routes::{public_routes, routes};

pub fn migrations() -> &'static [(&'static str, &'static str)] {
    &[("auth_001_schema.sql", include_str!("migrations/001_schema.sql"))]
}
