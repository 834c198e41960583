//! Circulation module
//!
//! The loan workflow: issuing a book to a member, taking it back, computing
//! the overdue fine at return time, and suspending members who sit on overdue
//! loans. Every availability change happens in the same transaction as the
//! loan record it belongs to; the per-day fine rate and loan period live in
//! the `settings` table so staff can change them at runtime.

mod handler;
mod lib;
mod routes;

pub use lib::*;
pub use routes::routes;

pub fn migrations() -> &'static [(&'static str, &'static str)] {
    &[("circulation_001_schema.sql", include_str!("migrations/001_schema.sql"))]
}
