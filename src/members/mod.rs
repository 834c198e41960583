//! Members module
//!
//! Patron registration and management: profile fields, an
//! active/inactive/suspended status, and soft deletion. Suspension is
//! normally driven by the circulation module's overdue sweep, but staff can
//! set it manually here too.

mod handler;
mod lib;
mod routes;

pub use lib::*;
pub use routes::routes;

pub fn migrations() -> &'static [(&'static str, &'static str)] {
    &[("members_001_schema.sql", include_str!("migrations/001_schema.sql"))]
}
