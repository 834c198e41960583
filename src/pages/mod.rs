//! Server-rendered pages
//!
//! Plain HTML rendered straight from handlers: a login form, a dashboard and
//! the books/members/loans tables. Admins get the management pages, members
//! get their own loans. The autocomplete widget on the books and members
//! pages is served from the embedded assets.

mod handler;
mod routes;

pub use routes::{public_routes, routes};
