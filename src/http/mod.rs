//! HTTP surface: router and identity token verification

pub mod auth;
pub mod routes;

pub use routes::build_router;
