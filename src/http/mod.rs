//! HTTP surface: health, lobby handoff and the session upgrade

pub mod middleware;
pub mod routes;

pub use routes::build_router;
