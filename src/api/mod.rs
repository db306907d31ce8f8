//! HTTP API: auth endpoints, task endpoints, and router assembly.

pub mod auth;
pub mod routes;
pub mod tasks;

pub use routes::{serve, AppState};
