//! # taskdesk
//!
//! A personal task-tracking service: authenticated users create, list,
//! update, complete, and delete tasks they own.
//!
//! ## Request flow
//! 1. The auth middleware verifies the bearer token and resolves the caller
//! 2. The task service performs the operation, enforcing ownership
//! 3. Status (pending/overdue/completed) is derived against the current time
//! 4. List responses carry a per-status summary of the returned set
//!
//! ## Modules
//! - `api`: HTTP surface (auth endpoints, task endpoints, router)
//! - `service`: the task operations and their authorization rules
//! - `task`: task model, derived status, summary fold
//! - `store`: task persistence behind the `TaskStore` trait
//! - `user`: user accounts backing credential issuance

pub mod api;
pub mod config;
pub mod error;
pub mod service;
pub mod store;
pub mod task;
pub mod user;

pub use config::Config;
pub use error::{ApiError, ApiResult};
