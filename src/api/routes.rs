//! Router assembly and server startup.

use std::sync::Arc;

use axum::middleware;
use axum::{
    response::Json,
    routing::{delete, get, patch, post, put},
    Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::service::TaskService;
use crate::store::JsonTaskStore;
use crate::user::{UserStore, UserStoreRef};

use super::auth;
use super::tasks;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// Registered user accounts, consulted by auth
    pub users: UserStoreRef,
    /// The task service; all task operations go through it
    pub tasks: TaskService,
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let users: UserStoreRef = Arc::new(UserStore::open(config.users_path()).await?);
    let task_store = Arc::new(JsonTaskStore::open(config.tasks_path()).await?);
    let tasks = TaskService::new(task_store);

    let state = Arc::new(AppState {
        config: config.clone(),
        users,
        tasks,
    });

    let public_routes = Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/api/tasks", get(tasks::list_tasks))
        .route("/api/tasks", post(tasks::create_task))
        .route("/api/tasks/:id", put(tasks::update_task))
        .route("/api/tasks/:id/complete", patch(tasks::complete_task))
        .route("/api/tasks/:id", delete(tasks::delete_task))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_auth,
        ));

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::clone(&state));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// GET /api/health - Liveness check.
async fn health() -> Json<serde_json::Value> {
    Json(json!({ "msg": "Task service is running" }))
}

/// Wait for Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
