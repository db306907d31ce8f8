//! Task API endpoints.
//!
//! Provides the owner-scoped task surface:
//! - List tasks with status filter and summary
//! - Create task
//! - Update task (merge-patch)
//! - Complete task
//! - Delete task

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::auth::AuthUser;
use super::routes::AppState;
use crate::error::ApiResult;
use crate::service::{CreateTaskInput, StatusFilter, UpdateTaskInput};
use crate::task::{TaskStatus, TaskView};

// ─────────────────────────────────────────────────────────────────────────────
// Request/Response Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub status: StatusFilter,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    /// RFC 3339 timestamp
    #[serde(default)]
    pub due_date: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
}

/// A task as presented to clients: the stored fields plus the status derived
/// at response time.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub due_date: DateTime<Utc>,
    pub completed: bool,
    pub owner: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: TaskStatus,
}

impl From<TaskView> for TaskResponse {
    fn from(view: TaskView) -> Self {
        let t = view.task;
        Self {
            id: t.id,
            title: t.title,
            description: t.description,
            due_date: t.due_date,
            completed: t.completed,
            owner: t.owner,
            created_at: t.created_at,
            updated_at: t.updated_at,
            status: view.status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub tasks: Vec<TaskResponse>,
    pub summary: BTreeMap<TaskStatus, usize>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET /api/tasks - List the caller's tasks with a per-status summary.
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<TaskListResponse>> {
    let list = state.tasks.list(user.id, query.status).await?;
    Ok(Json(TaskListResponse {
        tasks: list.tasks.into_iter().map(Into::into).collect(),
        summary: list.summary,
    }))
}

/// POST /api/tasks - Create a task owned by the caller.
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<TaskResponse>)> {
    let view = state
        .tasks
        .create(
            user.id,
            CreateTaskInput {
                title: req.title,
                description: req.description,
                due_date: req.due_date,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(view.into())))
}

/// PUT /api/tasks/:id - Merge-patch the caller's task.
pub async fn update_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTaskRequest>,
) -> ApiResult<Json<TaskResponse>> {
    let view = state
        .tasks
        .update(
            user.id,
            id,
            UpdateTaskInput {
                title: req.title,
                description: req.description,
                due_date: req.due_date,
            },
        )
        .await?;
    Ok(Json(view.into()))
}

/// PATCH /api/tasks/:id/complete - Mark the caller's task completed.
pub async fn complete_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TaskResponse>> {
    let view = state.tasks.complete(user.id, id).await?;
    Ok(Json(view.into()))
}

/// DELETE /api/tasks/:id - Permanently remove the caller's task.
pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    state.tasks.delete(user.id, id).await?;
    Ok(Json(json!({ "message": "Task removed" })))
}
