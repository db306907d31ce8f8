//! Task service - orchestrates ownership checks, validation, status
//! derivation, filtering, and summary computation.
//!
//! The caller identity is threaded into every operation as an explicit
//! `Uuid`; there is no process-wide notion of a current user. For the
//! mutating operations the check order is fixed: existence before ownership,
//! so an unknown id is `NotFound` for any caller while someone else's task is
//! `Forbidden`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult, FieldError};
use crate::store::TaskStoreRef;
use crate::task::{summarize, Task, TaskStatus, TaskView};

/// Status filter for the list operation.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Overdue,
    Completed,
}

impl StatusFilter {
    fn matches(&self, status: TaskStatus) -> bool {
        match self {
            Self::All => true,
            Self::Pending => status == TaskStatus::Pending,
            Self::Overdue => status == TaskStatus::Overdue,
            Self::Completed => status == TaskStatus::Completed,
        }
    }
}

/// Input for the create operation. `due_date` stays a raw string until
/// validation so a malformed value is reported alongside other field errors.
#[derive(Debug, Clone)]
pub struct CreateTaskInput {
    pub title: String,
    pub description: Option<String>,
    pub due_date: String,
}

/// Merge-patch input for the update operation: only supplied fields are
/// applied, omitted fields keep their prior values.
#[derive(Debug, Clone, Default)]
pub struct UpdateTaskInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
}

/// Result of the list operation: ordered tasks plus a summary computed over
/// the post-filter set.
#[derive(Debug)]
pub struct TaskList {
    pub tasks: Vec<TaskView>,
    pub summary: BTreeMap<TaskStatus, usize>,
}

pub struct TaskService {
    store: TaskStoreRef,
}

impl TaskService {
    pub fn new(store: TaskStoreRef) -> Self {
        Self { store }
    }

    /// List the owner's tasks ordered by due date ascending (ties broken by
    /// creation time, most recent first), filtered by derived status.
    pub async fn list(&self, owner: Uuid, filter: StatusFilter) -> ApiResult<TaskList> {
        let mut tasks = self.store.list_by_owner(owner).await?;
        tasks.sort_by(|a, b| {
            a.due_date
                .cmp(&b.due_date)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });

        let now = Utc::now();
        let views: Vec<TaskView> = tasks
            .into_iter()
            .map(|task| TaskView {
                status: task.status_at(now),
                task,
            })
            .filter(|view| filter.matches(view.status))
            .collect();

        let summary = summarize(&views);
        Ok(TaskList {
            tasks: views,
            summary,
        })
    }

    /// Create a task owned by `owner`. Validation runs before any store
    /// access and reports every failing field.
    pub async fn create(&self, owner: Uuid, input: CreateTaskInput) -> ApiResult<TaskView> {
        let mut errors = Vec::new();

        let title = input.title.trim().to_string();
        if title.is_empty() {
            errors.push(FieldError::new("title", "Title is required"));
        }

        let due_date = match parse_due_date(&input.due_date) {
            Some(due) => due,
            None => {
                errors.push(FieldError::new("dueDate", "Valid dueDate required"));
                return Err(ApiError::validation(errors));
            }
        };

        if !errors.is_empty() {
            return Err(ApiError::validation(errors));
        }

        let task = Task::new(owner, title, input.description.unwrap_or_default(), due_date);
        self.store.put(task.clone()).await?;

        tracing::info!(task_id = %task.id, owner = %owner, "task created");
        Ok(TaskView {
            status: task.status_at(Utc::now()),
            task,
        })
    }

    /// Merge-patch update of title, description, and/or due date.
    pub async fn update(
        &self,
        requester: Uuid,
        task_id: Uuid,
        input: UpdateTaskInput,
    ) -> ApiResult<TaskView> {
        let mut task = self.load_owned(requester, task_id).await?;

        let mut errors = Vec::new();
        let mut new_title = None;
        if let Some(title) = input.title {
            let title = title.trim().to_string();
            if title.is_empty() {
                errors.push(FieldError::new("title", "Title is required"));
            } else {
                new_title = Some(title);
            }
        }

        let mut new_due_date = None;
        if let Some(raw) = input.due_date {
            match parse_due_date(&raw) {
                Some(due) => new_due_date = Some(due),
                None => errors.push(FieldError::new("dueDate", "Valid dueDate required")),
            }
        }

        if !errors.is_empty() {
            return Err(ApiError::validation(errors));
        }

        if let Some(title) = new_title {
            task.title = title;
        }
        if let Some(description) = input.description {
            task.description = description;
        }
        if let Some(due) = new_due_date {
            task.due_date = due;
        }
        task.updated_at = Utc::now();

        self.store.put(task.clone()).await?;
        Ok(TaskView {
            status: task.status_at(Utc::now()),
            task,
        })
    }

    /// Mark a task completed. Idempotent: completing a completed task is a
    /// no-op success.
    pub async fn complete(&self, requester: Uuid, task_id: Uuid) -> ApiResult<TaskView> {
        let mut task = self.load_owned(requester, task_id).await?;

        task.completed = true;
        task.updated_at = Utc::now();
        self.store.put(task.clone()).await?;

        Ok(TaskView {
            status: TaskStatus::Completed,
            task,
        })
    }

    /// Permanently remove a task.
    pub async fn delete(&self, requester: Uuid, task_id: Uuid) -> ApiResult<()> {
        self.load_owned(requester, task_id).await?;
        self.store.remove(task_id).await?;
        tracing::info!(task_id = %task_id, "task removed");
        Ok(())
    }

    /// Load a task, enforcing existence before ownership.
    async fn load_owned(&self, requester: Uuid, task_id: Uuid) -> ApiResult<Task> {
        let task = self
            .store
            .get(task_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

        if task.owner != requester {
            return Err(ApiError::Forbidden("Unauthorized".to_string()));
        }
        Ok(task)
    }
}

fn parse_due_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JsonTaskStore;
    use chrono::Duration;
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};

    async fn service() -> (TaskService, TempDir) {
        let temp = tempdir().unwrap();
        let store = JsonTaskStore::open(temp.path().join("tasks.json"))
            .await
            .unwrap();
        (TaskService::new(Arc::new(store)), temp)
    }

    fn rfc3339(dt: DateTime<Utc>) -> String {
        dt.to_rfc3339()
    }

    fn create_input(title: &str, due: DateTime<Utc>) -> CreateTaskInput {
        CreateTaskInput {
            title: title.to_string(),
            description: None,
            due_date: rfc3339(due),
        }
    }

    #[tokio::test]
    async fn create_with_empty_title_reports_field_and_persists_nothing() {
        let (svc, _tmp) = service().await;
        let owner = Uuid::new_v4();

        let err = svc
            .create(owner, create_input("   ", Utc::now() + Duration::days(1)))
            .await
            .unwrap_err();

        match err {
            ApiError::Validation(fields) => {
                assert_eq!(fields, vec![FieldError::new("title", "Title is required")]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }

        let list = svc.list(owner, StatusFilter::All).await.unwrap();
        assert!(list.tasks.is_empty());
    }

    #[tokio::test]
    async fn create_collects_every_failing_field() {
        let (svc, _tmp) = service().await;

        let err = svc
            .create(
                Uuid::new_v4(),
                CreateTaskInput {
                    title: "".to_string(),
                    description: None,
                    due_date: "next tuesday".to_string(),
                },
            )
            .await
            .unwrap_err();

        match err {
            ApiError::Validation(fields) => {
                let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
                assert_eq!(names, vec!["title", "dueDate"]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_future_due_is_pending_past_due_is_overdue() {
        let (svc, _tmp) = service().await;
        let owner = Uuid::new_v4();

        let future = svc
            .create(owner, create_input("later", Utc::now() + Duration::days(365)))
            .await
            .unwrap();
        assert_eq!(future.status, TaskStatus::Pending);

        let past = svc
            .create(owner, create_input("missed", Utc::now() - Duration::days(1)))
            .await
            .unwrap();
        assert_eq!(past.status, TaskStatus::Overdue);
    }

    #[tokio::test]
    async fn owner_is_bound_from_caller() {
        let (svc, _tmp) = service().await;
        let owner = Uuid::new_v4();
        let view = svc
            .create(owner, create_input("mine", Utc::now() + Duration::days(1)))
            .await
            .unwrap();
        assert_eq!(view.task.owner, owner);
        assert!(!view.task.completed);
    }

    #[tokio::test]
    async fn complete_is_idempotent() {
        let (svc, _tmp) = service().await;
        let owner = Uuid::new_v4();
        let view = svc
            .create(owner, create_input("ship it", Utc::now() + Duration::days(1)))
            .await
            .unwrap();

        let first = svc.complete(owner, view.task.id).await.unwrap();
        assert!(first.task.completed);
        assert_eq!(first.status, TaskStatus::Completed);

        let second = svc.complete(owner, view.task.id).await.unwrap();
        assert!(second.task.completed);
        assert_eq!(second.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn foreign_requester_is_forbidden() {
        let (svc, _tmp) = service().await;
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let view = svc
            .create(alice, create_input("private", Utc::now() + Duration::days(1)))
            .await
            .unwrap();
        let id = view.task.id;

        assert!(matches!(
            svc.update(bob, id, UpdateTaskInput::default()).await,
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(
            svc.complete(bob, id).await,
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(
            svc.delete(bob, id).await,
            Err(ApiError::Forbidden(_))
        ));

        // Still there, still alice's.
        let list = svc.list(alice, StatusFilter::All).await.unwrap();
        assert_eq!(list.tasks.len(), 1);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found_for_any_caller() {
        let (svc, _tmp) = service().await;
        let phantom = Uuid::new_v4();
        for requester in [Uuid::new_v4(), Uuid::new_v4()] {
            assert!(matches!(
                svc.complete(requester, phantom).await,
                Err(ApiError::NotFound(_))
            ));
            assert!(matches!(
                svc.delete(requester, phantom).await,
                Err(ApiError::NotFound(_))
            ));
            assert!(matches!(
                svc.update(requester, phantom, UpdateTaskInput::default())
                    .await,
                Err(ApiError::NotFound(_))
            ));
        }
    }

    #[tokio::test]
    async fn update_merges_only_supplied_fields() {
        let (svc, _tmp) = service().await;
        let owner = Uuid::new_v4();
        let created = svc
            .create(
                owner,
                CreateTaskInput {
                    title: "draft slides".to_string(),
                    description: Some("for friday".to_string()),
                    due_date: rfc3339(Utc::now() + Duration::days(2)),
                },
            )
            .await
            .unwrap();

        let new_due = Utc::now() + Duration::days(9);
        let updated = svc
            .update(
                owner,
                created.task.id,
                UpdateTaskInput {
                    due_date: Some(rfc3339(new_due)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.task.title, "draft slides");
        assert_eq!(updated.task.description, "for friday");
        assert_eq!(updated.task.due_date.timestamp(), new_due.timestamp());
    }

    #[tokio::test]
    async fn update_rejects_bad_due_date_without_writing() {
        let (svc, _tmp) = service().await;
        let owner = Uuid::new_v4();
        let created = svc
            .create(owner, create_input("check in", Utc::now() + Duration::days(2)))
            .await
            .unwrap();

        let err = svc
            .update(
                owner,
                created.task.id,
                UpdateTaskInput {
                    due_date: Some("soonish".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let list = svc.list(owner, StatusFilter::All).await.unwrap();
        assert_eq!(
            list.tasks[0].task.due_date.timestamp(),
            created.task.due_date.timestamp()
        );
    }

    #[tokio::test]
    async fn list_orders_by_due_date_then_newest_created() {
        let (svc, _tmp) = service().await;
        let owner = Uuid::new_v4();
        let shared_due = Utc::now() + Duration::days(5);

        let early = svc
            .create(owner, create_input("early", Utc::now() + Duration::days(1)))
            .await
            .unwrap();
        let first_tied = svc
            .create(owner, create_input("tied-old", shared_due))
            .await
            .unwrap();
        let second_tied = svc
            .create(owner, create_input("tied-new", shared_due))
            .await
            .unwrap();

        let list = svc.list(owner, StatusFilter::All).await.unwrap();
        let ids: Vec<Uuid> = list.tasks.iter().map(|v| v.task.id).collect();
        assert_eq!(ids[0], early.task.id);
        // Equal due dates: most recently created first.
        if first_tied.task.created_at == second_tied.task.created_at {
            assert_eq!(ids.len(), 3);
        } else {
            assert_eq!(ids[1], second_tied.task.id);
            assert_eq!(ids[2], first_tied.task.id);
        }
    }

    #[tokio::test]
    async fn list_filter_completed_returns_exact_subset() {
        let (svc, _tmp) = service().await;
        let owner = Uuid::new_v4();

        let a = svc
            .create(owner, create_input("done soon", Utc::now() + Duration::days(1)))
            .await
            .unwrap();
        svc.create(owner, create_input("still open", Utc::now() + Duration::days(2)))
            .await
            .unwrap();
        svc.create(owner, create_input("late", Utc::now() - Duration::days(1)))
            .await
            .unwrap();
        svc.complete(owner, a.task.id).await.unwrap();

        let list = svc.list(owner, StatusFilter::Completed).await.unwrap();
        assert_eq!(list.tasks.len(), 1);
        assert!(list
            .tasks
            .iter()
            .all(|v| v.status == TaskStatus::Completed));
        assert_eq!(list.summary.get(&TaskStatus::Completed), Some(&1));
        // Summary is over the post-filter set: no other statuses present.
        assert_eq!(list.summary.len(), 1);
    }

    #[tokio::test]
    async fn overdue_task_lifecycle_end_to_end() {
        let (svc, _tmp) = service().await;
        let owner = Uuid::new_v4();

        let created = svc
            .create(owner, create_input("yesterday", Utc::now() - Duration::days(1)))
            .await
            .unwrap();

        let list = svc.list(owner, StatusFilter::All).await.unwrap();
        assert_eq!(list.tasks[0].status, TaskStatus::Overdue);
        assert_eq!(list.summary.get(&TaskStatus::Overdue), Some(&1));

        svc.complete(owner, created.task.id).await.unwrap();

        let list = svc.list(owner, StatusFilter::All).await.unwrap();
        assert_eq!(list.tasks[0].status, TaskStatus::Completed);
        assert_eq!(list.summary.get(&TaskStatus::Completed), Some(&1));
        assert!(!list.summary.contains_key(&TaskStatus::Overdue));
    }

    #[tokio::test]
    async fn delete_removes_permanently() {
        let (svc, _tmp) = service().await;
        let owner = Uuid::new_v4();
        let view = svc
            .create(owner, create_input("ephemeral", Utc::now() + Duration::days(1)))
            .await
            .unwrap();

        svc.delete(owner, view.task.id).await.unwrap();
        assert!(matches!(
            svc.delete(owner, view.task.id).await,
            Err(ApiError::NotFound(_))
        ));
        assert!(svc
            .list(owner, StatusFilter::All)
            .await
            .unwrap()
            .tasks
            .is_empty());
    }
}
