//! Task model and derived status.
//!
//! Status is never stored: it is recomputed from `completed` and `due_date`
//! against the current wall clock on every read. Two reads of the same task
//! at different times may report different statuses without any write.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted task record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier, assigned at creation
    pub id: Uuid,
    /// Non-empty title (trimmed)
    pub title: String,
    /// Free-form description, defaults to empty
    #[serde(default)]
    pub description: String,
    /// When the task is due
    pub due_date: DateTime<Utc>,
    /// Whether the task has been completed. Monotonic: no operation clears it.
    #[serde(default)]
    pub completed: bool,
    /// Owning user. Bound once at creation from the resolved caller identity.
    pub owner: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a new task owned by `owner`. Completion starts false.
    pub fn new(owner: Uuid, title: String, description: String, due_date: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title,
            description,
            due_date,
            completed: false,
            owner,
            created_at: now,
            updated_at: now,
        }
    }

    /// Derived status of this task at `now`.
    pub fn status_at(&self, now: DateTime<Utc>) -> TaskStatus {
        TaskStatus::derive(self.completed, self.due_date, now)
    }
}

/// Derived task status. Computed at read time, never persisted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Overdue,
    Completed,
}

impl TaskStatus {
    /// Pure derivation: completed is absorbing and takes priority over the
    /// due-date comparison; otherwise a past due date means overdue.
    pub fn derive(completed: bool, due_date: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if completed {
            Self::Completed
        } else if due_date < now {
            Self::Overdue
        } else {
            Self::Pending
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Overdue => "overdue",
            Self::Completed => "completed",
        }
    }
}

/// A task paired with its status as derived at read time.
#[derive(Debug, Clone)]
pub struct TaskView {
    pub task: Task,
    pub status: TaskStatus,
}

/// Fold a list of derived statuses into per-status counts.
///
/// Only statuses present in the list appear as keys; absent statuses are not
/// zero-filled.
pub fn summarize(views: &[TaskView]) -> BTreeMap<TaskStatus, usize> {
    let mut summary = BTreeMap::new();
    for view in views {
        *summary.entry(view.status).or_insert(0) += 1;
    }
    summary
}
