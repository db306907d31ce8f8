//! Task persistence.
//!
//! The service talks to the store through the [`TaskStore`] trait; the
//! default implementation keeps tasks in memory behind an `RwLock` and
//! persists them to a JSON file after every mutation. Writes are atomic per
//! record only — concurrent updates to the same task race with
//! last-write-wins.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::task::Task;

/// Durable store of task records keyed by id.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// All tasks belonging to `owner`, in no particular order.
    async fn list_by_owner(&self, owner: Uuid) -> Result<Vec<Task>>;

    /// Fetch a task by id regardless of owner.
    async fn get(&self, id: Uuid) -> Result<Option<Task>>;

    /// Insert or replace a task.
    async fn put(&self, task: Task) -> Result<()>;

    /// Remove a task. Returns whether it existed.
    async fn remove(&self, id: Uuid) -> Result<bool>;
}

pub type TaskStoreRef = Arc<dyn TaskStore>;

/// JSON-file-backed task store.
pub struct JsonTaskStore {
    tasks: RwLock<HashMap<Uuid, Task>>,
    storage_path: PathBuf,
}

impl JsonTaskStore {
    /// Open the store, loading any existing tasks from `storage_path`.
    pub async fn open(storage_path: PathBuf) -> Result<Self> {
        let tasks = if storage_path.exists() {
            let contents = fs::read_to_string(&storage_path)
                .await
                .context("Failed to read task store")?;
            let loaded: Vec<Task> =
                serde_json::from_str(&contents).context("Failed to parse task store")?;
            loaded.into_iter().map(|t| (t.id, t)).collect()
        } else {
            HashMap::new()
        };

        Ok(Self {
            tasks: RwLock::new(tasks),
            storage_path,
        })
    }

    async fn save_to_disk(&self) -> Result<()> {
        let tasks = self.tasks.read().await;
        let records: Vec<&Task> = tasks.values().collect();

        if let Some(parent) = self.storage_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let contents = serde_json::to_string_pretty(&records)?;
        fs::write(&self.storage_path, contents).await?;
        Ok(())
    }
}

#[async_trait]
impl TaskStore for JsonTaskStore {
    async fn list_by_owner(&self, owner: Uuid) -> Result<Vec<Task>> {
        let tasks = self.tasks.read().await;
        Ok(tasks.values().filter(|t| t.owner == owner).cloned().collect())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Task>> {
        let tasks = self.tasks.read().await;
        Ok(tasks.get(&id).cloned())
    }

    async fn put(&self, task: Task) -> Result<()> {
        {
            let mut tasks = self.tasks.write().await;
            tasks.insert(task.id, task);
        }
        self.save_to_disk().await
    }

    async fn remove(&self, id: Uuid) -> Result<bool> {
        let existed = {
            let mut tasks = self.tasks.write().await;
            tasks.remove(&id).is_some()
        };
        if existed {
            self.save_to_disk().await?;
        }
        Ok(existed)
    }
}
