//! User accounts for credential issuance.
//!
//! The task core only ever consumes a user's id; this store exists so the
//! register/login endpoints have somewhere to keep accounts. Password hashes
//! are stored alongside but never serialized into API responses.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A registered user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    /// Lowercased; unique across the store.
    pub email: String,
    /// PBKDF2-SHA256 hash, `pbkdf2-sha256$iterations$salt$hash` encoding.
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: String, email: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            password_hash,
            created_at: Utc::now(),
        }
    }
}

/// JSON-file-backed user store.
pub struct UserStore {
    users: RwLock<HashMap<Uuid, User>>,
    storage_path: PathBuf,
}

pub type UserStoreRef = Arc<UserStore>;

impl UserStore {
    /// Open the store, loading any existing users from `storage_path`.
    pub async fn open(storage_path: PathBuf) -> Result<Self> {
        let users = if storage_path.exists() {
            let contents = fs::read_to_string(&storage_path)
                .await
                .context("Failed to read user store")?;
            let loaded: Vec<User> =
                serde_json::from_str(&contents).context("Failed to parse user store")?;
            loaded.into_iter().map(|u| (u.id, u)).collect()
        } else {
            HashMap::new()
        };

        Ok(Self {
            users: RwLock::new(users),
            storage_path,
        })
    }

    pub async fn get(&self, id: Uuid) -> Option<User> {
        let users = self.users.read().await;
        users.get(&id).cloned()
    }

    pub async fn find_by_email(&self, email: &str) -> Option<User> {
        let needle = email.trim().to_lowercase();
        let users = self.users.read().await;
        users.values().find(|u| u.email == needle).cloned()
    }

    /// Insert a new user. Fails if the email is already registered.
    pub async fn insert(&self, user: User) -> Result<()> {
        {
            let mut users = self.users.write().await;
            if users.values().any(|u| u.email == user.email) {
                anyhow::bail!("email already registered");
            }
            users.insert(user.id, user);
        }
        self.save_to_disk().await
    }

    async fn save_to_disk(&self) -> Result<()> {
        let users = self.users.read().await;
        let records: Vec<&User> = users.values().collect();

        if let Some(parent) = self.storage_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let contents = serde_json::to_string_pretty(&records)?;
        fs::write(&self.storage_path, contents).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn insert_and_lookup() {
        let temp = tempdir().unwrap();
        let store = UserStore::open(temp.path().join("users.json"))
            .await
            .unwrap();

        let user = User::new(
            "Ada".to_string(),
            "ada@example.com".to_string(),
            "hash".to_string(),
        );
        let id = user.id;
        store.insert(user).await.unwrap();

        assert!(store.get(id).await.is_some());
        let found = store.find_by_email("ADA@example.com ").await.unwrap();
        assert_eq!(found.id, id);
    }

    #[tokio::test]
    async fn duplicate_email_rejected() {
        let temp = tempdir().unwrap();
        let store = UserStore::open(temp.path().join("users.json"))
            .await
            .unwrap();

        let first = User::new(
            "Ada".to_string(),
            "ada@example.com".to_string(),
            "hash".to_string(),
        );
        store.insert(first).await.unwrap();

        let second = User::new(
            "Imposter".to_string(),
            "ada@example.com".to_string(),
            "hash".to_string(),
        );
        assert!(store.insert(second).await.is_err());
    }
}
