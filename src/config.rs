//! Server configuration, read from environment variables at startup.

use std::path::PathBuf;

use anyhow::{Context, Result};

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind host, `HOST` (default 0.0.0.0)
    pub host: String,
    /// Bind port, `PORT` (default 5000)
    pub port: u16,
    /// Directory holding `tasks.json` and `users.json`, `DATA_DIR`
    pub data_dir: PathBuf,
    pub auth: AuthConfig,
}

/// Credential settings. The secret is required: the server fails closed at
/// startup rather than running unauthenticated.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HMAC secret for signing and verifying bearer tokens, `JWT_SECRET`
    pub jwt_secret: String,
    /// Token lifetime in days, `TOKEN_TTL_DAYS` (default 30)
    pub token_ttl_days: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = match std::env::var("PORT") {
            Ok(raw) => raw.parse().context("PORT must be a number")?,
            Err(_) => 5000,
        };
        let data_dir = std::env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".taskdesk"));

        let jwt_secret = std::env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .context("JWT_SECRET must be set")?;
        let token_ttl_days = match std::env::var("TOKEN_TTL_DAYS") {
            Ok(raw) => raw.parse().context("TOKEN_TTL_DAYS must be a number")?,
            Err(_) => 30,
        };

        Ok(Self {
            host,
            port,
            data_dir,
            auth: AuthConfig {
                jwt_secret,
                token_ttl_days,
            },
        })
    }

    pub fn tasks_path(&self) -> PathBuf {
        self.data_dir.join("tasks.json")
    }

    pub fn users_path(&self) -> PathBuf {
        self.data_dir.join("users.json")
    }
}
