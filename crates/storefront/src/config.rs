//! Configuration loaded from environment variables.

use std::env;

use anyhow::{Context, Result, bail};

/// Which [`CatalogStore`](crate::store::CatalogStore) backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// PostgreSQL via sqlx (default).
    Postgres,
    /// In-process store; data is lost on restart.
    Memory,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// Store backend: "postgres" or "memory" (default: "postgres").
    pub store: StoreBackend,

    /// PostgreSQL connection URL. Required for the postgres backend.
    pub database_url: Option<String>,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// CORS allowed origins (comma-separated, default: "*").
    pub cors_allowed_origins: Vec<String>,

    /// Largest accepted product photo in bytes (default: 1000000).
    pub max_photo_bytes: usize,

    /// Per-request deadline in seconds (default: 30).
    pub request_timeout_secs: u64,

    /// Check category usage before removing children, atomically (default: false).
    pub category_delete_guard: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            store: StoreBackend::Memory,
            database_url: None,
            database_max_connections: 10,
            cors_allowed_origins: vec!["*".to_string()],
            max_photo_bytes: 1_000_000,
            request_timeout_secs: 30,
            category_delete_guard: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let store = match env::var("STORE")
            .unwrap_or_else(|_| "postgres".to_string())
            .to_lowercase()
            .as_str()
        {
            "postgres" | "postgresql" => StoreBackend::Postgres,
            "memory" => StoreBackend::Memory,
            other => bail!("STORE must be \"postgres\" or \"memory\", got \"{other}\""),
        };

        let database_url = env::var("DATABASE_URL").ok();
        if store == StoreBackend::Postgres && database_url.is_none() {
            bail!("DATABASE_URL environment variable is required when STORE=postgres");
        }

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_else(|_| vec!["*".to_string()]);

        let max_photo_bytes = env::var("MAX_PHOTO_BYTES")
            .unwrap_or_else(|_| "1000000".to_string())
            .parse()
            .context("MAX_PHOTO_BYTES must be a valid usize")?;

        let request_timeout_secs = env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .context("REQUEST_TIMEOUT_SECS must be a valid u64")?;

        let category_delete_guard = env::var("CATEGORY_DELETE_GUARD")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);

        Ok(Self {
            port,
            store,
            database_url,
            database_max_connections,
            cors_allowed_origins,
            max_photo_bytes,
            request_timeout_secs,
            category_delete_guard,
        })
    }
}
