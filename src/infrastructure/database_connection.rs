// Database connection and pool management
// This module handles the SQLite identity map database using sqlx

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::infrastructure::config::{DatabaseConfig, defaults};

pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    /// Open with default pool settings
    pub async fn new(database_url: &str) -> Result<Self> {
        let config = DatabaseConfig {
            url: database_url.to_string(),
            max_connections: defaults::DB_MAX_CONNECTIONS,
            busy_timeout_ms: defaults::DB_BUSY_TIMEOUT_MS,
        };
        Self::with_config(&config).await
    }

    pub async fn with_config(config: &DatabaseConfig) -> Result<Self> {
        // Create database file directory if it doesn't exist
        let db_path = config
            .url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:");
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create database directory {:?}", parent))?;
            }
        }

        // WAL lets concurrent workers read while one writes; the busy timeout
        // covers writer contention.
        let options = SqliteConnectOptions::from_str(&config.url)
            .with_context(|| format!("Invalid database URL {}", config.url))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database {}", config.url))?;

        info!("🗄️ Connected to identity map database: {}", db_path);
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        let create_mapping_sql = r#"
            CREATE TABLE IF NOT EXISTS product_mapping (
                source_key TEXT PRIMARY KEY,
                target_key TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
        "#;

        let create_indexes_sql = r#"
            CREATE INDEX IF NOT EXISTS idx_product_mapping_target_key ON product_mapping (target_key)
        "#;

        sqlx::query(create_mapping_sql).execute(&self.pool).await?;
        sqlx::query(create_indexes_sql).execute(&self.pool).await?;

        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
