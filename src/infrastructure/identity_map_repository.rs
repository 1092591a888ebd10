//! SQLite-backed identity map
//!
//! One row per source product in `product_mapping`. Rows are only ever
//! inserted or overwritten.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::domain::errors::SyncError;
use crate::domain::product::{SourceKey, TargetKey};
use crate::domain::repositories::IdentityMap;

#[derive(Clone)]
pub struct SqliteIdentityMap {
    pool: SqlitePool,
}

impl SqliteIdentityMap {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Number of mapped products
    pub async fn count(&self) -> Result<i64, SyncError> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM product_mapping")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("total")?)
    }
}

#[async_trait]
impl IdentityMap for SqliteIdentityMap {
    async fn lookup(&self, key: &SourceKey) -> Result<Option<TargetKey>, SyncError> {
        let row = sqlx::query("SELECT target_key FROM product_mapping WHERE source_key = ?")
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let target_key: String = row.try_get("target_key")?;
                Ok(Some(TargetKey::new(target_key)))
            }
            None => Ok(None),
        }
    }

    async fn upsert(&self, key: &SourceKey, target_key: &TargetKey) -> Result<(), SyncError> {
        sqlx::query(
            r#"
            INSERT INTO product_mapping (source_key, target_key, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(source_key) DO UPDATE SET
                target_key = excluded.target_key,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key.as_str())
        .bind(target_key.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
