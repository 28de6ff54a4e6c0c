//! SQLite-backed progress store.
//!
//! Keeps each record as a JSON object in one row keyed by path; updates
//! merge fields into the stored object inside a transaction.

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use super::store::{children_of, ProgressStore};
use crate::error::StoreError;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        // Run migrations
        Self::migrate(&pool).await?;

        Ok(Self { pool })
    }

    async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS quest_progress (
                path TEXT PRIMARY KEY NOT NULL,
                fields_json TEXT NOT NULL DEFAULT '{}',
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(pool)
        .await?;

        tracing::info!("Progress store migrations complete");
        Ok(())
    }

    fn parse_fields(json: &str) -> Result<Map<String, Value>, StoreError> {
        match serde_json::from_str(json)? {
            Value::Object(fields) => Ok(fields),
            _ => Err(StoreError::backend("stored record is not a JSON object")),
        }
    }
}

#[async_trait]
impl ProgressStore for SqliteStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let row = sqlx::query("SELECT fields_json FROM quest_progress WHERE path = ?")
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = row {
            let json: String = row.get("fields_json");
            return Ok(Some(Value::Object(Self::parse_fields(&json)?)));
        }

        // Children sort in ["parent/", "parent0"): '0' follows '/' in byte order
        let parent = path.trim_end_matches('/');
        let rows = sqlx::query("SELECT path, fields_json FROM quest_progress WHERE path >= ? AND path < ?")
            .bind(format!("{}/", parent))
            .bind(format!("{}0", parent))
            .fetch_all(&self.pool)
            .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let key: String = row.get("path");
            let json: String = row.get("fields_json");
            match Self::parse_fields(&json) {
                Ok(fields) => entries.push((key, fields)),
                Err(e) => tracing::warn!("Skipping unreadable record {}: {}", key, e),
            }
        }

        Ok(children_of(
            path,
            entries.iter().map(|(key, fields)| (key.as_str(), fields)),
        ))
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query("SELECT fields_json FROM quest_progress WHERE path = ?")
            .bind(path)
            .fetch_optional(&mut *tx)
            .await?;

        let mut merged = match existing {
            Some(row) => Self::parse_fields(&row.get::<String, _>("fields_json"))?,
            None => Map::new(),
        };
        merged.extend(fields);
        let json = serde_json::to_string(&merged)?;

        sqlx::query(
            r#"INSERT INTO quest_progress (path, fields_json, updated_at)
            VALUES (?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(path) DO UPDATE SET
                fields_json = excluded.fields_json,
                updated_at = CURRENT_TIMESTAMP"#,
        )
        .bind(path)
        .bind(&json)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM quest_progress WHERE path = ?")
            .bind(path)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
