/// SQLite persistence layer for workflow records
///
/// Records are stored as JSON, keyed by (namespace, id). Upserts keep the
/// original row so listing by rowid preserves first-insert order.

use crate::workflow::{error::StorageError, storage::WorkflowStore, types::WorkflowRecord};
use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    Row,
};
use std::{path::Path, time::Duration};

/// SQLite-backed workflow store
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create store over an existing pool (schema not touched)
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database file and initialize the schema
    ///
    /// `busy_timeout` bounds how long a write waits on a locked database,
    /// `acquire_timeout` how long a call waits for a pooled connection.
    pub async fn open(
        path: impl AsRef<Path>,
        busy_timeout: Duration,
        acquire_timeout: Duration,
    ) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .busy_timeout(busy_timeout);

        let pool = SqlitePoolOptions::new()
            .acquire_timeout(acquire_timeout)
            .connect_with(options)
            .await?;

        let store = Self::new(pool);
        store.init_schema().await?;

        tracing::info!("Opened workflow store: {}", path.as_ref().display());

        Ok(store)
    }

    /// Initialize the workflow record schema
    ///
    /// Safe to call multiple times (uses IF NOT EXISTS).
    pub async fn init_schema(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS workflow_records (
                namespace TEXT NOT NULL,
                id TEXT NOT NULL,
                record JSON NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (namespace, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl WorkflowStore for SqliteStore {
    async fn load_all(&self, namespace: &str) -> Result<Vec<WorkflowRecord>, StorageError> {
        let rows = sqlx::query("SELECT record FROM workflow_records WHERE namespace = ? ORDER BY rowid")
            .bind(namespace)
            .fetch_all(&self.pool)
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let record_json: String = row.get("record");
            records.push(serde_json::from_str(&record_json)?);
        }

        Ok(records)
    }

    async fn put(&self, namespace: &str, record: &WorkflowRecord) -> Result<(), StorageError> {
        let record_json = serde_json::to_string(record)?;
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO workflow_records (namespace, id, record, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(namespace, id) DO UPDATE SET
                record = excluded.record,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(namespace)
        .bind(&record.id)
        .bind(&record_json)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, namespace: &str, id: &str) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM workflow_records WHERE namespace = ? AND id = ?")
            .bind(namespace)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::types::NewWorkflow;
    use serde_json::json;

    async fn open_temp() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(
            dir.path().join("workflows.db"),
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_put_and_load_preserves_order_and_extras() {
        let (_dir, store) = open_temp().await;

        let a = NewWorkflow::new("A", "a").with_extra("icon", json!("a.png")).into_record();
        let b = NewWorkflow::new("B", "b").into_record();
        store.put("workflows", &a).await.unwrap();
        store.put("workflows", &b).await.unwrap();

        let loaded = store.load_all("workflows").await.unwrap();
        assert_eq!(loaded, vec![a, b]);
    }

    #[tokio::test]
    async fn test_upsert_keeps_position() {
        let (_dir, store) = open_temp().await;

        let mut a = NewWorkflow::new("A", "a").into_record();
        let b = NewWorkflow::new("B", "b").into_record();
        store.put("workflows", &a).await.unwrap();
        store.put("workflows", &b).await.unwrap();

        a.content = "a2".to_string();
        store.put("workflows", &a).await.unwrap();
        store.put("workflows", &a).await.unwrap();

        let loaded = store.load_all("workflows").await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].content, "a2");
        assert_eq!(loaded[1].id, b.id);
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let (_dir, store) = open_temp().await;

        let a = NewWorkflow::new("A", "a").into_record();
        store.put("one", &a).await.unwrap();

        assert!(store.load_all("two").await.unwrap().is_empty());
        assert!(!store.delete("two", &a.id).await.unwrap());
        assert!(store.delete("one", &a.id).await.unwrap());
        assert!(store.load_all("one").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reopen_reads_persisted_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workflows.db");
        let record = NewWorkflow::new("A", "a").into_record();

        {
            let store = SqliteStore::open(&path, Duration::from_secs(5), Duration::from_secs(5))
                .await
                .unwrap();
            store.put("workflows", &record).await.unwrap();
        }

        let store = SqliteStore::open(&path, Duration::from_secs(5), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(store.load_all("workflows").await.unwrap(), vec![record]);
    }
}
