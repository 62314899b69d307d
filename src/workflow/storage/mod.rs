/// Durable store adapter for workflow records
///
/// A namespaced, asynchronous key-value surface with no business logic:
/// bulk load, per-record upsert, per-record delete. Every call may fail.
///
/// ```text
/// WorkflowStore (trait)
///     └── SqliteStore   - sqlx SQLite backend used by the server
///     └── MemoryStore   - in-memory fake with failure injection and call holds
/// ```

use crate::workflow::{error::StorageError, types::WorkflowRecord};
use async_trait::async_trait;

pub mod memory;
pub mod sqlite;

pub use memory::{Hold, MemoryStore, StoreOp};
pub use sqlite::SqliteStore;

#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Load every record in the namespace, in first-insert order
    async fn load_all(&self, namespace: &str) -> Result<Vec<WorkflowRecord>, StorageError>;

    /// Insert or replace the record with the same id
    async fn put(&self, namespace: &str, record: &WorkflowRecord) -> Result<(), StorageError>;

    /// Delete a record by id; returns whether anything was removed
    async fn delete(&self, namespace: &str, id: &str) -> Result<bool, StorageError>;
}
