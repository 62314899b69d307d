/// Public workflow operations
///
/// The facade is what the settings UI talks to. It validates input, drives the
/// collection, persists every mutation before reporting success, and hands back
/// plain owned records. Local outcomes (validation, not found, conflict) come
/// back as typed errors; storage failures propagate after in-memory changes are
/// rolled back.
///
/// Persistence and its rollback run on a spawned task, so a caller that stops
/// waiting (a dropped request, a timeout) never leaves a change half applied.

use crate::workflow::{
    collection::WorkflowCollection,
    error::{Result, StorageError, WorkflowError},
    types::{NewWorkflow, SetOptions, WorkflowPatch, WorkflowRecord},
};
use std::{future::Future, sync::Arc};

/// Cheaply cloneable handle over a shared workflow collection
#[derive(Debug, Clone)]
pub struct WorkflowFacade {
    collection: Arc<WorkflowCollection>,
    /// Serializes `ensure_loaded` so the first load happens once
    load_gate: Arc<tokio::sync::Mutex<()>>,
}

impl WorkflowFacade {
    pub fn new(collection: WorkflowCollection) -> Self {
        Self {
            collection: Arc::new(collection),
            load_gate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn collection(&self) -> &WorkflowCollection {
        &self.collection
    }

    /// Create a workflow; `title` and `content` are required
    pub async fn create(&self, info: NewWorkflow) -> Result<WorkflowRecord> {
        if let Some(field) = info.missing_field() {
            return Err(WorkflowError::Validation(format!(
                "title and content are required (missing {field})"
            )));
        }

        let record = self.collection.create(info)?;
        let collection = Arc::clone(&self.collection);

        run_to_completion(async move {
            if let Err(e) = collection.persist(&record).await {
                if collection.discard(&record) {
                    tracing::warn!("Rolled back workflow {} after failed save: {}", record.id, e);
                } else {
                    tracing::warn!(
                        "Save of new workflow {} failed after it was changed or removed; leaving memory as is: {}",
                        record.id,
                        e
                    );
                }
                return Err(e);
            }

            tracing::info!("Created workflow: {} ({})", record.id, record.title);

            Ok(record)
        })
        .await
    }

    /// Remove a workflow from the durable store, then from memory
    ///
    /// If the durable delete fails the in-memory record is kept. Updates of
    /// the id issued while the delete is in flight are `NotFound`.
    pub async fn remove(&self, id: &str) -> Result<WorkflowRecord> {
        if self.collection.get(id).is_none() {
            return Err(WorkflowError::NotFound(id.to_string()));
        }

        let collection = Arc::clone(&self.collection);
        let id = id.to_string();

        run_to_completion(async move {
            let removed = collection.persist_remove(&id).await?;
            tracing::info!("Removed workflow: {}", id);
            Ok(removed)
        })
        .await
    }

    /// Merge `patch` into an existing workflow and save it
    ///
    /// Never inserts: an unknown id is `NotFound`.
    pub async fn update(&self, patch: WorkflowPatch) -> Result<WorkflowRecord> {
        let previous = self
            .collection
            .get(&patch.id)
            .ok_or_else(|| WorkflowError::NotFound(patch.id.clone()))?;

        let updated = self
            .collection
            .set(std::slice::from_ref(&patch), SetOptions::merge())?
            .merged
            .into_iter()
            .next()
            .ok_or_else(|| WorkflowError::NotFound(patch.id.clone()))?;

        let collection = Arc::clone(&self.collection);

        run_to_completion(async move {
            if let Err(e) = collection.persist(&updated).await {
                if !collection.restore(&updated, previous) {
                    tracing::warn!(
                        "Workflow {} changed or was removed before its failed save returned; not restoring",
                        updated.id
                    );
                }
                return Err(e);
            }

            tracing::info!("Updated workflow: {}", updated.id);

            Ok(updated)
        })
        .await
    }

    /// Reload every workflow from the durable store; returns the count loaded
    pub async fn refresh(&self) -> Result<usize> {
        self.collection.fetch().await
    }

    pub fn get_workflow(&self, id: &str) -> Result<WorkflowRecord> {
        self.collection
            .get(id)
            .ok_or_else(|| WorkflowError::NotFound(id.to_string()))
    }

    pub fn get_workflows(&self) -> Vec<WorkflowRecord> {
        self.collection.to_json()
    }

    /// Startup load; same as `refresh`
    pub async fn init(&self) -> Result<usize> {
        self.refresh().await
    }

    pub fn is_loaded(&self) -> bool {
        self.collection.is_loaded()
    }

    /// Load once on first use; later calls return the current size
    pub async fn ensure_loaded(&self) -> Result<usize> {
        let _gate = self.load_gate.lock().await;
        if self.collection.is_loaded() {
            return Ok(self.collection.len());
        }
        self.init().await
    }
}

/// Drive `task` on its own tokio task and wait for it
///
/// The task keeps running if the returned future is dropped.
async fn run_to_completion<T>(task: impl Future<Output = Result<T>> + Send + 'static) -> Result<T>
where
    T: Send + 'static,
{
    tokio::spawn(task).await.map_err(|e| {
        tracing::error!("Workflow persistence task did not finish: {}", e);
        WorkflowError::Storage(StorageError::Unavailable(format!(
            "persistence task did not finish: {e}"
        )))
    })?
}
