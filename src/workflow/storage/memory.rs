/// In-memory workflow store for deterministic tests
///
/// Behaves like a host key-value store whose calls resolve some time after they
/// are issued: a load takes its snapshot when called and delivers it when it
/// completes, while puts and deletes apply when they complete. Tests control
/// that gap with [`MemoryStore::hold_next`] and inject failures with
/// [`MemoryStore::fail_next`].

use crate::workflow::{error::StorageError, storage::WorkflowStore, types::WorkflowRecord};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use tokio::sync::oneshot;

/// Store call kinds that can be held, failed or counted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Load,
    Put,
    Delete,
}

/// Test handle for a held store call
///
/// `reached` resolves once the held call has been issued; the call completes
/// after `release` (or when the handle is dropped).
#[derive(Debug)]
pub struct Hold {
    reached: Option<oneshot::Receiver<()>>,
    release: oneshot::Sender<()>,
}

impl Hold {
    /// Wait until the held call has arrived at the store
    pub async fn reached(&mut self) {
        if let Some(reached) = self.reached.take() {
            let _ = reached.await;
        }
    }

    /// Let the held call complete
    pub fn release(self) {
        let _ = self.release.send(());
    }
}

#[derive(Debug)]
struct PendingHold {
    reached: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
}

impl PendingHold {
    async fn wait(self) {
        let _ = self.reached.send(());
        let _ = self.release.await;
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, Vec<WorkflowRecord>>>,
    failures: Mutex<HashMap<StoreOp, VecDeque<StorageError>>>,
    holds: Mutex<HashMap<StoreOp, VecDeque<PendingHold>>>,
    calls: Mutex<HashMap<StoreOp, usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a namespace directly, bypassing holds and failures
    pub fn with_records(self, namespace: &str, records: Vec<WorkflowRecord>) -> Self {
        self.records.lock().insert(namespace.to_string(), records);
        self
    }

    /// Make the next call of `op` fail with `error`
    pub fn fail_next(&self, op: StoreOp, error: StorageError) {
        self.failures.lock().entry(op).or_default().push_back(error);
    }

    /// Hold the next call of `op` until the returned handle is released
    pub fn hold_next(&self, op: StoreOp) -> Hold {
        let (reached_tx, reached_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();

        self.holds.lock().entry(op).or_default().push_back(PendingHold {
            reached: reached_tx,
            release: release_rx,
        });

        Hold {
            reached: Some(reached_rx),
            release: release_tx,
        }
    }

    /// Durable records of a namespace, in order
    pub fn records(&self, namespace: &str) -> Vec<WorkflowRecord> {
        self.records.lock().get(namespace).cloned().unwrap_or_default()
    }

    pub fn get(&self, namespace: &str, id: &str) -> Option<WorkflowRecord> {
        self.records
            .lock()
            .get(namespace)
            .and_then(|records| records.iter().find(|r| r.id == id).cloned())
    }

    pub fn contains(&self, namespace: &str, id: &str) -> bool {
        self.get(namespace, id).is_some()
    }

    /// How many calls of `op` have been issued
    pub fn calls(&self, op: StoreOp) -> usize {
        self.calls.lock().get(&op).copied().unwrap_or(0)
    }

    /// Count the call, then wait on a pending hold and surface an injected failure
    async fn enter(&self, op: StoreOp) -> Result<(), StorageError> {
        *self.calls.lock().entry(op).or_insert(0) += 1;

        let hold = self.holds.lock().get_mut(&op).and_then(VecDeque::pop_front);
        if let Some(hold) = hold {
            hold.wait().await;
        }

        let failure = self.failures.lock().get_mut(&op).and_then(VecDeque::pop_front);
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl WorkflowStore for MemoryStore {
    async fn load_all(&self, namespace: &str) -> Result<Vec<WorkflowRecord>, StorageError> {
        let snapshot = self.records(namespace);
        self.enter(StoreOp::Load).await?;
        Ok(snapshot)
    }

    async fn put(&self, namespace: &str, record: &WorkflowRecord) -> Result<(), StorageError> {
        // Round-trip through JSON so the fake rejects what a real store would
        let stored: WorkflowRecord = serde_json::from_value(serde_json::to_value(record)?)?;
        self.enter(StoreOp::Put).await?;

        let mut records = self.records.lock();
        let namespace = records.entry(namespace.to_string()).or_default();
        match namespace.iter_mut().find(|r| r.id == stored.id) {
            Some(existing) => *existing = stored,
            None => namespace.push(stored),
        }

        Ok(())
    }

    async fn delete(&self, namespace: &str, id: &str) -> Result<bool, StorageError> {
        self.enter(StoreOp::Delete).await?;

        let mut records = self.records.lock();
        let Some(namespace) = records.get_mut(namespace) else {
            return Ok(false);
        };
        let before = namespace.len();
        namespace.retain(|r| r.id != id);

        Ok(namespace.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::types::NewWorkflow;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_put_upserts_in_place() {
        let store = MemoryStore::new();
        let mut a = NewWorkflow::new("A", "a").into_record();
        let b = NewWorkflow::new("B", "b").into_record();

        store.put("ns", &a).await.unwrap();
        store.put("ns", &b).await.unwrap();
        a.title = "A2".to_string();
        store.put("ns", &a).await.unwrap();

        let records = store.records("ns");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "A2");
        assert_eq!(store.calls(StoreOp::Put), 3);
    }

    #[tokio::test]
    async fn test_fail_next_fails_once() {
        let store = MemoryStore::new();
        let a = NewWorkflow::new("A", "a").into_record();

        store.fail_next(StoreOp::Put, StorageError::QuotaExceeded);
        assert!(matches!(store.put("ns", &a).await, Err(StorageError::QuotaExceeded)));
        assert!(!store.contains("ns", &a.id));

        store.put("ns", &a).await.unwrap();
        assert!(store.contains("ns", &a.id));
    }

    #[tokio::test]
    async fn test_held_load_returns_snapshot_from_call_time() {
        let store = Arc::new(MemoryStore::new());
        let a = NewWorkflow::new("A", "a").into_record();
        let mut hold = store.hold_next(StoreOp::Load);

        let loader = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.load_all("ns").await }
        });
        hold.reached().await;

        store.put("ns", &a).await.unwrap();
        hold.release();

        assert!(loader.await.unwrap().unwrap().is_empty());
        assert_eq!(store.load_all("ns").await.unwrap(), vec![a]);
    }

    #[tokio::test]
    async fn test_delete_reports_whether_removed() {
        let a = NewWorkflow::new("A", "a").into_record();
        let store = MemoryStore::new().with_records("ns", vec![a.clone()]);

        assert!(store.delete("ns", &a.id).await.unwrap());
        assert!(!store.delete("ns", &a.id).await.unwrap());
        assert!(!store.delete("other", &a.id).await.unwrap());
    }
}
