/// In-memory workflow collection backed by a durable store
///
/// Holds an ordered, id-keyed set of workflow records behind an `ArcSwap`
/// snapshot. Readers load the snapshot without locking; writers build a new
/// snapshot and compare-and-swap it in, retrying if another writer got there
/// first. No lock is ever held across an await.
///
/// Collection mutations are in-memory only. Persistence goes through
/// [`WorkflowCollection::persist`] / [`WorkflowCollection::persist_remove`],
/// which run in the per-id [`PersistQueue`]. An id with a removal in flight is
/// closed to merges and saves until that removal settles.

use crate::workflow::{
    error::{Result, WorkflowError},
    queue::PersistQueue,
    storage::WorkflowStore,
    types::{NewWorkflow, SetOptions, SetOutcome, WorkflowPatch, WorkflowRecord},
};
use arc_swap::{ArcSwap, Guard};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::{
    collections::HashSet,
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

pub struct WorkflowCollection {
    /// Store namespace all records of this collection live under
    namespace: String,
    store: Arc<dyn WorkflowStore>,
    /// Records in insertion order; ids are unique
    records: ArcSwap<Vec<WorkflowRecord>>,
    /// Count of successful local mutations, used to detect reloads racing them
    epoch: AtomicU64,
    loaded: AtomicBool,
    queue: PersistQueue,
    /// Ids whose durable delete is queued or running
    removing: Mutex<HashSet<String>>,
}

impl fmt::Debug for WorkflowCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowCollection")
            .field("namespace", &self.namespace)
            .field("len", &self.len())
            .field("epoch", &self.epoch.load(Ordering::SeqCst))
            .field("queue", &self.queue)
            .field("removing", &self.removing.lock().len())
            .finish_non_exhaustive()
    }
}

impl WorkflowCollection {
    /// Create an empty collection; persistence is queued per id by default
    pub fn new(namespace: impl Into<String>, store: Arc<dyn WorkflowStore>) -> Self {
        Self {
            namespace: namespace.into(),
            store,
            records: ArcSwap::from_pointee(Vec::new()),
            epoch: AtomicU64::new(0),
            loaded: AtomicBool::new(false),
            queue: PersistQueue::new(true),
            removing: Mutex::new(HashSet::new()),
        }
    }

    /// Enable or disable per-id ordering of persistence calls
    pub fn serialize_writes(mut self, enabled: bool) -> Self {
        self.queue = PersistQueue::new(enabled);
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn len(&self) -> usize {
        self.records.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.load().is_empty()
    }

    /// Whether at least one `fetch` has completed successfully
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    /// Whether a durable removal of `id` is queued or running
    pub fn is_removing(&self, id: &str) -> bool {
        self.removing.lock().contains(id)
    }

    /// Insert a new record built from `attrs`, generating its id if missing
    pub fn create(&self, attrs: NewWorkflow) -> Result<WorkflowRecord> {
        if let Some(field) = attrs.missing_field() {
            return Err(WorkflowError::Validation(format!("{field} must not be empty")));
        }
        let record = attrs.into_record();

        self.mutate(|records| {
            if records.iter().any(|r| r.id == record.id) {
                return Err(WorkflowError::Conflict(record.id.clone()));
            }
            records.push(record.clone());
            Ok(())
        })?;

        Ok(record)
    }

    /// Remove and return the record with `id`
    pub fn remove(&self, id: &str) -> Result<WorkflowRecord> {
        self.mutate(|records| {
            let position = records
                .iter()
                .position(|r| r.id == id)
                .ok_or_else(|| WorkflowError::NotFound(id.to_string()))?;
            Ok(records.remove(position))
        })
    }

    /// Apply partial records by id
    ///
    /// Existing ids are merged field by field. Unknown ids are inserted only
    /// with `options.add` (and must then carry a title and content), otherwise
    /// reported as skipped, as are ids with a removal in flight. With
    /// `options.remove`, records whose ids are not in `patches` are deleted.
    /// The whole set applies atomically or not at all.
    pub fn set(&self, patches: &[WorkflowPatch], options: SetOptions) -> Result<SetOutcome> {
        self.mutate(|records| {
            let mut outcome = SetOutcome::default();
            let mut merged_ids: Vec<&str> = Vec::new();

            for patch in patches {
                if self.is_removing(&patch.id) {
                    outcome.skipped.push(patch.id.clone());
                } else if let Some(position) = records.iter().position(|r| r.id == patch.id) {
                    records[position].apply(patch);
                    if !merged_ids.contains(&patch.id.as_str()) {
                        merged_ids.push(&patch.id);
                    }
                } else if options.add {
                    let mut record = patch.to_record();
                    if record.id.is_empty() {
                        record.id = uuid::Uuid::new_v4().to_string();
                    }
                    if !record.is_valid() {
                        return Err(WorkflowError::Validation(format!(
                            "cannot add workflow {}: title and content must not be empty",
                            record.id
                        )));
                    }
                    records.push(record.clone());
                    outcome.added.push(record);
                } else {
                    outcome.skipped.push(patch.id.clone());
                }
            }

            if options.remove {
                let keep: HashSet<&str> = patches
                    .iter()
                    .map(|p| p.id.as_str())
                    .chain(outcome.added.iter().map(|r| r.id.as_str()))
                    .collect();
                let (kept, removed): (Vec<_>, Vec<_>) =
                    records.drain(..).partition(|r| keep.contains(r.id.as_str()));
                *records = kept;
                outcome.removed = removed;
            }

            outcome.merged = merged_ids
                .iter()
                .filter_map(|id| records.iter().find(|r| r.id == *id).cloned())
                .collect();

            Ok(outcome)
        })
    }

    /// First record whose fields equal every key/value pair of `criteria`
    pub fn find_where(&self, criteria: &Map<String, Value>) -> Option<WorkflowRecord> {
        self.find(|record| record.matches(criteria))
    }

    /// First record matching `predicate`
    pub fn find(&self, predicate: impl Fn(&WorkflowRecord) -> bool) -> Option<WorkflowRecord> {
        self.records.load().iter().find(|&r| predicate(r)).cloned()
    }

    pub fn get(&self, id: &str) -> Option<WorkflowRecord> {
        self.find(|record| record.id == id)
    }

    /// Plain copies of every record, in insertion order
    pub fn to_json(&self) -> Vec<WorkflowRecord> {
        (**self.records.load()).clone()
    }

    /// Replace the whole in-memory set with the durable store's contents
    ///
    /// Local mutations that complete while the load is in flight are lost from
    /// memory when it lands (their persisted copies survive); this is logged.
    pub async fn fetch(&self) -> Result<usize> {
        let started = self.epoch.load(Ordering::SeqCst);
        let loaded = self.store.load_all(&self.namespace).await?;
        let count = self.replace_all(loaded, started);

        tracing::info!("Loaded {} workflows from '{}'", count, self.namespace);

        Ok(count)
    }

    /// Swap in `loaded` (first occurrence of each id wins) and mark the collection loaded
    ///
    /// Returns the number of records kept. Mutations counted since `started`
    /// are reported as replaced. The epoch is read before the swap, so a
    /// mutation racing the swap itself can go unreported but is never
    /// reported when it survived.
    fn replace_all(&self, loaded: Vec<WorkflowRecord>, started: u64) -> usize {
        let mut seen = HashSet::new();
        let mut records = Vec::with_capacity(loaded.len());
        for record in loaded {
            if seen.insert(record.id.clone()) {
                records.push(record);
            } else {
                tracing::warn!("Skipping duplicate workflow id from store: {}", record.id);
            }
        }

        let count = records.len();
        let interleaved = self.epoch.load(Ordering::SeqCst).saturating_sub(started);
        self.records.store(Arc::new(records));
        self.loaded.store(true, Ordering::SeqCst);

        if interleaved > 0 {
            tracing::warn!(
                "Reload of '{}' replaced {} local mutation(s) made while it was in flight",
                self.namespace,
                interleaved
            );
        }

        count
    }

    /// Save `record` to the durable store, ordered after earlier calls for the same id
    ///
    /// When its turn comes the save is refused with `NotFound` if the record
    /// has left memory or is being removed, so a removal is never undone by a
    /// save queued behind it.
    pub async fn persist(&self, record: &WorkflowRecord) -> Result<()> {
        self.queue
            .run(&record.id, async {
                if self.is_removing(&record.id) || self.get(&record.id).is_none() {
                    tracing::debug!("Skipping save of workflow {}: no longer present", record.id);
                    return Err(WorkflowError::NotFound(record.id.clone()));
                }
                record.save(self.store.as_ref(), &self.namespace).await?;
                Ok(())
            })
            .await
    }

    /// Delete `id` from the durable store, then from memory
    ///
    /// Both steps run in a single turn of the id's queue. From the call until
    /// that turn ends, `set` skips the id and queued saves of it are refused.
    /// If the durable delete fails the in-memory record is kept. A second
    /// removal of an id already being removed is `NotFound`.
    pub async fn persist_remove(&self, id: &str) -> Result<WorkflowRecord> {
        let mark = self.mark_removing(id)?;

        self.queue
            .run(id, async move {
                let _mark = mark;
                self.store.delete(&self.namespace, id).await?;
                self.remove(id)
            })
            .await
    }

    /// Put `previous` back if the live record is still exactly `expected`
    pub fn restore(&self, expected: &WorkflowRecord, previous: WorkflowRecord) -> bool {
        self.mutate(|records| {
            let slot = records
                .iter_mut()
                .find(|r| **r == *expected)
                .ok_or_else(|| WorkflowError::Conflict(expected.id.clone()))?;
            *slot = previous.clone();
            Ok(())
        })
        .is_ok()
    }

    /// Remove the live record if it is still exactly `expected`
    pub fn discard(&self, expected: &WorkflowRecord) -> bool {
        self.mutate(|records| {
            let position = records
                .iter()
                .position(|r| r == expected)
                .ok_or_else(|| WorkflowError::Conflict(expected.id.clone()))?;
            records.remove(position);
            Ok(())
        })
        .is_ok()
    }

    fn mark_removing(&self, id: &str) -> Result<RemovalMark<'_>> {
        if !self.removing.lock().insert(id.to_string()) {
            return Err(WorkflowError::NotFound(id.to_string()));
        }
        Ok(RemovalMark { collection: self, id: id.to_string() })
    }

    /// Read-copy-update over the record list
    ///
    /// `f` may run more than once if another writer swaps first. An error
    /// leaves the snapshot untouched.
    fn mutate<R>(&self, mut f: impl FnMut(&mut Vec<WorkflowRecord>) -> Result<R>) -> Result<R> {
        let mut current = self.records.load_full();
        loop {
            let mut next = (*current).clone();
            let value = f(&mut next)?;

            let previous = self.records.compare_and_swap(&current, Arc::new(next));
            if Arc::ptr_eq(&*previous, &current) {
                self.epoch.fetch_add(1, Ordering::SeqCst);
                return Ok(value);
            }
            current = Guard::into_inner(previous);
        }
    }
}

/// Clears an id's removal mark when dropped
struct RemovalMark<'a> {
    collection: &'a WorkflowCollection,
    id: String,
}

impl Drop for RemovalMark<'_> {
    fn drop(&mut self) {
        self.collection.removing.lock().remove(&self.id);
    }
}
