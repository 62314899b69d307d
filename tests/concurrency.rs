//! Ordering of overlapping persistence calls and reloads
//!
//! The memory store holds selected calls open so the interleavings below are
//! deterministic on the single-threaded test runtime.

use std::{sync::Arc, time::Duration};
use steward_workflows::workflow::{
    storage::StoreOp, MemoryStore, NewWorkflow, StorageError, WorkflowCollection, WorkflowError,
    WorkflowFacade, WorkflowPatch, WorkflowRecord,
};

const NS: &str = "workflows";

async fn setup(serialize_writes: bool) -> (Arc<MemoryStore>, WorkflowFacade, WorkflowRecord) {
    let store = Arc::new(MemoryStore::new());
    let collection =
        WorkflowCollection::new(NS, store.clone()).serialize_writes(serialize_writes);
    let facade = WorkflowFacade::new(collection);
    let created = facade.create(NewWorkflow::new("T", "C0")).await.unwrap();
    (store, facade, created)
}

fn spawn_update(
    facade: &WorkflowFacade,
    id: &str,
    content: &str,
) -> tokio::task::JoinHandle<Result<WorkflowRecord, WorkflowError>> {
    let facade = facade.clone();
    let patch = WorkflowPatch::new(id).content(content);
    tokio::spawn(async move { facade.update(patch).await })
}

#[tokio::test]
async fn test_serialized_writes_keep_last_issued_update() {
    let (store, facade, created) = setup(true).await;

    let mut hold = store.hold_next(StoreOp::Put);
    let first = spawn_update(&facade, &created.id, "C1");
    hold.reached().await;

    let second = spawn_update(&facade, &created.id, "C2");
    tokio::task::yield_now().await;
    // The second save is queued behind the held first one
    assert_eq!(store.calls(StoreOp::Put), 2);

    hold.release();
    assert_eq!(first.await.unwrap().unwrap().content, "C1");
    assert_eq!(second.await.unwrap().unwrap().content, "C2");

    assert_eq!(store.get(NS, &created.id).unwrap().content, "C2");
    assert_eq!(facade.get_workflow(&created.id).unwrap().content, "C2");
    assert_eq!(store.calls(StoreOp::Put), 3);
}

#[tokio::test]
async fn test_unserialized_writes_last_completed_wins() {
    let (store, facade, created) = setup(false).await;

    let mut hold = store.hold_next(StoreOp::Put);
    let first = spawn_update(&facade, &created.id, "C1");
    hold.reached().await;

    // Not queued: the second save completes while the first is still held
    let second = spawn_update(&facade, &created.id, "C2");
    assert_eq!(second.await.unwrap().unwrap().content, "C2");
    assert_eq!(store.get(NS, &created.id).unwrap().content, "C2");

    hold.release();
    first.await.unwrap().unwrap();

    // The stale write completed last and is what the store keeps
    assert_eq!(store.get(NS, &created.id).unwrap().content, "C1");
    assert_eq!(facade.get_workflow(&created.id).unwrap().content, "C2");

    // A reload adopts the durable value
    facade.refresh().await.unwrap();
    assert_eq!(facade.get_workflow(&created.id).unwrap().content, "C1");
}

#[tokio::test]
async fn test_updates_to_different_ids_do_not_wait_on_each_other() {
    let (store, facade, a) = setup(true).await;
    let b = facade.create(NewWorkflow::new("B", "b")).await.unwrap();

    let mut hold = store.hold_next(StoreOp::Put);
    let held = spawn_update(&facade, &a.id, "A1");
    hold.reached().await;

    let updated = facade
        .update(WorkflowPatch::new(&b.id).content("b1"))
        .await
        .unwrap();
    assert_eq!(store.get(NS, &b.id), Some(updated));

    hold.release();
    held.await.unwrap().unwrap();
    assert_eq!(store.get(NS, &a.id).unwrap().content, "A1");
}

#[tokio::test]
async fn test_create_during_refresh_is_replaced_until_next_reload() {
    let store = Arc::new(MemoryStore::new());
    let facade = WorkflowFacade::new(WorkflowCollection::new(NS, store.clone()));

    let mut hold = store.hold_next(StoreOp::Load);
    let refresh = tokio::spawn({
        let facade = facade.clone();
        async move { facade.refresh().await }
    });
    hold.reached().await;

    let created = facade.create(NewWorkflow::new("T", "C")).await.unwrap();
    assert_eq!(facade.get_workflows().len(), 1);

    hold.release();
    assert_eq!(refresh.await.unwrap().unwrap(), 0);

    // The reload landed after the create and dropped it from memory only
    assert!(matches!(
        facade.get_workflow(&created.id),
        Err(WorkflowError::NotFound(_))
    ));
    assert!(store.contains(NS, &created.id));

    facade.refresh().await.unwrap();
    assert_eq!(facade.get_workflow(&created.id).unwrap(), created);
}

#[tokio::test]
async fn test_remove_waits_for_pending_save_of_same_id() {
    let (store, facade, created) = setup(true).await;

    let mut hold = store.hold_next(StoreOp::Put);
    let update = spawn_update(&facade, &created.id, "C1");
    hold.reached().await;

    let remove = tokio::spawn({
        let facade = facade.clone();
        let id = created.id.clone();
        async move { facade.remove(&id).await }
    });
    tokio::task::yield_now().await;
    assert_eq!(store.calls(StoreOp::Delete), 0);

    hold.release();
    update.await.unwrap().unwrap();
    remove.await.unwrap().unwrap();

    // The delete ran after the save, so nothing is resurrected
    assert!(!store.contains(NS, &created.id));
    assert!(facade.get_workflows().is_empty());
}

#[tokio::test]
async fn test_update_during_remove_is_not_found_and_stays_deleted() {
    let (store, facade, created) = setup(true).await;

    let mut hold = store.hold_next(StoreOp::Delete);
    let remove = tokio::spawn({
        let facade = facade.clone();
        let id = created.id.clone();
        async move { facade.remove(&id).await }
    });
    hold.reached().await;

    let update = spawn_update(&facade, &created.id, "C1");
    hold.release();

    assert_eq!(remove.await.unwrap().unwrap(), created);
    assert!(matches!(
        update.await.unwrap(),
        Err(WorkflowError::NotFound(id)) if id == created.id
    ));

    assert!(!store.contains(NS, &created.id));
    assert_eq!(store.calls(StoreOp::Put), 1);
    facade.refresh().await.unwrap();
    assert!(facade.get_workflows().is_empty());
}

#[tokio::test]
async fn test_remove_behind_queued_saves_stays_deleted() {
    let (store, facade, created) = setup(true).await;

    // An earlier save holds the lane so the delete and the later save queue behind it
    let mut hold = store.hold_next(StoreOp::Put);
    let first = spawn_update(&facade, &created.id, "C1");
    hold.reached().await;

    let second = spawn_update(&facade, &created.id, "C2");
    tokio::task::yield_now().await;
    let remove = tokio::spawn({
        let facade = facade.clone();
        let id = created.id.clone();
        async move { facade.remove(&id).await }
    });
    tokio::task::yield_now().await;

    hold.release();
    first.await.unwrap().unwrap();
    remove.await.unwrap().unwrap();
    let _ = second.await.unwrap();

    // However the second save was ordered against the delete, the delete sticks
    assert!(!store.contains(NS, &created.id));
    facade.refresh().await.unwrap();
    assert!(facade.get_workflows().is_empty());
}

#[tokio::test]
async fn test_abandoned_update_still_persists_what_memory_shows() {
    let (store, facade, created) = setup(true).await;

    let mut hold = store.hold_next(StoreOp::Put);
    let abandoned = tokio::time::timeout(
        Duration::from_millis(20),
        facade.update(WorkflowPatch::new(&created.id).content("C1")),
    )
    .await;
    assert!(abandoned.is_err());
    hold.reached().await;
    assert_eq!(facade.get_workflow(&created.id).unwrap().content, "C1");

    hold.release();
    tokio::time::timeout(Duration::from_secs(1), async {
        while store.get(NS, &created.id).map(|r| r.content) != Some("C1".to_string()) {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();

    assert_eq!(store.get(NS, &created.id), facade.get_workflow(&created.id).ok());
}

#[tokio::test]
async fn test_abandoned_create_that_fails_is_still_rolled_back() {
    let store = Arc::new(MemoryStore::new());
    let facade = WorkflowFacade::new(WorkflowCollection::new(NS, store.clone()));

    store.fail_next(StoreOp::Put, StorageError::QuotaExceeded);
    let mut hold = store.hold_next(StoreOp::Put);
    let abandoned = tokio::time::timeout(
        Duration::from_millis(20),
        facade.create(NewWorkflow::new("T", "C")),
    )
    .await;
    assert!(abandoned.is_err());
    hold.reached().await;
    assert_eq!(facade.get_workflows().len(), 1);

    hold.release();
    tokio::time::timeout(Duration::from_secs(1), async {
        while !facade.get_workflows().is_empty() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();

    assert!(store.records(NS).is_empty());
}
