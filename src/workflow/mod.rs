/// Workflow Management Layer
///
/// Workflow records, their durable storage, the in-memory collection that
/// mirrors it, and the facade consumers call:
/// - Type definitions (WorkflowRecord, NewWorkflow, WorkflowPatch)
/// - Store adapter trait with SQLite and in-memory implementations
/// - ArcSwap-backed collection with a per-id persistence queue
/// - Facade exposing create/update/remove/refresh/get/list/init

// Error taxonomy shared by every layer below
pub mod error;

// Core workflow record definitions
pub mod types;

// Durable store adapter (SQLite + in-memory fake)
pub mod storage;

// Per-id ordering of persistence calls
pub mod queue;

// Ordered, id-keyed in-memory collection
pub mod collection;

// Validated operation surface
pub mod facade;

// Re-export commonly used types
pub use collection::WorkflowCollection;
pub use error::{StorageError, WorkflowError};
pub use facade::WorkflowFacade;
pub use storage::{MemoryStore, SqliteStore, WorkflowStore};
pub use types::{NewWorkflow, SetOptions, SetOutcome, WorkflowPatch, WorkflowRecord};
