/// Steward workflows: workflow collection and persistence for the Steward
/// browser extension settings
///
/// Keeps an ordered, id-keyed in-memory collection of user workflows consistent
/// with a durable asynchronous store, and exposes it through a small facade and
/// a JSON API for the settings UI.

// Core configuration and setup
pub mod config;

// Workflow management layer - records, storage, collection, and facade
pub mod workflow;

// HTTP API layer - REST endpoints for workflow management
pub mod api;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use server::start_server;
pub use workflow::{
    NewWorkflow, WorkflowCollection, WorkflowError, WorkflowFacade, WorkflowPatch, WorkflowRecord,
    WorkflowStore,
};
