/// HTTP API Layer
///
/// JSON endpoints the extension's settings page uses to manage workflows.

// Workflow management endpoints (POST/GET/PUT/DELETE)
pub mod workflows;

// Re-export router builder
pub use workflows::{create_workflow_routes, AppState};
