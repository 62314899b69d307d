/// Workflow management REST API endpoints
///
/// Thin JSON surface over the workflow facade for the extension's settings UI.
/// Each route maps to one facade call; facade errors map to status codes.

use crate::workflow::{NewWorkflow, WorkflowError, WorkflowFacade, WorkflowPatch, WorkflowRecord};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};

/// Application state containing shared resources
#[derive(Debug, Clone)]
pub struct AppState {
    /// Workflow operations over the shared collection
    pub workflows: WorkflowFacade,
}

/// Facade error rendered as `{ "error": kind, "message": text }`
#[derive(Debug)]
pub struct ApiError(pub WorkflowError);

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            WorkflowError::Validation(_) => StatusCode::BAD_REQUEST,
            WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
            WorkflowError::Conflict(_) => StatusCode::CONFLICT,
            WorkflowError::Storage(e) => {
                tracing::error!("Workflow storage failure: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = json!({ "error": self.0.kind(), "message": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}

/// Create workflow management routes
pub fn create_workflow_routes() -> Router<AppState> {
    Router::new()
        .route("/api/workflows", post(create_workflow).get(list_workflows))
        .route("/api/workflows/refresh", post(refresh_workflows))
        .route(
            "/api/workflows/{id}",
            get(get_workflow).put(update_workflow).delete(delete_workflow),
        )
}

/// Create a new workflow
///
/// POST /api/workflows
/// Body: { "title": "...", "content": "...", ...extra }
async fn create_workflow(
    State(state): State<AppState>,
    Json(info): Json<NewWorkflow>,
) -> Result<(StatusCode, Json<WorkflowRecord>), ApiError> {
    let record = state.workflows.create(info).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// List all workflows, loading them on first use
///
/// GET /api/workflows
/// Returns: { "workflows": [{ "id": "...", "title": "...", "content": "..." }] }
async fn list_workflows(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.workflows.ensure_loaded().await?;
    Ok(Json(json!({ "workflows": state.workflows.get_workflows() })))
}

/// GET /api/workflows/{id}
async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WorkflowRecord>, ApiError> {
    Ok(Json(state.workflows.get_workflow(&id)?))
}

/// Patch an existing workflow
///
/// PUT /api/workflows/{id}
/// Body: any subset of { "title", "content", ...extra }; the path id wins
async fn update_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut patch): Json<WorkflowPatch>,
) -> Result<Json<WorkflowRecord>, ApiError> {
    patch.id = id;
    Ok(Json(state.workflows.update(patch).await?))
}

/// DELETE /api/workflows/{id}
///
/// Returns the removed workflow
async fn delete_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WorkflowRecord>, ApiError> {
    Ok(Json(state.workflows.remove(&id).await?))
}

/// Reload every workflow from storage
///
/// POST /api/workflows/refresh
/// Returns: { "loaded": 3 }
async fn refresh_workflows(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let loaded = state.workflows.refresh().await?;
    Ok(Json(json!({ "loaded": loaded })))
}
