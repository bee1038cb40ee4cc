use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use autopilot_core::workflow::WorkflowDefinition;

use crate::error::ServerError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_workflows))
        .route("/{id}", get(get_workflow))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WorkflowSummary<'a> {
    id: &'a str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    steps: Vec<&'a str>,
    branches: Vec<&'a str>,
}

impl<'a> From<&'a WorkflowDefinition> for WorkflowSummary<'a> {
    fn from(wf: &'a WorkflowDefinition) -> Self {
        let mut branches: Vec<&str> = wf.branches.keys().map(String::as_str).collect();
        branches.sort_unstable();
        Self {
            id: &wf.id,
            name: &wf.name,
            description: wf.description.as_deref(),
            steps: wf.step_order.iter().map(String::as_str).collect(),
            branches,
        }
    }
}

/// GET /api/workflows — List known workflows.
async fn list_workflows(State(state): State<AppState>) -> Json<serde_json::Value> {
    let workflows: Vec<WorkflowSummary<'_>> = state.workflows.iter().map(Into::into).collect();
    Json(serde_json::json!({ "workflows": workflows }))
}

/// GET /api/workflows/{id} — Full definition, for rendering the timeline.
async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WorkflowDefinition>, ServerError> {
    state
        .workflow(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("Workflow '{}' not found", id)))
}
