use super::{parse_step_id, parse_workflow_id, ApiError, ApiResult};
use crate::config::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use stepwise_core::{
    Command, CommandArgs, CommandId, CommandKind, Step, StepId, Tab, TabId, Workflow,
    WorkflowId,
};

// ============================================================================
// Workflows
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateWorkflowRequest {
    pub name: String,
    #[serde(default)]
    pub tabs: Vec<TabRequest>,
}

#[derive(Debug, Deserialize)]
pub struct TabRequest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub steps: Vec<StepRequest>,
}

#[derive(Debug, Deserialize)]
pub struct StepRequest {
    pub module_id_name: String,
    #[serde(default)]
    pub notifications: bool,
    #[serde(default = "default_consumes_input")]
    pub consumes_input: bool,
}

fn default_consumes_input() -> bool {
    true
}

/// Assemble and persist a new workflow
pub async fn create_workflow(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateWorkflowRequest>,
) -> ApiResult<(StatusCode, Json<Workflow>)> {
    if req.tabs.is_empty() {
        return Err(ApiError::bad_request("A workflow needs at least one tab"));
    }

    let mut workflow = Workflow::new(req.name);
    for tab in req.tabs {
        let tab_id = TabId::new(tab.id);
        if workflow.tab(&tab_id).is_some() {
            return Err(ApiError::bad_request(format!("Duplicate tab id: {}", tab_id)));
        }
        workflow.add_tab(Tab::new(tab_id.clone(), tab.name));
        for step in tab.steps {
            workflow.add_step(
                Step::new(tab_id.clone(), step.module_id_name)
                    .with_notifications(step.notifications)
                    .with_consumes_input(step.consumes_input),
            );
        }
    }

    let workflow = state.manager.create_workflow(workflow).await?;
    Ok((StatusCode::CREATED, Json(workflow)))
}

#[derive(Debug, Serialize)]
pub struct ListWorkflowsResponse {
    pub workflows: Vec<WorkflowId>,
}

pub async fn list_workflows(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ListWorkflowsResponse>> {
    let workflows = state.manager.list_workflows().await?;
    Ok(Json(ListWorkflowsResponse { workflows }))
}

/// Open a workflow for viewing
pub async fn get_workflow(
    State(state): State<Arc<AppState>>,
    Path(workflow_id): Path<String>,
) -> ApiResult<Json<Workflow>> {
    let workflow_id = parse_workflow_id(&workflow_id)?;
    let workflow = state.manager.open_for_viewer(workflow_id).await?;
    Ok(Json(workflow))
}

// ============================================================================
// Commands
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    /// `None` when nothing was applied
    pub command: Option<Command>,
}

#[derive(Debug, Serialize)]
pub struct CommandSummary {
    pub id: CommandId,
    pub kind: CommandKind,
    pub description: String,
    pub affects_outputs: bool,
    /// Whether the command is applied, as opposed to undone
    pub applied: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ListCommandsResponse {
    pub current_command_id: Option<CommandId>,
    pub commands: Vec<CommandSummary>,
}

/// Create a command and apply it
pub async fn create_command(
    State(state): State<Arc<AppState>>,
    Path(workflow_id): Path<String>,
    Json(args): Json<CommandArgs>,
) -> ApiResult<Json<CommandResponse>> {
    let workflow_id = parse_workflow_id(&workflow_id)?;
    let command = state.manager.create(workflow_id, args).await?;
    Ok(Json(CommandResponse { command }))
}

pub async fn undo(
    State(state): State<Arc<AppState>>,
    Path(workflow_id): Path<String>,
) -> ApiResult<Json<CommandResponse>> {
    let workflow_id = parse_workflow_id(&workflow_id)?;
    let command = state.manager.undo(workflow_id).await?;
    Ok(Json(CommandResponse { command }))
}

pub async fn redo(
    State(state): State<Arc<AppState>>,
    Path(workflow_id): Path<String>,
) -> ApiResult<Json<CommandResponse>> {
    let workflow_id = parse_workflow_id(&workflow_id)?;
    let command = state.manager.redo(workflow_id).await?;
    Ok(Json(CommandResponse { command }))
}

/// Undo history of a workflow, oldest first
pub async fn list_commands(
    State(state): State<Arc<AppState>>,
    Path(workflow_id): Path<String>,
) -> ApiResult<Json<ListCommandsResponse>> {
    let workflow_id = parse_workflow_id(&workflow_id)?;
    let current_command_id = state.manager.snapshot(workflow_id).await?.current_command_id;
    let commands = state.manager.commands(workflow_id).await?;

    let commands = commands
        .iter()
        .map(|command| CommandSummary {
            id: command.id,
            kind: command.kind,
            description: command.describe(),
            affects_outputs: command.affects_outputs(),
            applied: current_command_id.is_some_and(|current| command.id <= current),
            created_at: command.created_at,
        })
        .collect();

    Ok(Json(ListCommandsResponse {
        current_command_id,
        commands,
    }))
}

// ============================================================================
// Render results
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CachedResultRequest {
    pub command_id: CommandId,
}

#[derive(Debug, Serialize)]
pub struct CachedResultResponse {
    pub step_id: StepId,
    pub recorded: bool,
}

/// A renderer cached a step's output
pub async fn record_cached_result(
    State(state): State<Arc<AppState>>,
    Path((workflow_id, step_id)): Path<(String, String)>,
    Json(req): Json<CachedResultRequest>,
) -> ApiResult<Json<CachedResultResponse>> {
    let workflow_id = parse_workflow_id(&workflow_id)?;
    let step_id = parse_step_id(&step_id)?;
    let recorded = state
        .manager
        .record_cached_result(workflow_id, step_id, req.command_id)
        .await?;
    Ok(Json(CachedResultResponse { step_id, recorded }))
}

#[cfg(test)]
mod tests {
    use crate::api::create_router;
    use crate::config::{AppState, ServerConfig};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn router(temp_dir: &TempDir) -> Router {
        let config = ServerConfig::load(
            &temp_dir.path().join("stepwise.toml"),
            temp_dir.path().to_path_buf(),
        )
        .unwrap();
        create_router(AppState::new(&config).unwrap())
    }

    async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn create_workflow(router: &Router) -> Value {
        let (status, workflow) = call(
            router,
            "POST",
            "/api/workflows",
            Some(json!({
                "name": "Prices",
                "tabs": [{
                    "id": "tab-1",
                    "name": "Tab 1",
                    "steps": [
                        {"module_id_name": "loadurl"},
                        {"module_id_name": "filter", "notifications": true},
                    ],
                }],
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        workflow
    }

    #[tokio::test]
    async fn test_command_lifecycle() {
        let temp_dir = TempDir::new().unwrap();
        let router = router(&temp_dir);
        let workflow = create_workflow(&router).await;
        let id = workflow["id"].as_str().unwrap();

        let (status, body) = call(
            &router,
            "POST",
            &format!("/api/workflows/{}/commands", id),
            Some(json!({"type": "change_workflow_title", "title": "Renamed"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["command"]["id"], 1);
        assert_eq!(body["command"]["kind"], "change_workflow_title");

        let (_, body) = call(&router, "POST", &format!("/api/workflows/{}/undo", id), None).await;
        assert_eq!(body["command"]["id"], 1);

        let (_, body) = call(&router, "POST", &format!("/api/workflows/{}/undo", id), None).await;
        assert!(body["command"].is_null());

        let (_, workflow) = call(&router, "GET", &format!("/api/workflows/{}", id), None).await;
        assert_eq!(workflow["name"], "Prices");

        let (_, body) = call(&router, "POST", &format!("/api/workflows/{}/redo", id), None).await;
        assert_eq!(body["command"]["id"], 1);

        let (_, history) =
            call(&router, "GET", &format!("/api/workflows/{}/commands", id), None).await;
        assert_eq!(history["current_command_id"], 1);
        assert_eq!(history["commands"][0]["applied"], true);
        assert_eq!(
            history["commands"][0]["description"],
            "Change workflow name to Renamed"
        );
    }

    #[tokio::test]
    async fn test_stale_target_returns_no_command() {
        let temp_dir = TempDir::new().unwrap();
        let router = router(&temp_dir);
        let workflow = create_workflow(&router).await;
        let id = workflow["id"].as_str().unwrap();

        let (status, body) = call(
            &router,
            "POST",
            &format!("/api/workflows/{}/commands", id),
            Some(json!({"type": "delete_step", "step_id": uuid::Uuid::new_v4()})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["command"].is_null());
    }

    #[tokio::test]
    async fn test_record_cached_result() {
        let temp_dir = TempDir::new().unwrap();
        let router = router(&temp_dir);
        let workflow = create_workflow(&router).await;
        let id = workflow["id"].as_str().unwrap();
        let step_id = workflow["tabs"][0]["step_ids"][0].as_str().unwrap();

        call(
            &router,
            "POST",
            &format!("/api/workflows/{}/commands", id),
            Some(json!({
                "type": "change_data_version",
                "step_id": step_id,
                "version": "2024-01-02T03:04:05Z",
            })),
        )
        .await;

        let (status, body) = call(
            &router,
            "POST",
            &format!("/api/workflows/{}/steps/{}/cached", id, step_id),
            Some(json!({"command_id": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["recorded"], true);
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let temp_dir = TempDir::new().unwrap();
        let router = router(&temp_dir);

        let (status, _) = call(&router, "GET", "/api/workflows/not-a-uuid", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(
            &router,
            "GET",
            &format!("/api/workflows/{}", uuid::Uuid::new_v4()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("not found"));

        let (status, _) = call(
            &router,
            "POST",
            "/api/workflows",
            Some(json!({"name": "Empty", "tabs": []})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_workflows() {
        let temp_dir = TempDir::new().unwrap();
        let router = router(&temp_dir);
        let workflow = create_workflow(&router).await;

        let (status, body) = call(&router, "GET", "/api/workflows", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["workflows"], json!([workflow["id"]]));
    }

    #[tokio::test]
    async fn test_health_check() {
        let temp_dir = TempDir::new().unwrap();
        let (status, body) = call(&router(&temp_dir), "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "stepwise");
    }
}
