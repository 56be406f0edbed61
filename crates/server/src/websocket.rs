use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::{IntoResponse, Response},
};
use axum::body::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use stepwise_core::scheduling::SessionBroadcaster;
use stepwise_core::types::{CommandId, WorkflowId};
use tokio::sync::broadcast;

use crate::api::parse_workflow_id;
use crate::config::AppState;

/// Messages pushed to viewer sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// The workflow changed while nobody required its output. The session
    /// has queued the render by the time a client sees this.
    RenderIfListening {
        workflow_id: WorkflowId,
        command_id: CommandId,
    },
    /// Session attached to a workflow
    Subscribed { workflow_id: WorkflowId },
    Error { message: String },
}

/// Requests sent by viewer sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WsRequest {
    RequestRender { command_id: CommandId },
}

/// Fan-out of workflow events to the sessions viewing each workflow
pub struct SessionHub {
    channels: Mutex<HashMap<WorkflowId, broadcast::Sender<WsMessage>>>,
    capacity: usize,
}

impl SessionHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Attach a session to a workflow's channel
    pub fn subscribe(&self, workflow_id: WorkflowId) -> Option<broadcast::Receiver<WsMessage>> {
        let mut channels = match self.channels.lock() {
            Ok(channels) => channels,
            Err(e) => {
                tracing::error!("Session registry lock poisoned: {}", e);
                return None;
            }
        };
        let sender = channels
            .entry(workflow_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        Some(sender.subscribe())
    }

    /// Drop a workflow's channel once its last session has left
    pub fn release(&self, workflow_id: WorkflowId) {
        let Ok(mut channels) = self.channels.lock() else {
            return;
        };
        if channels
            .get(&workflow_id)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            channels.remove(&workflow_id);
        }
    }

    /// Number of sessions currently attached to a workflow
    pub fn session_count(&self, workflow_id: WorkflowId) -> usize {
        self.channels
            .lock()
            .ok()
            .and_then(|channels| channels.get(&workflow_id).map(|s| s.receiver_count()))
            .unwrap_or(0)
    }
}

impl SessionBroadcaster for SessionHub {
    fn notify_sessions_if_listening(&self, workflow_id: WorkflowId, command_id: CommandId) {
        let mut channels = match self.channels.lock() {
            Ok(channels) => channels,
            Err(e) => {
                tracing::error!("Session registry lock poisoned: {}", e);
                return;
            }
        };

        let Some(sender) = channels.get(&workflow_id) else {
            return;
        };
        let message = WsMessage::RenderIfListening {
            workflow_id,
            command_id,
        };
        if sender.send(message).is_err() {
            // Every session left
            channels.remove(&workflow_id);
        }
    }
}

/// WebSocket handler for a workflow's viewer session
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(workflow_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let workflow_id = match parse_workflow_id(&workflow_id) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, workflow_id))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, workflow_id: WorkflowId) {
    tracing::info!("WebSocket session opened for workflow {}", workflow_id);

    let Some(events) = state.sessions.subscribe(workflow_id) else {
        return;
    };
    run_session(socket, &state, workflow_id, events).await;

    state.sessions.release(workflow_id);
    tracing::info!("WebSocket session closed for workflow {}", workflow_id);
}

async fn run_session(
    mut socket: WebSocket,
    state: &AppState,
    workflow_id: WorkflowId,
    mut events: broadcast::Receiver<WsMessage>,
) {
    if send(&mut socket, &WsMessage::Subscribed { workflow_id }).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = match serde_json::from_str::<WsRequest>(text.as_str()) {
                            Ok(WsRequest::RequestRender { command_id }) => {
                                queue_render(state, workflow_id, command_id).await
                            }
                            Err(e) => Some(WsMessage::Error {
                                message: format!("Invalid request: {}", e),
                            }),
                        };
                        if let Some(reply) = reply {
                            if send(&mut socket, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(_))) => {
                        if socket.send(Message::Pong(Bytes::new())).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
            event = events.recv() => {
                match event {
                    Ok(message) => {
                        if let Some(reply) = on_session_event(state, workflow_id, &message).await {
                            if send(&mut socket, &reply).await.is_err() {
                                break;
                            }
                        }
                        if send(&mut socket, &message).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            "Session for workflow {} lagged, skipped {} messages",
                            workflow_id,
                            skipped
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}

/// A listening session queues the render it is told about itself
async fn on_session_event(
    state: &AppState,
    workflow_id: WorkflowId,
    message: &WsMessage,
) -> Option<WsMessage> {
    match message {
        WsMessage::RenderIfListening { command_id, .. } => {
            queue_render(state, workflow_id, *command_id).await
        }
        _ => None,
    }
}

/// Returns the error to report back to the client, if any
async fn queue_render(
    state: &AppState,
    workflow_id: WorkflowId,
    command_id: CommandId,
) -> Option<WsMessage> {
    match state.manager.request_render(workflow_id, command_id).await {
        Ok(_) => None,
        Err(e) => {
            tracing::warn!("Render request for workflow {} failed: {}", workflow_id, e);
            Some(WsMessage::Error {
                message: e.to_string(),
            })
        }
    }
}

async fn send(socket: &mut WebSocket, message: &WsMessage) -> Result<(), ()> {
    let msg_json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!("Failed to serialize WebSocket message: {}", e);
            return Ok(());
        }
    };
    socket.send(Message::Text(msg_json.into())).await.map_err(|_| ())
}
