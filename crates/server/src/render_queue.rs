use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use stepwise_core::scheduling::RecomputeRequester;
use stepwise_core::types::{CommandId, WorkflowId};
use tokio::sync::mpsc;

/// A request for the pipeline executor to bring a workflow up to date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderRequest {
    pub workflow_id: WorkflowId,
    pub command_id: CommandId,
}

/// Bounded hand-off to the external pipeline executor
#[derive(Clone)]
pub struct RenderQueue {
    tx: mpsc::Sender<RenderRequest>,
}

impl RenderQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<RenderRequest>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Create a queue whose requests are drained by a background task. The
    /// executor lives outside this service, so the task only records them.
    pub fn spawn(capacity: usize) -> Self {
        let (queue, mut rx) = Self::new(capacity);
        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                tracing::info!(
                    "Render requested: workflow_id={}, command_id={}",
                    request.workflow_id,
                    request.command_id
                );
            }
            tracing::debug!("Render queue closed");
        });
        queue
    }
}

#[async_trait::async_trait]
impl RecomputeRequester for RenderQueue {
    async fn request_recompute(&self, workflow_id: WorkflowId, command_id: CommandId) -> Result<()> {
        self.tx
            .send(RenderRequest {
                workflow_id,
                command_id,
            })
            .await
            .context("Render queue is closed")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_requests_reach_the_queue() {
        let (queue, mut rx) = RenderQueue::new(4);
        let workflow_id = WorkflowId::new();

        queue
            .request_recompute(workflow_id, CommandId(2))
            .await
            .unwrap();

        assert_eq!(
            rx.recv().await,
            Some(RenderRequest {
                workflow_id,
                command_id: CommandId(2),
            })
        );
    }

    #[tokio::test]
    async fn test_closed_queue_is_an_error() {
        let (queue, rx) = RenderQueue::new(1);
        drop(rx);
        assert!(queue
            .request_recompute(WorkflowId::new(), CommandId(1))
            .await
            .is_err());
    }
}
