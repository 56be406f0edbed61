//! Render scheduling: after a commit, either ask for a recompute right away
//! or leave it to whoever is watching the workflow.

use crate::types::{CommandId, Workflow, WorkflowId};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Tells whether anyone depends on a workflow's output even when nobody is
/// looking at it.
pub trait SubscriberRegistry: Send + Sync {
    fn has_interested_subscribers(&self, workflow: &Workflow) -> bool;
}

/// Default registry: a workflow is interesting when any live step is set to
/// notify on completion.
#[derive(Debug, Default, Clone, Copy)]
pub struct StepNotifications;

impl SubscriberRegistry for StepNotifications {
    fn has_interested_subscribers(&self, workflow: &Workflow) -> bool {
        workflow.live_steps().any(|step| step.notifications)
    }
}

/// Realtime transport to connected viewer sessions. Fire-and-forget: must
/// not block.
pub trait SessionBroadcaster: Send + Sync {
    fn notify_sessions_if_listening(&self, workflow_id: WorkflowId, command_id: CommandId);
}

/// Pipeline executor entry point.
///
/// Requesting a recompute for a workflow already at `command_id` must be a
/// no-op; [`CoalescingRecompute`] adds that guarantee to any requester.
#[async_trait::async_trait]
pub trait RecomputeRequester: Send + Sync {
    async fn request_recompute(&self, workflow_id: WorkflowId, command_id: CommandId) -> Result<()>;
}

#[async_trait::async_trait]
impl<R: RecomputeRequester + ?Sized> RecomputeRequester for Arc<R> {
    async fn request_recompute(&self, workflow_id: WorkflowId, command_id: CommandId) -> Result<()> {
        (**self).request_recompute(workflow_id, command_id).await
    }
}

/// Drops a request identical to the last one forwarded for the same
/// workflow.
pub struct CoalescingRecompute<R> {
    inner: R,
    last_requested: Mutex<HashMap<WorkflowId, CommandId>>,
}

impl<R: RecomputeRequester> CoalescingRecompute<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            last_requested: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait::async_trait]
impl<R: RecomputeRequester> RecomputeRequester for CoalescingRecompute<R> {
    async fn request_recompute(&self, workflow_id: WorkflowId, command_id: CommandId) -> Result<()> {
        {
            let mut last_requested = self.last_requested.lock().await;
            if last_requested.get(&workflow_id) == Some(&command_id) {
                tracing::debug!(
                    "Recompute of workflow {} at command {} already requested",
                    workflow_id,
                    command_id
                );
                return Ok(());
            }
            last_requested.insert(workflow_id, command_id);
        }

        // The map is not locked here: a slow executor must not hold up
        // other workflows.
        if let Err(e) = self.inner.request_recompute(workflow_id, command_id).await {
            let mut last_requested = self.last_requested.lock().await;
            if last_requested.get(&workflow_id) == Some(&command_id) {
                last_requested.remove(&workflow_id);
            }
            return Err(e);
        }
        Ok(())
    }
}

/// Outcome of the scheduling decision for one commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderDecision {
    /// Someone relies on the output: recompute now
    Eager,
    /// Ask connected sessions to request a recompute if they are listening
    Lazy,
    /// The commit changed no step output
    Skip,
}

/// Decides, after each commit, how recomputation gets requested.
///
/// [`decide`](Self::decide) runs under the workflow's lock because it reads
/// the workflow; [`dispatch`](Self::dispatch) runs after the lock is
/// released.
#[derive(Clone)]
pub struct RenderScheduler {
    subscribers: Arc<dyn SubscriberRegistry>,
    broadcaster: Arc<dyn SessionBroadcaster>,
    recompute: Arc<dyn RecomputeRequester>,
}

impl RenderScheduler {
    pub fn new(
        subscribers: Arc<dyn SubscriberRegistry>,
        broadcaster: Arc<dyn SessionBroadcaster>,
        recompute: Arc<dyn RecomputeRequester>,
    ) -> Self {
        Self {
            subscribers,
            broadcaster,
            recompute,
        }
    }

    pub fn decide(&self, workflow: &Workflow, affects_outputs: bool) -> RenderDecision {
        if !affects_outputs {
            RenderDecision::Skip
        } else if self.subscribers.has_interested_subscribers(workflow) {
            RenderDecision::Eager
        } else {
            RenderDecision::Lazy
        }
    }

    /// Act on a decision. Recompute failures are logged, never returned: the
    /// command has already been committed.
    pub async fn dispatch(
        &self,
        decision: RenderDecision,
        workflow_id: WorkflowId,
        command_id: CommandId,
    ) {
        match decision {
            RenderDecision::Eager => {
                tracing::debug!(
                    "Requesting recompute of workflow {} at command {}",
                    workflow_id,
                    command_id
                );
                self.request(workflow_id, command_id).await;
            }
            RenderDecision::Lazy => {
                tracing::debug!(
                    "Asking sessions of workflow {} to render command {} if listening",
                    workflow_id,
                    command_id
                );
                self.broadcaster
                    .notify_sessions_if_listening(workflow_id, command_id);
            }
            RenderDecision::Skip => {}
        }
    }

    /// Request a recompute directly, e.g. when a viewer opens a stale
    /// workflow.
    pub async fn request(&self, workflow_id: WorkflowId, command_id: CommandId) {
        if let Err(e) = self.recompute.request_recompute(workflow_id, command_id).await {
            tracing::error!(
                "Failed to request recompute of workflow {} at command {}: {}",
                workflow_id,
                command_id,
                e
            );
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{RecordingBroadcaster, RecordingRecompute};
    use super::*;
    use crate::types::{Step, Tab, TabId};
    use std::sync::Mutex as StdMutex;

    fn workflow(notifications: bool) -> Workflow {
        let tab_id = TabId::new("tab-1");
        let mut workflow = Workflow::new("Test");
        workflow.add_tab(Tab::new(tab_id.clone(), "Tab 1"));
        workflow.add_step(Step::new(tab_id.clone(), "loadurl"));
        workflow.add_step(Step::new(tab_id, "filter").with_notifications(notifications));
        workflow.current_command_id = Some(CommandId(1));
        workflow
    }

    fn scheduler() -> (RenderScheduler, Arc<RecordingBroadcaster>, Arc<RecordingRecompute>) {
        let broadcaster = Arc::new(RecordingBroadcaster::default());
        let recompute = Arc::new(RecordingRecompute::default());
        let scheduler = RenderScheduler::new(
            Arc::new(StepNotifications),
            broadcaster.clone(),
            recompute.clone(),
        );
        (scheduler, broadcaster, recompute)
    }

    #[test]
    fn test_decide() {
        let (scheduler, _, _) = scheduler();
        assert_eq!(scheduler.decide(&workflow(true), true), RenderDecision::Eager);
        assert_eq!(scheduler.decide(&workflow(false), true), RenderDecision::Lazy);
        assert_eq!(scheduler.decide(&workflow(true), false), RenderDecision::Skip);

        // Undoing back to the start still changes outputs
        let mut pristine = workflow(true);
        pristine.current_command_id = None;
        assert_eq!(scheduler.decide(&pristine, true), RenderDecision::Eager);
    }

    #[test]
    fn test_deleted_notifying_step_is_not_interested() {
        let mut workflow = workflow(true);
        for step in workflow.steps.iter().map(|s| s.id).collect::<Vec<_>>() {
            workflow.steps.get_mut(&step).unwrap().is_deleted = true;
        }
        assert!(!StepNotifications.has_interested_subscribers(&workflow));
    }

    #[tokio::test]
    async fn test_dispatch() {
        let (scheduler, broadcaster, recompute) = scheduler();
        let id = WorkflowId::new();

        scheduler.dispatch(RenderDecision::Eager, id, CommandId(3)).await;
        scheduler.dispatch(RenderDecision::Lazy, id, CommandId(4)).await;
        scheduler.dispatch(RenderDecision::Skip, id, CommandId(5)).await;

        assert_eq!(*recompute.calls.lock().unwrap(), vec![(id, CommandId(3))]);
        assert_eq!(*broadcaster.calls.lock().unwrap(), vec![(id, CommandId(4))]);
    }

    #[tokio::test]
    async fn test_coalescing_recompute_is_idempotent() {
        let counter = Arc::new(RecordingRecompute::default());
        let coalescing = CoalescingRecompute::new(counter.clone());
        let id = WorkflowId::new();

        coalescing.request_recompute(id, CommandId(7)).await.unwrap();
        coalescing.request_recompute(id, CommandId(7)).await.unwrap();
        assert_eq!(counter.calls.lock().unwrap().len(), 1);

        // After an undo the workflow moves back to an older command
        coalescing.request_recompute(id, CommandId(6)).await.unwrap();
        coalescing.request_recompute(WorkflowId::new(), CommandId(7)).await.unwrap();
        assert_eq!(counter.calls.lock().unwrap().len(), 3);
    }

    /// Never completes a request for one workflow
    struct StalledOn {
        workflow_id: WorkflowId,
        others: RecordingRecompute,
    }

    #[async_trait::async_trait]
    impl RecomputeRequester for StalledOn {
        async fn request_recompute(
            &self,
            workflow_id: WorkflowId,
            command_id: CommandId,
        ) -> Result<()> {
            if workflow_id == self.workflow_id {
                std::future::pending::<()>().await;
            }
            self.others.request_recompute(workflow_id, command_id).await
        }
    }

    #[tokio::test]
    async fn test_coalescing_does_not_block_other_workflows() {
        let stalled = WorkflowId::new();
        let coalescing = Arc::new(CoalescingRecompute::new(StalledOn {
            workflow_id: stalled,
            others: RecordingRecompute::default(),
        }));

        let pending = coalescing.clone();
        tokio::spawn(async move {
            let _ = pending.request_recompute(stalled, CommandId(1)).await;
        });
        tokio::task::yield_now().await;

        let other = WorkflowId::new();
        let result = tokio::time::timeout(
            std::time::Duration::from_millis(500),
            coalescing.request_recompute(other, CommandId(1)),
        )
        .await;
        assert!(matches!(result, Ok(Ok(()))));
        assert_eq!(
            *coalescing.inner.others.calls.lock().unwrap(),
            vec![(other, CommandId(1))]
        );
    }

    #[derive(Default)]
    struct FailingRecompute {
        attempts: StdMutex<usize>,
    }

    #[async_trait::async_trait]
    impl RecomputeRequester for FailingRecompute {
        async fn request_recompute(&self, _: WorkflowId, _: CommandId) -> Result<()> {
            *self.attempts.lock().unwrap() += 1;
            Err(anyhow::anyhow!("executor unavailable"))
        }
    }

    #[tokio::test]
    async fn test_failed_request_can_be_retried() {
        let coalescing = CoalescingRecompute::new(FailingRecompute::default());
        let id = WorkflowId::new();

        assert!(coalescing.request_recompute(id, CommandId(2)).await.is_err());
        assert!(coalescing.request_recompute(id, CommandId(2)).await.is_err());
        assert_eq!(*coalescing.inner.attempts.lock().unwrap(), 2);
    }
}
