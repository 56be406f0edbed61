use crate::catalog::CommandArgs;
use crate::command::Command;
use crate::error::{CommandError, CommandResult};
use crate::log::WorkflowLog;
use crate::scheduling::{RenderDecision, RenderScheduler};
use crate::storage::CommandStore;
use crate::types::{CommandId, StepId, Workflow, WorkflowId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Entry point for everything that changes a workflow.
///
/// Each workflow's log sits behind its own mutex, held only while a command
/// is created, undone or redone. Render scheduling happens after the lock is
/// released. Different workflows never contend.
pub struct WorkflowManager {
    store: Arc<dyn CommandStore>,
    scheduler: RenderScheduler,
    logs: RwLock<HashMap<WorkflowId, Arc<Mutex<WorkflowLog>>>>,
}

/// What the caller needs to schedule rendering once the lock is gone
struct Committed {
    command: Command,
    decision: RenderDecision,
    render_at: CommandId,
}

impl WorkflowManager {
    pub fn new(store: Arc<dyn CommandStore>, scheduler: RenderScheduler) -> Self {
        Self {
            store,
            scheduler,
            logs: RwLock::new(HashMap::new()),
        }
    }

    /// Persist a newly assembled workflow and start its log
    pub async fn create_workflow(&self, workflow: Workflow) -> CommandResult<Workflow> {
        let log = WorkflowLog::new(workflow)?;
        self.store.save_workflow(log.workflow())?;
        let snapshot = log.workflow().clone();

        tracing::info!("Created workflow {} ({})", snapshot.id, snapshot.name);
        self.logs
            .write()
            .await
            .insert(snapshot.id, Arc::new(Mutex::new(log)));
        Ok(snapshot)
    }

    /// Create a command and apply it.
    ///
    /// Returns `Ok(None)` when the command targets something that no longer
    /// exists: that is a race with another edit, not a failure.
    pub async fn create(
        &self,
        workflow_id: WorkflowId,
        args: CommandArgs,
    ) -> CommandResult<Option<Command>> {
        let log = self.log_for(workflow_id).await?;
        let committed = {
            let mut log = log.lock().await;
            match log.append_and_apply(self.store.as_ref(), args) {
                Ok(command) => self.committed(&log, command),
                Err(CommandError::InvalidOperation(reason)) => {
                    tracing::warn!(
                        "Ignoring command on workflow {}: {}",
                        workflow_id,
                        reason
                    );
                    return Ok(None);
                }
                Err(e) => return Err(self.report(workflow_id, "create", e)),
            }
        };
        Ok(Some(self.schedule(workflow_id, committed).await))
    }

    /// Undo the current command. `Ok(None)` when there is nothing to undo.
    pub async fn undo(&self, workflow_id: WorkflowId) -> CommandResult<Option<Command>> {
        let log = self.log_for(workflow_id).await?;
        let committed = {
            let mut log = log.lock().await;
            match log.undo(self.store.as_ref()) {
                Ok(Some(command)) => self.committed(&log, command),
                Ok(None) => return Ok(None),
                Err(e) => return Err(self.report(workflow_id, "undo", e)),
            }
        };
        Ok(Some(self.schedule(workflow_id, committed).await))
    }

    /// Redo the next command. `Ok(None)` when already at the tip.
    pub async fn redo(&self, workflow_id: WorkflowId) -> CommandResult<Option<Command>> {
        let log = self.log_for(workflow_id).await?;
        let committed = {
            let mut log = log.lock().await;
            match log.redo(self.store.as_ref()) {
                Ok(Some(command)) => self.committed(&log, command),
                Ok(None) => return Ok(None),
                Err(e) => return Err(self.report(workflow_id, "redo", e)),
            }
        };
        Ok(Some(self.schedule(workflow_id, committed).await))
    }

    /// Current state of a workflow
    pub async fn snapshot(&self, workflow_id: WorkflowId) -> CommandResult<Workflow> {
        let log = self.log_for(workflow_id).await?;
        let log = log.lock().await;
        Ok(log.workflow().clone())
    }

    /// Ids of every stored workflow, loaded or not
    pub async fn list_workflows(&self) -> CommandResult<Vec<WorkflowId>> {
        Ok(self.store.list_workflows()?)
    }

    /// Every command in the workflow's chain, undone ones included
    pub async fn commands(&self, workflow_id: WorkflowId) -> CommandResult<Vec<Command>> {
        let log = self.log_for(workflow_id).await?;
        let log = log.lock().await;
        Ok(log.commands().to_vec())
    }

    /// A renderer finished caching a step's output as of `command_id`.
    /// Returns whether the result was recorded.
    pub async fn record_cached_result(
        &self,
        workflow_id: WorkflowId,
        step_id: StepId,
        command_id: CommandId,
    ) -> CommandResult<bool> {
        let log = self.log_for(workflow_id).await?;
        let mut log = log.lock().await;
        log.record_cached_result(self.store.as_ref(), &step_id, command_id)
    }

    /// A viewer opened the workflow. Any work deferred while nobody was
    /// watching gets requested now.
    pub async fn open_for_viewer(&self, workflow_id: WorkflowId) -> CommandResult<Workflow> {
        let workflow = self.snapshot(workflow_id).await?;
        if workflow.live_steps().any(|step| step.is_stale()) {
            self.scheduler
                .request(workflow.id, workflow.render_target())
                .await;
        }
        Ok(workflow)
    }

    /// A connected session asked for the render it was told about.
    ///
    /// Only a render of the workflow's current state is forwarded; returns
    /// whether it was.
    pub async fn request_render(
        &self,
        workflow_id: WorkflowId,
        command_id: CommandId,
    ) -> CommandResult<bool> {
        let render_target = self.snapshot(workflow_id).await?.render_target();
        if command_id != render_target {
            tracing::debug!(
                "Ignoring render of workflow {} at command {}: now at {}",
                workflow_id,
                command_id,
                render_target
            );
            return Ok(false);
        }
        self.scheduler.request(workflow_id, command_id).await;
        Ok(true)
    }

    fn committed(&self, log: &WorkflowLog, command: Command) -> Committed {
        let workflow = log.workflow();
        Committed {
            decision: self.scheduler.decide(workflow, command.affects_outputs()),
            render_at: workflow.render_target(),
            command,
        }
    }

    async fn schedule(&self, workflow_id: WorkflowId, committed: Committed) -> Command {
        self.scheduler
            .dispatch(committed.decision, workflow_id, committed.render_at)
            .await;
        committed.command
    }

    fn report(&self, workflow_id: WorkflowId, operation: &str, e: CommandError) -> CommandError {
        match &e {
            CommandError::CorruptLog(reason) => tracing::error!(
                "Aborted {} on workflow {}: corrupt log: {}",
                operation,
                workflow_id,
                reason
            ),
            other => tracing::error!(
                "Failed to {} on workflow {}: {}",
                operation,
                workflow_id,
                other
            ),
        }
        e
    }

    /// Look up a workflow's log, loading it from the store on first use
    async fn log_for(&self, workflow_id: WorkflowId) -> CommandResult<Arc<Mutex<WorkflowLog>>> {
        if let Some(log) = self.logs.read().await.get(&workflow_id) {
            return Ok(log.clone());
        }

        let mut logs = self.logs.write().await;
        // Another caller may have loaded it while we waited
        if let Some(log) = logs.get(&workflow_id) {
            return Ok(log.clone());
        }

        let (workflow, commands) = self
            .store
            .load_workflow(&workflow_id)?
            .ok_or(CommandError::WorkflowNotFound(workflow_id))?;
        let log = Arc::new(Mutex::new(WorkflowLog::load(workflow, commands)?));
        tracing::debug!("Loaded command log of workflow {}", workflow_id);
        logs.insert(workflow_id, log.clone());
        Ok(log)
    }
}
