use crate::catalog::{Change, CommandKind, Direction};
use crate::error::{CommandError, CommandResult};
use crate::propagation::{self, DependentSnapshot};
use crate::types::{CommandId, Workflow, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An immutable entry in a workflow's command log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub id: CommandId,
    pub workflow_id: WorkflowId,
    pub kind: CommandKind,
    /// New values (forward payload) and the snapshot of old ones (backward payload)
    pub change: Change,
    /// Staleness marker each affected step held before this command
    pub dependent_step_last_command_ids: DependentSnapshot,
    pub created_at: DateTime<Utc>,
}

impl Command {
    pub fn new(
        id: CommandId,
        workflow_id: WorkflowId,
        change: Change,
        dependent_step_last_command_ids: DependentSnapshot,
    ) -> Self {
        Self {
            id,
            workflow_id,
            kind: change.kind(),
            change,
            dependent_step_last_command_ids,
            created_at: Utc::now(),
        }
    }

    /// Whether applying this command can change any step's output
    pub fn affects_outputs(&self) -> bool {
        !self.dependent_step_last_command_ids.is_empty()
    }

    pub fn describe(&self) -> String {
        self.change.describe()
    }

    /// Write the new values, then mark every affected step stale at this
    /// command.
    pub(crate) fn forward(&self, workflow: &mut Workflow) -> CommandResult<()> {
        self.ensure_workflow(workflow)?;
        self.change.apply(workflow, Direction::Forward);
        if let Some(origin) = self.change.origin(workflow) {
            let affected = propagation::affected_steps(workflow, &origin);
            propagation::advance(
                workflow,
                &affected,
                self.id,
                &self.dependent_step_last_command_ids,
            )?;
        }
        Ok(())
    }

    /// Rewind the staleness markers, then write the old values back.
    ///
    /// Markers are restored first because the affected set is derived from
    /// the post-forward layout.
    pub(crate) fn backward(&self, workflow: &mut Workflow) -> CommandResult<()> {
        self.ensure_workflow(workflow)?;
        if let Some(origin) = self.change.origin(workflow) {
            let affected = propagation::affected_steps(workflow, &origin);
            propagation::restore(
                workflow,
                &affected,
                self.id,
                &self.dependent_step_last_command_ids,
            )?;
        }
        self.change.apply(workflow, Direction::Backward);
        Ok(())
    }

    fn ensure_workflow(&self, workflow: &Workflow) -> CommandResult<()> {
        if self.workflow_id != workflow.id {
            return Err(CommandError::corrupt(format!(
                "command {} belongs to workflow {}, not {}",
                self.id, self.workflow_id, workflow.id
            )));
        }
        Ok(())
    }
}
