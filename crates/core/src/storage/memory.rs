use super::CommandStore;
use crate::command::Command;
use crate::types::{CommandId, Workflow, WorkflowId};
use anyhow::{anyhow, Context, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// In-memory command store for tests and ephemeral deployments
#[derive(Default)]
pub struct MemoryCommandStore {
    workflows: Mutex<HashMap<WorkflowId, StoredWorkflow>>,
}

struct StoredWorkflow {
    workflow: Workflow,
    commands: BTreeMap<CommandId, Command>,
}

impl MemoryCommandStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CommandStore for MemoryCommandStore {
    fn save_workflow(&self, workflow: &Workflow) -> Result<()> {
        let mut workflows = self
            .workflows
            .lock()
            .map_err(|_| anyhow!("Memory store lock poisoned"))?;
        workflows.insert(
            workflow.id,
            StoredWorkflow {
                workflow: workflow.clone(),
                commands: BTreeMap::new(),
            },
        );
        Ok(())
    }

    fn load_workflow(&self, workflow_id: &WorkflowId) -> Result<Option<(Workflow, Vec<Command>)>> {
        let workflows = self
            .workflows
            .lock()
            .map_err(|_| anyhow!("Memory store lock poisoned"))?;
        Ok(workflows.get(workflow_id).map(|stored| {
            (
                stored.workflow.clone(),
                stored.commands.values().cloned().collect(),
            )
        }))
    }

    fn commit(
        &self,
        workflow: &Workflow,
        appended: Option<&Command>,
        truncated: &[CommandId],
    ) -> Result<()> {
        let mut workflows = self
            .workflows
            .lock()
            .map_err(|_| anyhow!("Memory store lock poisoned"))?;
        let stored = workflows
            .get_mut(&workflow.id)
            .with_context(|| format!("Workflow {} was never saved", workflow.id))?;

        stored.workflow = workflow.clone();
        for id in truncated {
            stored.commands.remove(id);
        }
        if let Some(command) = appended {
            stored.commands.insert(command.id, command.clone());
        }
        Ok(())
    }

    fn list_workflows(&self) -> Result<Vec<WorkflowId>> {
        let workflows = self
            .workflows
            .lock()
            .map_err(|_| anyhow!("Memory store lock poisoned"))?;
        Ok(workflows.keys().copied().collect())
    }
}
