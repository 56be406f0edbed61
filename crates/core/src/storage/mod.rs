pub mod memory;
pub mod redb_store;

pub use memory::MemoryCommandStore;
pub use redb_store::RedbCommandStore;

use crate::command::Command;
use crate::types::{CommandId, Workflow, WorkflowId};
use anyhow::Result;

/// Durable home of workflows, their steps and their command logs
pub trait CommandStore: Send + Sync {
    /// Store a freshly assembled workflow with an empty log
    fn save_workflow(&self, workflow: &Workflow) -> Result<()>;

    /// Load a workflow and its whole command chain, in id order
    fn load_workflow(&self, workflow_id: &WorkflowId) -> Result<Option<(Workflow, Vec<Command>)>>;

    /// Atomically write the workflow row and all its steps, add the appended
    /// command and drop truncated ones.
    fn commit(
        &self,
        workflow: &Workflow,
        appended: Option<&Command>,
        truncated: &[CommandId],
    ) -> Result<()>;

    /// List all stored workflows
    fn list_workflows(&self) -> Result<Vec<WorkflowId>>;
}
