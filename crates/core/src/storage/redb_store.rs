use super::CommandStore;
use crate::command::Command;
use crate::registry::StepRegistry;
use crate::types::{CommandId, Step, Tab, Workflow, WorkflowId};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Keyed by workflow id
const WORKFLOWS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("workflows");
/// Keyed by `<workflow_id>/<tab_id>/<step_id>`
const STEPS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("steps");
/// Keyed by `<workflow_id>/<command_id, zero padded>` so keys sort in log order
const COMMANDS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("commands");

/// Workflow row: everything except the steps, which have their own table
#[derive(Debug, Serialize, Deserialize)]
struct WorkflowRecord {
    id: WorkflowId,
    name: String,
    tabs: Vec<Tab>,
    selected_tab_position: usize,
    current_command_id: Option<CommandId>,
    command_counter: u64,
    created_at: DateTime<Utc>,
}

impl From<&Workflow> for WorkflowRecord {
    fn from(workflow: &Workflow) -> Self {
        Self {
            id: workflow.id,
            name: workflow.name.clone(),
            tabs: workflow.tabs.clone(),
            selected_tab_position: workflow.selected_tab_position,
            current_command_id: workflow.current_command_id,
            command_counter: workflow.command_counter,
            created_at: workflow.created_at,
        }
    }
}

impl WorkflowRecord {
    fn into_workflow(self, steps: StepRegistry) -> Workflow {
        Workflow {
            id: self.id,
            name: self.name,
            tabs: self.tabs,
            selected_tab_position: self.selected_tab_position,
            steps,
            current_command_id: self.current_command_id,
            command_counter: self.command_counter,
            created_at: self.created_at,
        }
    }
}

/// Durable command store using redb. Each commit is a single write
/// transaction covering the workflow row, its steps and its commands.
#[derive(Clone)]
pub struct RedbCommandStore {
    db: Arc<Database>,
}

impl RedbCommandStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create store directory")?;
        }

        let db = Database::create(&path).context("Failed to create redb database")?;

        // Initialize tables
        let write_txn = db.begin_write().context("Failed to begin write transaction")?;
        {
            let _workflows_table = write_txn
                .open_table(WORKFLOWS_TABLE)
                .context("Failed to open workflows table")?;
            let _steps_table = write_txn
                .open_table(STEPS_TABLE)
                .context("Failed to open steps table")?;
            let _commands_table = write_txn
                .open_table(COMMANDS_TABLE)
                .context("Failed to open commands table")?;
        }
        write_txn.commit().context("Failed to commit transaction")?;

        Ok(Self { db: Arc::new(db) })
    }

    fn step_key(workflow_id: &WorkflowId, step: &Step) -> String {
        format!("{}/{}/{}", workflow_id, step.tab_id, step.id)
    }

    fn command_key(workflow_id: &WorkflowId, command_id: &CommandId) -> String {
        format!("{}/{:020}", workflow_id, command_id.0)
    }

    /// Key range covering every `<workflow_id>/...` key. `'0'` is the byte
    /// right after `'/'`.
    fn prefix_range(workflow_id: &WorkflowId) -> (String, String) {
        (format!("{}/", workflow_id), format!("{}0", workflow_id))
    }

    fn write_workflow(&self, workflow: &Workflow, write_txn: &redb::WriteTransaction) -> Result<()> {
        let mut workflows = write_txn
            .open_table(WORKFLOWS_TABLE)
            .context("Failed to open workflows table")?;
        let key = workflow.id.to_string();
        let value = serde_json::to_vec(&WorkflowRecord::from(workflow))
            .context("Failed to serialize workflow")?;
        workflows
            .insert(key.as_str(), value.as_slice())
            .context("Failed to insert workflow")?;

        // Steps are rewritten wholesale: a removed step must not linger
        let mut steps = write_txn
            .open_table(STEPS_TABLE)
            .context("Failed to open steps table")?;
        let (start, end) = Self::prefix_range(&workflow.id);
        let stale_keys = steps
            .range(start.as_str()..end.as_str())
            .context("Failed to scan steps")?
            .map(|item| item.map(|(key, _)| key.value().to_string()))
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to read step key")?;
        for key in stale_keys {
            steps.remove(key.as_str()).context("Failed to remove step")?;
        }
        for step in workflow.steps.iter() {
            let key = Self::step_key(&workflow.id, step);
            let value = serde_json::to_vec(step).context("Failed to serialize step")?;
            steps
                .insert(key.as_str(), value.as_slice())
                .context("Failed to insert step")?;
        }
        Ok(())
    }
}

impl CommandStore for RedbCommandStore {
    fn save_workflow(&self, workflow: &Workflow) -> Result<()> {
        let write_txn = self.db.begin_write().context("Failed to begin write")?;
        self.write_workflow(workflow, &write_txn)?;
        write_txn.commit().context("Failed to commit")?;
        Ok(())
    }

    fn load_workflow(&self, workflow_id: &WorkflowId) -> Result<Option<(Workflow, Vec<Command>)>> {
        let read_txn = self.db.begin_read().context("Failed to begin read")?;

        let workflows = read_txn
            .open_table(WORKFLOWS_TABLE)
            .context("Failed to open workflows table")?;
        let key = workflow_id.to_string();
        let record: WorkflowRecord = match workflows.get(key.as_str()).context("Failed to get workflow")? {
            Some(guard) => {
                serde_json::from_slice(guard.value()).context("Failed to deserialize workflow")?
            }
            None => return Ok(None),
        };

        let (start, end) = Self::prefix_range(workflow_id);

        let steps_table = read_txn
            .open_table(STEPS_TABLE)
            .context("Failed to open steps table")?;
        let mut steps = Vec::new();
        for item in steps_table
            .range(start.as_str()..end.as_str())
            .context("Failed to scan steps")?
        {
            let (_key, value) = item.context("Failed to read step")?;
            let step: Step =
                serde_json::from_slice(value.value()).context("Failed to deserialize step")?;
            steps.push(step);
        }

        let commands_table = read_txn
            .open_table(COMMANDS_TABLE)
            .context("Failed to open commands table")?;
        let mut commands = Vec::new();
        for item in commands_table
            .range(start.as_str()..end.as_str())
            .context("Failed to scan commands")?
        {
            let (_key, value) = item.context("Failed to read command")?;
            let command: Command =
                serde_json::from_slice(value.value()).context("Failed to deserialize command")?;
            commands.push(command);
        }

        Ok(Some((record.into_workflow(steps.into_iter().collect()), commands)))
    }

    fn commit(
        &self,
        workflow: &Workflow,
        appended: Option<&Command>,
        truncated: &[CommandId],
    ) -> Result<()> {
        let write_txn = self.db.begin_write().context("Failed to begin write")?;
        self.write_workflow(workflow, &write_txn)?;
        {
            let mut commands = write_txn
                .open_table(COMMANDS_TABLE)
                .context("Failed to open commands table")?;
            for command_id in truncated {
                let key = Self::command_key(&workflow.id, command_id);
                commands
                    .remove(key.as_str())
                    .context("Failed to remove truncated command")?;
            }
            if let Some(command) = appended {
                let key = Self::command_key(&workflow.id, &command.id);
                let value = serde_json::to_vec(command).context("Failed to serialize command")?;
                commands
                    .insert(key.as_str(), value.as_slice())
                    .context("Failed to insert command")?;
            }
        }
        write_txn.commit().context("Failed to commit")?;
        Ok(())
    }

    fn list_workflows(&self) -> Result<Vec<WorkflowId>> {
        let read_txn = self.db.begin_read().context("Failed to begin read")?;
        let table = read_txn
            .open_table(WORKFLOWS_TABLE)
            .context("Failed to open workflows table")?;

        let mut ids = Vec::new();
        for item in table.iter().context("Failed to iterate workflows")? {
            let (_key, value) = item.context("Failed to read item")?;
            let record: WorkflowRecord =
                serde_json::from_slice(value.value()).context("Failed to deserialize workflow")?;
            ids.push(record.id);
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CommandArgs;
    use crate::log::WorkflowLog;
    use crate::types::TabId;
    use tempfile::NamedTempFile;

    #[test]
    fn test_redb_command_store_round_trip() {
        let temp_file = NamedTempFile::new().unwrap();
        let store = RedbCommandStore::new(temp_file.path().to_path_buf()).unwrap();

        let tab_id = TabId::new("tab-1");
        let mut workflow = Workflow::new("A");
        workflow.add_tab(Tab::new(tab_id.clone(), "Tab 1"));
        let s1 = workflow.add_step(Step::new(tab_id.clone(), "loadurl")).unwrap();
        workflow.add_step(Step::new(tab_id.clone(), "filter")).unwrap();
        store.save_workflow(&workflow).unwrap();

        let mut log = WorkflowLog::new(workflow).unwrap();
        log.append_and_apply(
            &store,
            CommandArgs::ChangeDataVersion {
                step_id: s1,
                version: Utc::now(),
            },
        )
        .unwrap();
        log.append_and_apply(&store, CommandArgs::DeleteStep { step_id: s1 })
            .unwrap();
        log.undo(&store).unwrap();

        let (loaded, commands) = store.load_workflow(&log.workflow().id).unwrap().unwrap();
        assert_eq!(&loaded, log.workflow());
        assert_eq!(commands, log.commands());

        let reloaded = WorkflowLog::load(loaded, commands).unwrap();
        assert_eq!(reloaded.current().map(|c| c.id), Some(CommandId(1)));
        assert!(reloaded.can_redo());
        assert_eq!(store.list_workflows().unwrap(), vec![log.workflow().id]);
    }

    #[test]
    fn test_redb_truncation_and_step_removal() {
        let temp_file = NamedTempFile::new().unwrap();
        let store = RedbCommandStore::new(temp_file.path().to_path_buf()).unwrap();

        let tab_id = TabId::new("tab-1");
        let mut workflow = Workflow::new("A");
        workflow.add_tab(Tab::new(tab_id.clone(), "Tab 1"));
        store.save_workflow(&workflow).unwrap();

        let mut log = WorkflowLog::new(workflow).unwrap();
        log.append_and_apply(
            &store,
            CommandArgs::AddStep {
                tab_id: tab_id.clone(),
                position: 0,
                module_id_name: "loadurl".to_string(),
                notifications: false,
                consumes_input: true,
            },
        )
        .unwrap();
        log.undo(&store).unwrap();
        log.append_and_apply(
            &store,
            CommandArgs::ChangeWorkflowTitle {
                title: "B".to_string(),
            },
        )
        .unwrap();

        let (loaded, commands) = store.load_workflow(&log.workflow().id).unwrap().unwrap();
        assert!(loaded.steps.is_empty());
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].id, CommandId(2));
    }

    #[test]
    fn test_load_missing_workflow() {
        let temp_file = NamedTempFile::new().unwrap();
        let store = RedbCommandStore::new(temp_file.path().to_path_buf()).unwrap();
        assert!(store.load_workflow(&WorkflowId::new()).unwrap().is_none());
    }
}
