//! A single workflow's command log: an append-only chain of commands with a
//! cursor marking the current state.
//!
//! Every mutation is staged on a copy of the workflow, persisted, and only
//! then swapped in. A failure at any point leaves both the in-memory state
//! and the store as they were.

use crate::catalog::{amend_creation_args, CommandArgs};
use crate::command::Command;
use crate::error::{CommandError, CommandResult};
use crate::storage::CommandStore;
use crate::types::{CommandId, StepId, Workflow};

pub struct WorkflowLog {
    workflow: Workflow,
    commands: Vec<Command>,
    /// Number of applied commands; `commands[cursor - 1]` is current
    cursor: usize,
}

impl WorkflowLog {
    /// Start a log for a workflow that has no commands yet.
    pub fn new(workflow: Workflow) -> CommandResult<Self> {
        Self::load(workflow, Vec::new())
    }

    /// Rebuild a log from persisted state, validating the chain.
    pub fn load(workflow: Workflow, commands: Vec<Command>) -> CommandResult<Self> {
        if let Some(foreign) = commands.iter().find(|c| c.workflow_id != workflow.id) {
            return Err(CommandError::corrupt(format!(
                "command {} of workflow {} found in log of workflow {}",
                foreign.id, foreign.workflow_id, workflow.id
            )));
        }
        if let Some(pair) = commands.windows(2).find(|pair| pair[0].id >= pair[1].id) {
            return Err(CommandError::corrupt(format!(
                "command ids not increasing: {} then {}",
                pair[0].id, pair[1].id
            )));
        }
        if let Some(last) = commands.last() {
            if last.id.0 > workflow.command_counter {
                return Err(CommandError::corrupt(format!(
                    "command {} is beyond the workflow's counter {}",
                    last.id, workflow.command_counter
                )));
            }
        }

        let cursor = match workflow.current_command_id {
            None => 0,
            Some(current) => {
                let index = commands
                    .iter()
                    .position(|c| c.id == current)
                    .ok_or_else(|| {
                        CommandError::corrupt(format!(
                            "current command {} of workflow {} is not in its log",
                            current, workflow.id
                        ))
                    })?;
                index + 1
            }
        };

        Ok(Self {
            workflow,
            commands,
            cursor,
        })
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// Every command still in the chain, including undone ones
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn current(&self) -> Option<&Command> {
        self.cursor.checked_sub(1).map(|i| &self.commands[i])
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.commands.len()
    }

    /// Build a command from the current state, make it the new tip and apply
    /// it. Undone commands after the cursor are discarded.
    pub fn append_and_apply(
        &mut self,
        store: &dyn CommandStore,
        args: CommandArgs,
    ) -> CommandResult<Command> {
        let (change, snapshot) = amend_creation_args(&self.workflow, args)?;
        let command = Command::new(
            self.workflow.next_command_id(),
            self.workflow.id,
            change,
            snapshot,
        );

        let mut draft = self.workflow.clone();
        command.forward(&mut draft)?;
        draft.command_counter = command.id.0;
        draft.current_command_id = Some(command.id);

        let truncated: Vec<CommandId> = self.commands[self.cursor..].iter().map(|c| c.id).collect();
        store.commit(&draft, Some(&command), &truncated)?;

        if !truncated.is_empty() {
            tracing::debug!(
                "Discarded {} undone command(s) from workflow {}",
                truncated.len(),
                self.workflow.id
            );
        }
        self.commands.truncate(self.cursor);
        self.commands.push(command.clone());
        self.cursor = self.commands.len();
        self.workflow = draft;

        tracing::info!(
            "Applied command {} ({}) to workflow {}",
            command.id,
            command.kind,
            command.workflow_id
        );
        Ok(command)
    }

    /// Apply the current command backward and step the cursor back.
    /// Returns `None` at the beginning of the log.
    pub fn undo(&mut self, store: &dyn CommandStore) -> CommandResult<Option<Command>> {
        let Some(command) = self.current().cloned() else {
            return Ok(None);
        };
        self.ensure_cursor_matches()?;

        let mut draft = self.workflow.clone();
        command.backward(&mut draft)?;
        draft.current_command_id = self.cursor.checked_sub(2).map(|i| self.commands[i].id);

        store.commit(&draft, None, &[])?;
        self.cursor -= 1;
        self.workflow = draft;

        tracing::info!(
            "Undid command {} ({}) on workflow {}",
            command.id,
            command.kind,
            command.workflow_id
        );
        Ok(Some(command))
    }

    /// Apply the command after the cursor forward and advance the cursor.
    /// Returns `None` at the tip.
    pub fn redo(&mut self, store: &dyn CommandStore) -> CommandResult<Option<Command>> {
        let Some(command) = self.commands.get(self.cursor).cloned() else {
            return Ok(None);
        };
        self.ensure_cursor_matches()?;

        let mut draft = self.workflow.clone();
        command.forward(&mut draft)?;
        draft.current_command_id = Some(command.id);

        store.commit(&draft, None, &[])?;
        self.cursor += 1;
        self.workflow = draft;

        tracing::info!(
            "Redid command {} ({}) on workflow {}",
            command.id,
            command.kind,
            command.workflow_id
        );
        Ok(Some(command))
    }

    /// Record that a renderer cached a step's output as of `command_id`.
    ///
    /// Returns false, without writing, when the step is gone or the render is
    /// outdated (the step has since been marked stale by a newer command).
    /// Renders of a step no command has touched report [`CommandId::PRISTINE`].
    pub fn record_cached_result(
        &mut self,
        store: &dyn CommandStore,
        step_id: &StepId,
        command_id: CommandId,
    ) -> CommandResult<bool> {
        let current = match self.workflow.steps.get(step_id) {
            Some(step) => step.last_relevant_command_id(),
            None => {
                tracing::debug!("Ignoring cached result for missing step {}", step_id);
                return Ok(false);
            }
        };
        if current.unwrap_or(CommandId::PRISTINE) != command_id {
            tracing::debug!(
                "Ignoring outdated cached result for step {}: rendered {}, now at {:?}",
                step_id,
                command_id,
                current
            );
            return Ok(false);
        }

        let mut draft = self.workflow.clone();
        // A render of the pristine state leaves no command to point at
        draft.steps.set_cached_result(step_id, current);
        store.commit(&draft, None, &[])?;
        self.workflow = draft;
        Ok(true)
    }

    fn ensure_cursor_matches(&self) -> CommandResult<()> {
        let expected = self.current().map(|c| c.id);
        if self.workflow.current_command_id != expected {
            return Err(CommandError::corrupt(format!(
                "workflow {} points at {:?} but its log is positioned at {:?}",
                self.workflow.id, self.workflow.current_command_id, expected
            )));
        }
        Ok(())
    }
}
