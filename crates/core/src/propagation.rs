//! Dependency propagation: marking downstream steps stale in lockstep with
//! the command that changed their input, and rewinding those marks on undo.
//!
//! The affected set is always derived from the tab's current step order, so
//! applying a command in either direction costs O(steps in tab) no matter how
//! long the log is.

use crate::error::{CommandError, CommandResult};
use crate::types::{CommandId, StepId, TabId, Workflow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Prior `last_relevant_command_id` of every step a command affects,
/// captured when the command is created.
pub type DependentSnapshot = BTreeMap<StepId, Option<CommandId>>;

/// Where in a tab an output change starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// The step at the origin itself changed.
    Changed,
    /// The step before the origin changed or was removed.
    Upstream,
    /// Every step from the origin on has moved.
    Reordered,
}

/// A change's starting point: tab, position in that tab, and kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeOrigin {
    pub tab_id: TabId,
    pub position: usize,
    pub origin: Origin,
}

/// Steps whose output may differ because of a change at `origin`, in
/// pipeline order.
///
/// The walk stops at the first step that does not consume its predecessor's
/// output, except for reorders, which invalidate the whole moved suffix.
/// Ids in the tab order that have no registry entry are skipped.
pub fn affected_steps(workflow: &Workflow, origin: &ChangeOrigin) -> Vec<StepId> {
    let Some(tab) = workflow.tab(&origin.tab_id) else {
        tracing::debug!(
            "Tab {} missing during propagation in workflow {}",
            origin.tab_id,
            workflow.id
        );
        return Vec::new();
    };

    let mut affected = Vec::new();
    let suffix = tab.step_ids.iter().skip(origin.position);
    for (offset, step_id) in suffix.enumerate() {
        let Some(step) = workflow.steps.get(step_id) else {
            tracing::debug!("Skipping missing step {} during propagation", step_id);
            continue;
        };

        let directly_changed = offset == 0 && origin.origin == Origin::Changed;
        if origin.origin != Origin::Reordered && !directly_changed && !step.consumes_input {
            break;
        }
        affected.push(*step_id);
    }
    affected
}

/// Capture the current staleness marker of each step. Steps that do not
/// exist yet are recorded as `None`.
pub fn snapshot(workflow: &Workflow, step_ids: &[StepId]) -> DependentSnapshot {
    step_ids
        .iter()
        .map(|id| {
            let prior = workflow
                .steps
                .get(id)
                .and_then(|step| step.last_relevant_command_id());
            (*id, prior)
        })
        .collect()
}

/// Mark every step stale as of `command_id`.
///
/// Fails if the snapshot does not cover a step, because the matching
/// backward restore would then be impossible.
pub fn advance(
    workflow: &mut Workflow,
    step_ids: &[StepId],
    command_id: CommandId,
    snapshot: &DependentSnapshot,
) -> CommandResult<()> {
    ensure_covered(step_ids, snapshot, command_id)?;
    for step_id in step_ids {
        if !workflow.steps.set_last_relevant(step_id, Some(command_id)) {
            tracing::debug!("Step {} vanished before forward propagation", step_id);
        }
    }
    Ok(())
}

/// Put every step's marker back to the value recorded in the snapshot.
pub fn restore(
    workflow: &mut Workflow,
    step_ids: &[StepId],
    command_id: CommandId,
    snapshot: &DependentSnapshot,
) -> CommandResult<()> {
    ensure_covered(step_ids, snapshot, command_id)?;
    for step_id in step_ids {
        let prior = snapshot.get(step_id).copied().flatten();
        if !workflow.steps.set_last_relevant(step_id, prior) {
            tracing::debug!("Step {} vanished before backward propagation", step_id);
        }
    }
    Ok(())
}

fn ensure_covered(
    step_ids: &[StepId],
    snapshot: &DependentSnapshot,
    command_id: CommandId,
) -> CommandResult<()> {
    match step_ids.iter().find(|id| !snapshot.contains_key(id)) {
        Some(missing) => Err(CommandError::corrupt(format!(
            "command {} has no dependent-step entry for step {}",
            command_id, missing
        ))),
        None => Ok(()),
    }
}
