//! The command kinds a workflow understands.
//!
//! Callers submit minimal [`CommandArgs`]; [`amend_creation_args`] reads the
//! current workflow to fill in everything needed to undo the change later,
//! producing a [`Change`] that carries both the forward and the backward
//! payload.

use crate::error::{CommandError, CommandResult};
use crate::propagation::{self, ChangeOrigin, DependentSnapshot, Origin};
use crate::types::{DataVersion, Step, StepId, TabId, Workflow};
use serde::{Deserialize, Serialize};

/// Caller-supplied arguments, one variant per command kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandArgs {
    /// Point a step at another version of its stored input data
    ChangeDataVersion {
        step_id: StepId,
        version: DataVersion,
    },
    ChangeWorkflowTitle {
        title: String,
    },
    AddStep {
        tab_id: TabId,
        position: usize,
        module_id_name: String,
        #[serde(default)]
        notifications: bool,
        #[serde(default = "default_consumes_input")]
        consumes_input: bool,
    },
    DeleteStep {
        step_id: StepId,
    },
    ReorderSteps {
        tab_id: TabId,
        step_ids: Vec<StepId>,
    },
    /// Select a step, and the tab it lives in
    SetSelectedStep {
        step_id: StepId,
    },
    SetSelectedTab {
        tab_id: TabId,
    },
    SetTabOrder {
        tab_ids: Vec<TabId>,
    },
}

fn default_consumes_input() -> bool {
    true
}

/// Discriminant of a command, stored alongside its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    ChangeDataVersion,
    ChangeWorkflowTitle,
    AddStep,
    DeleteStep,
    ReorderSteps,
    SetSelectedStep,
    SetSelectedTab,
    SetTabOrder,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChangeDataVersion => "change_data_version",
            Self::ChangeWorkflowTitle => "change_workflow_title",
            Self::AddStep => "add_step",
            Self::DeleteStep => "delete_step",
            Self::ReorderSteps => "reorder_steps",
            Self::SetSelectedStep => "set_selected_step",
            Self::SetSelectedTab => "set_selected_tab",
            Self::SetTabOrder => "set_tab_order",
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Forward,
    Backward,
}

/// A fully amended change: new values to apply and the old values that
/// undo them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Change {
    ChangeDataVersion {
        step_id: StepId,
        module_id_name: String,
        /// A step may never have had a materialized version
        old_version: Option<DataVersion>,
        new_version: DataVersion,
    },
    ChangeWorkflowTitle {
        old_title: String,
        new_title: String,
    },
    AddStep {
        step: Step,
        position: usize,
    },
    DeleteStep {
        step_id: StepId,
        tab_id: TabId,
        module_id_name: String,
        position: usize,
        old_selected_position: Option<usize>,
        new_selected_position: Option<usize>,
    },
    ReorderSteps {
        tab_id: TabId,
        old_order: Vec<StepId>,
        new_order: Vec<StepId>,
    },
    SetSelectedStep {
        tab_id: TabId,
        old_tab_position: usize,
        new_tab_position: usize,
        old_step_position: Option<usize>,
        new_step_position: usize,
    },
    SetSelectedTab {
        old_position: usize,
        new_position: usize,
    },
    SetTabOrder {
        old_order: Vec<TabId>,
        new_order: Vec<TabId>,
        old_selected_position: usize,
        new_selected_position: usize,
    },
}

/// Build a change from the caller's arguments and the current state, along
/// with the staleness marker each affected step holds right now.
///
/// Nothing in `workflow` is mutated: the affected set is computed on a
/// scratch copy with the change applied, exactly as `forward` will see it.
pub fn amend_creation_args(
    workflow: &Workflow,
    args: CommandArgs,
) -> CommandResult<(Change, DependentSnapshot)> {
    let change = Change::from_args(workflow, args)?;

    let mut scratch = workflow.clone();
    change.apply(&mut scratch, Direction::Forward);
    let snapshot = match change.origin(&scratch) {
        Some(origin) => {
            let affected = propagation::affected_steps(&scratch, &origin);
            propagation::snapshot(workflow, &affected)
        }
        None => DependentSnapshot::new(),
    };

    Ok((change, snapshot))
}

impl Change {
    fn from_args(workflow: &Workflow, args: CommandArgs) -> CommandResult<Self> {
        match args {
            CommandArgs::ChangeDataVersion { step_id, version } => {
                workflow
                    .locate_step(&step_id)
                    .ok_or_else(|| missing_step(workflow, &step_id))?;
                let step = workflow
                    .steps
                    .get(&step_id)
                    .ok_or_else(|| missing_step(workflow, &step_id))?;
                Ok(Self::ChangeDataVersion {
                    step_id,
                    module_id_name: step.module_id_name.clone(),
                    old_version: step.stored_data_version,
                    new_version: version,
                })
            }
            CommandArgs::ChangeWorkflowTitle { title } => Ok(Self::ChangeWorkflowTitle {
                old_title: workflow.name.clone(),
                new_title: title,
            }),
            CommandArgs::AddStep {
                tab_id,
                position,
                module_id_name,
                notifications,
                consumes_input,
            } => {
                let tab = workflow
                    .tab(&tab_id)
                    .ok_or_else(|| missing_tab(workflow, &tab_id))?;
                if position > tab.step_ids.len() {
                    return Err(CommandError::invalid(format!(
                        "position {} is past the end of tab {}",
                        position, tab_id
                    )));
                }
                let step = Step::new(tab_id, module_id_name)
                    .with_notifications(notifications)
                    .with_consumes_input(consumes_input);
                Ok(Self::AddStep { step, position })
            }
            CommandArgs::DeleteStep { step_id } => {
                let (tab, position) = workflow
                    .locate_step(&step_id)
                    .ok_or_else(|| missing_step(workflow, &step_id))?;
                let module_id_name = workflow
                    .steps
                    .get(&step_id)
                    .map(|s| s.module_id_name.clone())
                    .unwrap_or_default();
                let remaining = tab.step_ids.len() - 1;
                let old_selected_position = tab.selected_step_position;
                let new_selected_position = old_selected_position
                    .map(|sel| if sel > position { sel - 1 } else { sel })
                    .filter(|_| remaining > 0)
                    .map(|sel| sel.min(remaining - 1));
                Ok(Self::DeleteStep {
                    step_id,
                    tab_id: tab.id.clone(),
                    module_id_name,
                    position,
                    old_selected_position,
                    new_selected_position,
                })
            }
            CommandArgs::ReorderSteps { tab_id, step_ids } => {
                let tab = workflow
                    .tab(&tab_id)
                    .ok_or_else(|| missing_tab(workflow, &tab_id))?;
                if !is_permutation(&tab.step_ids, &step_ids) {
                    return Err(CommandError::invalid(format!(
                        "step order does not match the steps of tab {}",
                        tab_id
                    )));
                }
                Ok(Self::ReorderSteps {
                    tab_id,
                    old_order: tab.step_ids.clone(),
                    new_order: step_ids,
                })
            }
            CommandArgs::SetSelectedStep { step_id } => {
                let (tab, position) = workflow
                    .locate_step(&step_id)
                    .ok_or_else(|| missing_step(workflow, &step_id))?;
                let tab_position = workflow
                    .tab_position(&tab.id)
                    .ok_or_else(|| missing_tab(workflow, &tab.id))?;
                Ok(Self::SetSelectedStep {
                    tab_id: tab.id.clone(),
                    old_tab_position: workflow.selected_tab_position,
                    new_tab_position: tab_position,
                    old_step_position: tab.selected_step_position,
                    new_step_position: position,
                })
            }
            CommandArgs::SetSelectedTab { tab_id } => {
                let position = workflow
                    .tab_position(&tab_id)
                    .ok_or_else(|| missing_tab(workflow, &tab_id))?;
                Ok(Self::SetSelectedTab {
                    old_position: workflow.selected_tab_position,
                    new_position: position,
                })
            }
            CommandArgs::SetTabOrder { tab_ids } => {
                let old_order: Vec<TabId> = workflow.tabs.iter().map(|t| t.id.clone()).collect();
                if !is_permutation(&old_order, &tab_ids) {
                    return Err(CommandError::invalid("wrong tab slugs"));
                }
                let selected = old_order.get(workflow.selected_tab_position);
                let new_selected_position = selected
                    .and_then(|id| tab_ids.iter().position(|t| t == id))
                    .unwrap_or(workflow.selected_tab_position);
                Ok(Self::SetTabOrder {
                    old_selected_position: workflow.selected_tab_position,
                    new_selected_position,
                    old_order,
                    new_order: tab_ids,
                })
            }
        }
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Self::ChangeDataVersion { .. } => CommandKind::ChangeDataVersion,
            Self::ChangeWorkflowTitle { .. } => CommandKind::ChangeWorkflowTitle,
            Self::AddStep { .. } => CommandKind::AddStep,
            Self::DeleteStep { .. } => CommandKind::DeleteStep,
            Self::ReorderSteps { .. } => CommandKind::ReorderSteps,
            Self::SetSelectedStep { .. } => CommandKind::SetSelectedStep,
            Self::SetSelectedTab { .. } => CommandKind::SetSelectedTab,
            Self::SetTabOrder { .. } => CommandKind::SetTabOrder,
        }
    }

    /// Human-readable summary for audit trails and the UI
    pub fn describe(&self) -> String {
        match self {
            Self::ChangeDataVersion {
                module_id_name,
                new_version,
                ..
            } => format!(
                "Change {} data version to {}",
                module_id_name,
                new_version.to_rfc3339()
            ),
            Self::ChangeWorkflowTitle { new_title, .. } => {
                format!("Change workflow name to {}", new_title)
            }
            Self::AddStep { step, position } => format!(
                "Add {} to {} at position {}",
                step.module_id_name, step.tab_id, position
            ),
            Self::DeleteStep {
                module_id_name,
                tab_id,
                ..
            } => format!("Delete {} from {}", module_id_name, tab_id),
            Self::ReorderSteps { tab_id, .. } => format!("Reorder steps in {}", tab_id),
            Self::SetSelectedStep {
                tab_id,
                new_step_position,
                ..
            } => format!("Select step {} of {}", new_step_position, tab_id),
            Self::SetSelectedTab { new_position, .. } => {
                format!("Select tab {}", new_position)
            }
            Self::SetTabOrder { new_order, .. } => format!(
                "Reorder tabs to {}",
                new_order
                    .iter()
                    .map(|t| t.0.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }

    /// Write this change's new (forward) or old (backward) values.
    /// Targets that have disappeared are skipped.
    pub(crate) fn apply(&self, workflow: &mut Workflow, direction: Direction) {
        let forward = direction == Direction::Forward;
        match self {
            Self::ChangeDataVersion {
                step_id,
                old_version,
                new_version,
                ..
            } => {
                let version = if forward { Some(*new_version) } else { *old_version };
                match workflow.steps.get_mut(step_id) {
                    Some(step) => step.stored_data_version = version,
                    None => tracing::debug!("Step {} missing, data version not written", step_id),
                }
            }
            Self::ChangeWorkflowTitle {
                old_title,
                new_title,
            } => {
                let title = if forward { new_title } else { old_title };
                workflow.name = title.clone();
            }
            Self::AddStep { step, position } => {
                if forward {
                    insert_step(workflow, step.clone(), *position);
                } else {
                    remove_step(workflow, &step.tab_id, &step.id);
                }
            }
            Self::DeleteStep {
                step_id,
                tab_id,
                position,
                old_selected_position,
                new_selected_position,
                ..
            } => {
                let Some(step) = workflow.steps.get_mut(step_id) else {
                    tracing::debug!("Step {} missing, deletion not replayed", step_id);
                    return;
                };
                step.is_deleted = forward;
                let Some(tab) = workflow.tab_mut(tab_id) else {
                    tracing::debug!("Tab {} missing, deletion not replayed", tab_id);
                    return;
                };
                if forward {
                    tab.step_ids.retain(|id| id != step_id);
                    tab.selected_step_position = *new_selected_position;
                } else {
                    let at = (*position).min(tab.step_ids.len());
                    tab.step_ids.insert(at, *step_id);
                    tab.selected_step_position = *old_selected_position;
                }
            }
            Self::ReorderSteps {
                tab_id,
                old_order,
                new_order,
            } => match workflow.tab_mut(tab_id) {
                Some(tab) => {
                    let order = if forward { new_order } else { old_order };
                    tab.step_ids = order.clone();
                }
                None => tracing::debug!("Tab {} missing, step order not written", tab_id),
            },
            Self::SetSelectedStep {
                tab_id,
                old_tab_position,
                new_tab_position,
                old_step_position,
                new_step_position,
            } => {
                workflow.selected_tab_position = if forward {
                    *new_tab_position
                } else {
                    *old_tab_position
                };
                if let Some(tab) = workflow.tab_mut(tab_id) {
                    tab.selected_step_position = if forward {
                        Some(*new_step_position)
                    } else {
                        *old_step_position
                    };
                }
            }
            Self::SetSelectedTab {
                old_position,
                new_position,
            } => {
                workflow.selected_tab_position = if forward { *new_position } else { *old_position };
            }
            Self::SetTabOrder {
                old_order,
                new_order,
                old_selected_position,
                new_selected_position,
            } => {
                let order = if forward { new_order } else { old_order };
                workflow.tabs.sort_by_key(|tab| {
                    order
                        .iter()
                        .position(|id| id == &tab.id)
                        .unwrap_or(usize::MAX)
                });
                workflow.selected_tab_position = if forward {
                    *new_selected_position
                } else {
                    *old_selected_position
                };
            }
        }
    }

    /// Where this change's effect on step outputs begins, evaluated against
    /// the state right after the forward effect. `None` when no step output
    /// depends on the change.
    pub(crate) fn origin(&self, workflow: &Workflow) -> Option<ChangeOrigin> {
        match self {
            Self::ChangeDataVersion { step_id, .. } => {
                let (tab, position) = workflow.locate_step(step_id)?;
                Some(ChangeOrigin {
                    tab_id: tab.id.clone(),
                    position,
                    origin: Origin::Changed,
                })
            }
            Self::AddStep { step, .. } => {
                let (tab, position) = workflow.locate_step(&step.id)?;
                Some(ChangeOrigin {
                    tab_id: tab.id.clone(),
                    position,
                    origin: Origin::Changed,
                })
            }
            Self::DeleteStep {
                tab_id, position, ..
            } => Some(ChangeOrigin {
                tab_id: tab_id.clone(),
                position: *position,
                origin: Origin::Upstream,
            }),
            Self::ReorderSteps {
                tab_id,
                old_order,
                new_order,
            } => {
                let position = old_order
                    .iter()
                    .zip(new_order.iter())
                    .position(|(old, new)| old != new)?;
                Some(ChangeOrigin {
                    tab_id: tab_id.clone(),
                    position,
                    origin: Origin::Reordered,
                })
            }
            Self::ChangeWorkflowTitle { .. }
            | Self::SetSelectedStep { .. }
            | Self::SetSelectedTab { .. }
            | Self::SetTabOrder { .. } => None,
        }
    }
}

fn insert_step(workflow: &mut Workflow, step: Step, position: usize) {
    let step_id = step.id;
    let Some(tab) = workflow.tab_mut(&step.tab_id) else {
        tracing::debug!("Tab {} missing, step {} not added", step.tab_id, step_id);
        return;
    };
    let at = position.min(tab.step_ids.len());
    tab.step_ids.insert(at, step_id);
    workflow.steps.insert(step);
}

fn remove_step(workflow: &mut Workflow, tab_id: &TabId, step_id: &StepId) {
    if let Some(tab) = workflow.tab_mut(tab_id) {
        tab.step_ids.retain(|id| id != step_id);
        if let Some(sel) = tab.selected_step_position {
            if sel >= tab.step_ids.len() {
                tab.selected_step_position = tab.step_ids.len().checked_sub(1);
            }
        }
    }
    workflow.steps.remove(step_id);
}

fn is_permutation<T: Ord + Clone>(current: &[T], proposed: &[T]) -> bool {
    let mut a = current.to_vec();
    let mut b = proposed.to_vec();
    a.sort();
    b.sort();
    a == b
}

fn missing_step(workflow: &Workflow, step_id: &StepId) -> CommandError {
    CommandError::invalid(format!(
        "step {} is not a live step of workflow {}",
        step_id, workflow.id
    ))
}

fn missing_tab(workflow: &Workflow, tab_id: &TabId) -> CommandError {
    CommandError::invalid(format!("tab {} is not in workflow {}", tab_id, workflow.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CommandId, Tab};
    use chrono::{TimeZone, Utc};

    fn three_step_workflow() -> (Workflow, Vec<StepId>) {
        let tab_id = TabId::new("tab-1");
        let mut workflow = Workflow::new("Test");
        workflow.add_tab(Tab::new(tab_id.clone(), "Tab 1"));
        let ids = ["loadurl", "filter", "sort"]
            .iter()
            .map(|m| workflow.add_step(Step::new(tab_id.clone(), *m)).unwrap())
            .collect();
        (workflow, ids)
    }

    #[test]
    fn test_amend_change_data_version_captures_old_version() {
        let (mut workflow, ids) = three_step_workflow();
        let old = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let new = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        workflow.steps.get_mut(&ids[0]).unwrap().stored_data_version = Some(old);
        workflow.steps.set_last_relevant(&ids[1], Some(CommandId(1)));

        let (change, snapshot) = amend_creation_args(
            &workflow,
            CommandArgs::ChangeDataVersion {
                step_id: ids[0],
                version: new,
            },
        )
        .unwrap();

        assert_eq!(
            change,
            Change::ChangeDataVersion {
                step_id: ids[0],
                module_id_name: "loadurl".to_string(),
                old_version: Some(old),
                new_version: new,
            }
        );
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[&ids[0]], None);
        assert_eq!(snapshot[&ids[1]], Some(CommandId(1)));
        assert_eq!(snapshot[&ids[2]], None);
        // amend never mutates
        assert_eq!(workflow.steps.get(&ids[0]).unwrap().stored_data_version, Some(old));
    }

    #[test]
    fn test_amend_rejects_foreign_and_deleted_steps() {
        let (mut workflow, ids) = three_step_workflow();
        let (_, other_ids) = three_step_workflow();
        let err = amend_creation_args(
            &workflow,
            CommandArgs::SetSelectedStep {
                step_id: other_ids[1],
            },
        )
        .unwrap_err();
        assert!(matches!(err, CommandError::InvalidOperation(_)));

        workflow.steps.get_mut(&ids[2]).unwrap().is_deleted = true;
        let err =
            amend_creation_args(&workflow, CommandArgs::DeleteStep { step_id: ids[2] }).unwrap_err();
        assert!(matches!(err, CommandError::InvalidOperation(_)));
    }

    #[test]
    fn test_amend_add_step_snapshot_includes_new_step() {
        let (workflow, ids) = three_step_workflow();
        let (change, snapshot) = amend_creation_args(
            &workflow,
            CommandArgs::AddStep {
                tab_id: TabId::new("tab-1"),
                position: 1,
                module_id_name: "join".to_string(),
                notifications: false,
                consumes_input: true,
            },
        )
        .unwrap();

        let Change::AddStep { step, position } = change else {
            panic!("expected add_step");
        };
        assert_eq!(position, 1);
        assert_eq!(snapshot.len(), 3);
        assert!(snapshot.contains_key(&step.id));
        assert!(snapshot.contains_key(&ids[1]));
        assert!(snapshot.contains_key(&ids[2]));
        assert!(!snapshot.contains_key(&ids[0]));
    }

    #[test]
    fn test_amend_add_step_past_end_is_invalid() {
        let (workflow, _) = three_step_workflow();
        let err = amend_creation_args(
            &workflow,
            CommandArgs::AddStep {
                tab_id: TabId::new("tab-1"),
                position: 4,
                module_id_name: "join".to_string(),
                notifications: false,
                consumes_input: true,
            },
        )
        .unwrap_err();
        assert!(matches!(err, CommandError::InvalidOperation(_)));
    }

    #[test]
    fn test_amend_delete_step_adjusts_selection() {
        let (mut workflow, ids) = three_step_workflow();
        workflow.tabs[0].selected_step_position = Some(2);

        let (change, snapshot) =
            amend_creation_args(&workflow, CommandArgs::DeleteStep { step_id: ids[2] }).unwrap();
        let Change::DeleteStep {
            position,
            old_selected_position,
            new_selected_position,
            ..
        } = change
        else {
            panic!("expected delete_step");
        };
        assert_eq!(position, 2);
        assert_eq!(old_selected_position, Some(2));
        assert_eq!(new_selected_position, Some(1));
        // Deleting the last step changes no other output
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_amend_reorder_snapshot_covers_moved_suffix() {
        let (workflow, ids) = three_step_workflow();
        let (_, snapshot) = amend_creation_args(
            &workflow,
            CommandArgs::ReorderSteps {
                tab_id: TabId::new("tab-1"),
                step_ids: vec![ids[0], ids[2], ids[1]],
            },
        )
        .unwrap();
        assert_eq!(snapshot.keys().copied().collect::<Vec<_>>().len(), 2);
        assert!(!snapshot.contains_key(&ids[0]));

        let err = amend_creation_args(
            &workflow,
            CommandArgs::ReorderSteps {
                tab_id: TabId::new("tab-1"),
                step_ids: vec![ids[0], ids[2]],
            },
        )
        .unwrap_err();
        assert!(matches!(err, CommandError::InvalidOperation(_)));
    }

    #[test]
    fn test_amend_set_tab_order_wrong_slugs() {
        let (mut workflow, _) = three_step_workflow();
        workflow.add_tab(Tab::new(TabId::new("tab-2"), "Tab 2"));

        let err = amend_creation_args(
            &workflow,
            CommandArgs::SetTabOrder {
                tab_ids: vec![TabId::new("tab-3"), TabId::new("tab-2")],
            },
        )
        .unwrap_err();
        assert!(matches!(err, CommandError::InvalidOperation(_)));
    }

    #[test]
    fn test_set_tab_order_keeps_selected_tab() {
        let (mut workflow, _) = three_step_workflow();
        workflow.add_tab(Tab::new(TabId::new("tab-2"), "Tab 2"));
        workflow.selected_tab_position = 1;

        let (change, snapshot) = amend_creation_args(
            &workflow,
            CommandArgs::SetTabOrder {
                tab_ids: vec![TabId::new("tab-2"), TabId::new("tab-1")],
            },
        )
        .unwrap();
        assert!(snapshot.is_empty());

        change.apply(&mut workflow, Direction::Forward);
        assert_eq!(workflow.tabs[0].id, TabId::new("tab-2"));
        assert_eq!(workflow.selected_tab_position, 0);

        change.apply(&mut workflow, Direction::Backward);
        assert_eq!(workflow.tabs[0].id, TabId::new("tab-1"));
        assert_eq!(workflow.selected_tab_position, 1);
    }

    #[test]
    fn test_describe() {
        let (workflow, ids) = three_step_workflow();
        let version = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let (change, _) = amend_creation_args(
            &workflow,
            CommandArgs::ChangeDataVersion {
                step_id: ids[0],
                version,
            },
        )
        .unwrap();
        assert_eq!(change.kind(), CommandKind::ChangeDataVersion);
        assert_eq!(
            change.describe(),
            "Change loadurl data version to 2024-02-01T00:00:00+00:00"
        );

        let (change, _) = amend_creation_args(
            &workflow,
            CommandArgs::ChangeWorkflowTitle {
                title: "B".to_string(),
            },
        )
        .unwrap();
        assert_eq!(change.describe(), "Change workflow name to B");
    }

    #[test]
    fn test_args_from_json() {
        let args: CommandArgs = serde_json::from_value(serde_json::json!({
            "type": "add_step",
            "tab_id": "tab-1",
            "position": 0,
            "module_id_name": "loadurl",
        }))
        .unwrap();
        assert_eq!(
            args,
            CommandArgs::AddStep {
                tab_id: TabId::new("tab-1"),
                position: 0,
                module_id_name: "loadurl".to_string(),
                notifications: false,
                consumes_input: true,
            }
        );
    }
}
