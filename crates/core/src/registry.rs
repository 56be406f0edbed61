use crate::types::{CommandId, Step, StepId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Materialized state of every step a workflow has ever held, deleted ones
/// included so that undoing a deletion can bring them back.
///
/// Staleness markers are only written from inside the crate: the command log
/// is the sole writer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepRegistry {
    steps: BTreeMap<StepId, Step>,
}

impl StepRegistry {
    pub fn get(&self, step_id: &StepId) -> Option<&Step> {
        self.steps.get(step_id)
    }

    pub(crate) fn get_mut(&mut self, step_id: &StepId) -> Option<&mut Step> {
        self.steps.get_mut(step_id)
    }

    pub fn contains(&self, step_id: &StepId) -> bool {
        self.steps.contains_key(step_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Step> {
        self.steps.values()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub(crate) fn insert(&mut self, step: Step) {
        self.steps.insert(step.id, step);
    }

    pub(crate) fn remove(&mut self, step_id: &StepId) -> Option<Step> {
        self.steps.remove(step_id)
    }

    /// Returns false when the step is unknown.
    pub(crate) fn set_last_relevant(
        &mut self,
        step_id: &StepId,
        command_id: Option<CommandId>,
    ) -> bool {
        match self.steps.get_mut(step_id) {
            Some(step) => {
                step.last_relevant_command_id = command_id;
                true
            }
            None => false,
        }
    }

    /// Returns false when the step is unknown.
    pub(crate) fn set_cached_result(
        &mut self,
        step_id: &StepId,
        command_id: Option<CommandId>,
    ) -> bool {
        match self.steps.get_mut(step_id) {
            Some(step) => {
                step.cached_result_command_id = command_id;
                true
            }
            None => false,
        }
    }
}

impl FromIterator<Step> for StepRegistry {
    fn from_iter<I: IntoIterator<Item = Step>>(iter: I) -> Self {
        Self {
            steps: iter.into_iter().map(|s| (s.id, s)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TabId;

    #[test]
    fn test_markers_on_missing_step() {
        let mut registry = StepRegistry::default();
        assert!(!registry.set_last_relevant(&StepId::new(), Some(CommandId(1))));
        assert!(!registry.set_cached_result(&StepId::new(), Some(CommandId(1))));
    }

    #[test]
    fn test_set_markers() {
        let step = Step::new(TabId::new("tab-1"), "loadurl");
        let id = step.id;
        let mut registry: StepRegistry = std::iter::once(step).collect();

        assert!(registry.set_last_relevant(&id, Some(CommandId(4))));
        assert!(registry.set_cached_result(&id, Some(CommandId(3))));

        let step = registry.get(&id).unwrap();
        assert_eq!(step.last_relevant_command_id(), Some(CommandId(4)));
        assert_eq!(step.cached_result_command_id(), Some(CommandId(3)));
        assert!(step.is_stale());
    }
}
