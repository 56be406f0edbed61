use crate::registry::StepRegistry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkflowId(pub Uuid);

impl WorkflowId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorkflowId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tab slug, unique within its workflow (e.g. "tab-1")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TabId(pub String);

impl TabId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for TabId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a pipeline step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StepId(pub Uuid);

impl StepId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StepId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a command, strictly increasing within one workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommandId(pub u64);

impl CommandId {
    /// Render token of a workflow with no applied command. Real commands
    /// start at 1.
    pub const PRISTINE: CommandId = CommandId(0);
}

impl std::fmt::Display for CommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque version token of a step's stored input data (the fetch timestamp)
pub type DataVersion = DateTime<Utc>;

/// One stage of a tab's pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub tab_id: TabId,
    pub module_id_name: String,
    /// Email the owner when this step's output changes
    pub notifications: bool,
    /// Whether this step's output depends on its predecessor's output.
    /// A step that does not consume input is a data-flow boundary.
    pub consumes_input: bool,
    pub is_deleted: bool,
    pub stored_data_version: Option<DataVersion>,
    pub(crate) last_relevant_command_id: Option<CommandId>,
    pub(crate) cached_result_command_id: Option<CommandId>,
}

impl Step {
    pub fn new(tab_id: TabId, module_id_name: impl Into<String>) -> Self {
        Self {
            id: StepId::new(),
            tab_id,
            module_id_name: module_id_name.into(),
            notifications: false,
            consumes_input: true,
            is_deleted: false,
            stored_data_version: None,
            last_relevant_command_id: None,
            cached_result_command_id: None,
        }
    }

    pub fn with_notifications(mut self, notifications: bool) -> Self {
        self.notifications = notifications;
        self
    }

    pub fn with_consumes_input(mut self, consumes_input: bool) -> Self {
        self.consumes_input = consumes_input;
        self
    }

    pub fn with_data_version(mut self, version: DataVersion) -> Self {
        self.stored_data_version = Some(version);
        self
    }

    /// Most recent command whose effect could change this step's output
    pub fn last_relevant_command_id(&self) -> Option<CommandId> {
        self.last_relevant_command_id
    }

    /// Command whose output is currently cached, if any
    pub fn cached_result_command_id(&self) -> Option<CommandId> {
        self.cached_result_command_id
    }

    /// The cached output must be recomputed before use
    pub fn is_stale(&self) -> bool {
        self.cached_result_command_id != self.last_relevant_command_id
    }
}

/// Ordered container of steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tab {
    pub id: TabId,
    pub name: String,
    /// Live steps in pipeline order
    pub step_ids: Vec<StepId>,
    pub selected_step_position: Option<usize>,
}

impl Tab {
    pub fn new(id: TabId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            step_ids: Vec::new(),
            selected_step_position: None,
        }
    }

    pub fn position_of(&self, step_id: &StepId) -> Option<usize> {
        self.step_ids.iter().position(|id| id == step_id)
    }
}

/// Root aggregate: tabs, their steps and the command cursor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub name: String,
    pub tabs: Vec<Tab>,
    pub selected_tab_position: usize,
    pub steps: StepRegistry,
    /// Last applied command; `None` is the pristine state
    pub current_command_id: Option<CommandId>,
    /// Highest command id ever issued for this workflow
    pub command_counter: u64,
    pub created_at: DateTime<Utc>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: WorkflowId::new(),
            name: name.into(),
            tabs: Vec::new(),
            selected_tab_position: 0,
            steps: StepRegistry::default(),
            current_command_id: None,
            command_counter: 0,
            created_at: Utc::now(),
        }
    }

    /// Append a tab. Used while assembling a workflow, before it is handed to
    /// the command log.
    pub fn add_tab(&mut self, tab: Tab) -> &mut Self {
        self.tabs.push(tab);
        self
    }

    /// Append a step to the end of its tab. Returns `None` when the tab does
    /// not exist.
    pub fn add_step(&mut self, step: Step) -> Option<StepId> {
        let tab = self.tabs.iter_mut().find(|t| t.id == step.tab_id)?;
        let id = step.id;
        tab.step_ids.push(id);
        self.steps.insert(step);
        Some(id)
    }

    pub fn tab(&self, tab_id: &TabId) -> Option<&Tab> {
        self.tabs.iter().find(|t| &t.id == tab_id)
    }

    pub fn tab_mut(&mut self, tab_id: &TabId) -> Option<&mut Tab> {
        self.tabs.iter_mut().find(|t| &t.id == tab_id)
    }

    pub fn tab_position(&self, tab_id: &TabId) -> Option<usize> {
        self.tabs.iter().position(|t| &t.id == tab_id)
    }

    /// Locate a live step: it exists, is not deleted and sits in one of this
    /// workflow's tabs. Returns the tab and the step's position in it.
    pub fn locate_step(&self, step_id: &StepId) -> Option<(&Tab, usize)> {
        let step = self.steps.get(step_id)?;
        if step.is_deleted {
            return None;
        }
        let tab = self.tab(&step.tab_id)?;
        let position = tab.position_of(step_id)?;
        Some((tab, position))
    }

    /// Live steps, tab by tab in pipeline order
    pub fn live_steps(&self) -> impl Iterator<Item = &Step> {
        self.tabs
            .iter()
            .flat_map(|tab| tab.step_ids.iter())
            .filter_map(|id| self.steps.get(id))
            .filter(|step| !step.is_deleted)
    }

    /// Command id renderers work against: the current command, or
    /// [`CommandId::PRISTINE`] before the first one
    pub fn render_target(&self) -> CommandId {
        self.current_command_id.unwrap_or(CommandId::PRISTINE)
    }

    /// Id the next appended command will carry
    pub fn next_command_id(&self) -> CommandId {
        CommandId(self.command_counter + 1)
    }
}
