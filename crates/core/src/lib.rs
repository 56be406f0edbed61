// Core types and functionality for the Stepwise workflow command log

pub mod types;
pub mod registry;
pub mod error;
pub mod propagation;
pub mod catalog;
pub mod command;
pub mod log;
pub mod storage;
pub mod scheduling;
pub mod manager;

pub use catalog::{Change, CommandArgs, CommandKind};
pub use command::Command;
pub use error::{CommandError, CommandResult};
pub use manager::WorkflowManager;
pub use types::*;
