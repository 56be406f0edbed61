use crate::render_queue::RenderQueue;
use crate::websocket::SessionHub;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stepwise_core::scheduling::{CoalescingRecompute, RenderScheduler, StepNotifications};
use stepwise_core::storage::RedbCommandStore;
use stepwise_core::WorkflowManager;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(skip)]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub sessions: SessionConfig,

    #[serde(default)]
    pub render: RenderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_index_file")]
    pub index_file: String,
}

fn default_index_file() -> String {
    "commands.redb".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            index_file: default_index_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Messages buffered per workflow before slow sessions start lagging
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize {
    256
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_queue_capacity() -> usize {
    1024
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl ServerConfig {
    pub fn load(config_path: &Path, data_dir: PathBuf) -> Result<Self> {
        // Create data directory if it doesn't exist
        std::fs::create_dir_all(&data_dir).context("Failed to create data directory")?;

        // Load config file if it exists, otherwise use defaults
        let mut config: Self = if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .context("Failed to read configuration file")?;
            toml::from_str(&content).context("Failed to parse configuration file")?
        } else {
            tracing::info!("Configuration file not found, using defaults");
            Self {
                data_dir: data_dir.clone(),
                storage: Default::default(),
                sessions: Default::default(),
                render: Default::default(),
            }
        };

        config.data_dir = data_dir;

        Ok(config)
    }

    /// Get the command store path
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(&self.storage.index_file)
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<WorkflowManager>,
    pub sessions: Arc<SessionHub>,
}

impl AppState {
    /// Must be called from within a tokio runtime: the render queue spawns
    /// its consumer task.
    pub fn new(config: &ServerConfig) -> Result<Self> {
        Self::with_render_queue(config, RenderQueue::spawn(config.render.queue_capacity))
    }

    pub fn with_render_queue(config: &ServerConfig, render_queue: RenderQueue) -> Result<Self> {
        let store = Arc::new(
            RedbCommandStore::new(config.store_path()).context("Failed to create command store")?,
        );

        let sessions = Arc::new(SessionHub::new(config.sessions.channel_capacity));

        let scheduler = RenderScheduler::new(
            Arc::new(StepNotifications),
            sessions.clone(),
            Arc::new(CoalescingRecompute::new(render_queue)),
        );
        let manager = Arc::new(WorkflowManager::new(store, scheduler));

        Ok(Self { manager, sessions })
    }
}
