//! Talking to the remote time tracking service.
//! [TimeTrackingClient] is the contract every backend implements, [toggle::ToggleStateMachine]
//! keeps the local view of the running entry in line with it.

pub mod clockify;
pub mod toggle;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    config::{AppConfig, Backend},
    registry::Rgb,
};

/// Project as known by the remote service.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteProject {
    pub id: String,
    pub name: String,
    pub colour: Option<Rgb>,
    pub archived: bool,
    /// Whether the current user is an active member of the project.
    pub active_member: bool,
}

/// Currently running time entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveEntry {
    pub id: String,
    pub project_id: Option<String>,
    pub started_at: DateTime<Utc>,
}

/// Remote calls are plain request/response. Retrying is up to the implementation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TimeTrackingClient: Send + Sync {
    async fn list_projects(&self) -> Result<Vec<RemoteProject>>;

    async fn get_active_entry(&self) -> Result<Option<ActiveEntry>>;

    /// Starts a new entry and returns its id.
    async fn start_entry(&self, description: &str, project_id: &str) -> Result<String>;

    async fn stop_entry(&self) -> Result<()>;
}

/// Builds the client for the configured backend.
pub fn create_client(config: &AppConfig) -> Result<Box<dyn TimeTrackingClient>> {
    match config.backend {
        Backend::Clockify => Ok(Box::new(clockify::ClockifyClient::new(
            config.clockify()?.clone(),
        )?)),
    }
}
