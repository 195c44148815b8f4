use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info, warn};

use crate::{registry::ProjectRegistry, utils::clock::Clock};

use super::{RemoteProject, TimeTrackingClient};

/// Toggling this target stops whatever is running. Compared case-insensitively, and only after
/// the registry had no project with that code.
pub const STOP_SENTINEL: &str = "none";

/// Local view of what the remote service is tracking right now.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ActiveSession {
    #[default]
    Idle,
    /// `project` is `None` when the running entry belongs to a project outside the registry.
    Active {
        project: Option<String>,
        since: DateTime<Utc>,
    },
}

impl ActiveSession {
    pub fn project(&self) -> Option<&str> {
        match self {
            ActiveSession::Active { project, .. } => project.as_deref(),
            ActiveSession::Idle => None,
        }
    }

    pub fn since(&self) -> Option<DateTime<Utc>> {
        match self {
            ActiveSession::Active { since, .. } => Some(*since),
            ActiveSession::Idle => None,
        }
    }
}

#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    Started(String),
    Stopped,
    /// The target is neither a registry code nor the stop sentinel. Nothing was sent.
    UnknownProject(String),
    /// The remote call failed or couldn't be made. Local state is unchanged.
    ToggleFailed { reason: String },
}

impl ToggleOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ToggleOutcome::Started(_) | ToggleOutcome::Stopped)
    }
}

/// Running project together with how long it has been running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Elapsed {
    pub project: Option<String>,
    pub duration: Duration,
}

/// Maps registry codes to remote project ids and back. Registry projects are matched to remote
/// ones by name.
#[derive(Debug, Clone, Default)]
pub struct ProjectIndex {
    ids_by_code: HashMap<String, String>,
    codes_by_id: HashMap<String, String>,
}

impl ProjectIndex {
    pub fn build(registry: &ProjectRegistry, remote: &[RemoteProject]) -> Self {
        let mut index = Self::default();
        for project in registry.projects() {
            let matching = remote
                .iter()
                .filter(|r| r.name == project.name)
                .min_by_key(|r| r.archived);
            match matching {
                Some(r) => {
                    index.ids_by_code.insert(project.code.clone(), r.id.clone());
                    index.codes_by_id.insert(r.id.clone(), project.code.clone());
                }
                None => warn!(
                    "Project {} ({}) has no remote counterpart",
                    project.code, project.name
                ),
            }
        }
        index
    }

    pub fn project_id(&self, code: &str) -> Option<&str> {
        self.ids_by_code.get(code).map(String::as_str)
    }

    pub fn code_for(&self, project_id: &str) -> Option<&str> {
        self.codes_by_id.get(project_id).map(String::as_str)
    }
}

/// Owns the notion of the running project. Start and stop go through the remote service first;
/// local state only changes once the service accepted the call. [ToggleStateMachine::refresh]
/// pulls the service's view back in, so edits made elsewhere show up.
pub struct ToggleStateMachine {
    client: Box<dyn TimeTrackingClient>,
    registry: Arc<ProjectRegistry>,
    index: ProjectIndex,
    session: ActiveSession,
    last_entry_id: Option<String>,
    entry_description: String,
    clock: Box<dyn Clock>,
}

impl ToggleStateMachine {
    pub fn new(
        client: Box<dyn TimeTrackingClient>,
        registry: Arc<ProjectRegistry>,
        entry_description: String,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            client,
            registry,
            index: ProjectIndex::default(),
            session: ActiveSession::Idle,
            last_entry_id: None,
            entry_description,
            clock,
        }
    }

    /// Fetches remote projects so codes can be turned into project ids.
    pub async fn initialize(&mut self) -> Result<()> {
        let remote = self.client.list_projects().await?;
        debug!("Fetched {} remote projects", remote.len());
        self.index = ProjectIndex::build(&self.registry, &remote);
        Ok(())
    }

    pub fn session(&self) -> &ActiveSession {
        &self.session
    }

    pub async fn toggle(&mut self, target: &str) -> ToggleOutcome {
        if let Some(project) = self.registry.get(target) {
            let code = project.code.clone();
            let Some(project_id) = self.index.project_id(&code).map(String::from) else {
                warn!("Can't start {code}: no remote project named {}", project.name);
                return ToggleOutcome::ToggleFailed {
                    reason: format!("no remote project named {:?}", project.name),
                };
            };
            self.start(code, &project_id).await
        } else if target.trim().eq_ignore_ascii_case(STOP_SENTINEL) {
            self.stop().await
        } else {
            warn!("Unknown project {target:?}");
            ToggleOutcome::UnknownProject(target.to_string())
        }
    }

    async fn start(&mut self, code: String, project_id: &str) -> ToggleOutcome {
        match self
            .client
            .start_entry(&self.entry_description, project_id)
            .await
        {
            Ok(entry_id) => {
                info!("Started {code} as entry {entry_id}");
                self.session = ActiveSession::Active {
                    project: Some(code.clone()),
                    since: self.clock.time(),
                };
                self.last_entry_id = Some(entry_id);
                ToggleOutcome::Started(code)
            }
            Err(e) => {
                error!("Couldn't start {code}: {e:?}");
                ToggleOutcome::ToggleFailed {
                    reason: format!("{e:#}"),
                }
            }
        }
    }

    pub async fn stop(&mut self) -> ToggleOutcome {
        match self.client.stop_entry().await {
            Ok(()) => {
                info!("Stopped running entry");
                self.session = ActiveSession::Idle;
                self.last_entry_id = None;
                ToggleOutcome::Stopped
            }
            Err(e) => {
                error!("Couldn't stop running entry: {e:?}");
                ToggleOutcome::ToggleFailed {
                    reason: format!("{e:#}"),
                }
            }
        }
    }

    /// Reconciles with the remote active entry. The anchor only moves for an entry that is new to
    /// us or that started strictly later than the anchor, so the same entry never runs backwards
    /// because of clock skew. On error nothing changes.
    pub async fn refresh(&mut self) -> Result<()> {
        let entry = self.client.get_active_entry().await?;

        let Some(entry) = entry else {
            if self.session != ActiveSession::Idle {
                info!("Remote service reports nothing running");
            }
            self.session = ActiveSession::Idle;
            self.last_entry_id = None;
            return Ok(());
        };

        let unseen = self.last_entry_id.as_deref() != Some(entry.id.as_str());
        let newer = self
            .session
            .since()
            .map_or(true, |since| entry.started_at > since);

        if unseen || newer {
            let project = entry
                .project_id
                .as_deref()
                .and_then(|id| self.index.code_for(id))
                .map(String::from);
            debug!(
                "Adopting remote entry {} for {project:?} started at {}",
                entry.id, entry.started_at
            );
            self.session = ActiveSession::Active {
                project,
                since: entry.started_at,
            };
            self.last_entry_id = Some(entry.id);
        }
        Ok(())
    }

    /// Time since the anchor, measured with the local clock.
    pub fn elapsed(&self) -> Option<Elapsed> {
        match &self.session {
            ActiveSession::Idle => None,
            ActiveSession::Active { project, since } => Some(Elapsed {
                project: project.clone(),
                duration: self.clock.time() - *since,
            }),
        }
    }
}
