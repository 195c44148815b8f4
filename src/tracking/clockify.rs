use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{header, Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::{
    config::ClockifyConfig,
    registry::Rgb,
    utils::clock::{Clock, DefaultClock},
};

use super::{ActiveEntry, RemoteProject, TimeTrackingClient};

const DEFAULT_CLOCKIFY_API_URL: &str = "https://api.clockify.me/api/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const ACTIVE_MEMBERSHIP: &str = "ACTIVE";

pub struct ClockifyClient {
    api_url: String,
    workspace_id: String,
    client: Client,
    user_id: OnceCell<String>,
    clock: Box<dyn Clock>,
}

impl ClockifyClient {
    pub fn new(config: ClockifyConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        let key = header::HeaderValue::from_str(config.api_key.trim())
            .context("Clockify API key is not a valid header value")?;
        headers.insert("X-Api-Key", key);
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .context("Failed to build Clockify HTTP client")?;

        Ok(Self {
            api_url: config
                .api_url
                .unwrap_or_else(|| DEFAULT_CLOCKIFY_API_URL.to_owned()),
            workspace_id: config.workspace_id,
            client,
            user_id: OnceCell::new(),
            clock: Box::new(DefaultClock),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        let base = self.api_url.trim_end_matches('/');
        let suffix = path.trim_start_matches('/');
        format!("{base}/{suffix}")
    }

    async fn request_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await.context("Clockify request failed")?;
        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read Clockify response")?;

        if !status.is_success() {
            bail!("Clockify request failed with status {status}: {body}");
        }

        serde_json::from_str(&body)
            .with_context(|| format!("Clockify response was malformed JSON: {body}"))
    }

    async fn user_id(&self) -> Result<&str> {
        let id = self
            .user_id
            .get_or_try_init(|| async {
                let user: UserDto = self.request_json(self.client.get(self.endpoint("user"))).await?;
                debug!("Resolved Clockify user {}", user.id);
                Ok::<_, anyhow::Error>(user.id)
            })
            .await?;
        Ok(id.as_str())
    }
}

#[async_trait]
impl TimeTrackingClient for ClockifyClient {
    async fn list_projects(&self) -> Result<Vec<RemoteProject>> {
        let url = self.endpoint(&format!("workspaces/{}/projects", self.workspace_id));
        let projects: Vec<ProjectDto> = self.request_json(self.client.get(url)).await?;
        Ok(projects.into_iter().map(RemoteProject::from).collect())
    }

    async fn get_active_entry(&self) -> Result<Option<ActiveEntry>> {
        let user_id = self.user_id().await?;
        let url = self.endpoint(&format!(
            "workspaces/{}/user/{user_id}/time-entries",
            self.workspace_id
        ));
        let entries: Vec<TimeEntryDto> = self
            .request_json(self.client.get(url).query(&[("in-progress", "true")]))
            .await?;
        first_active(entries)
    }

    async fn start_entry(&self, description: &str, project_id: &str) -> Result<String> {
        let url = self.endpoint(&format!("workspaces/{}/time-entries", self.workspace_id));
        let body = json!({
            "description": description,
            "projectId": project_id,
            "start": format_timestamp(self.clock.time()),
        });
        let entry: TimeEntryDto = self.request_json(self.client.post(url).json(&body)).await?;
        Ok(entry.id)
    }

    async fn stop_entry(&self) -> Result<()> {
        let user_id = self.user_id().await?;
        let url = self.endpoint(&format!(
            "workspaces/{}/user/{user_id}/time-entries",
            self.workspace_id
        ));
        let body = json!({ "end": format_timestamp(self.clock.time()) });
        let response = self
            .client
            .patch(url)
            .json(&body)
            .send()
            .await
            .context("Clockify request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Clockify stop failed with status {status}: {body}"));
        }
        Ok(())
    }
}

/// Clockify expects whole seconds with a `Z` suffix.
fn format_timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[derive(Debug, Deserialize)]
struct UserDto {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MembershipDto {
    #[serde(default)]
    membership_status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectDto {
    id: String,
    name: String,
    #[serde(default)]
    color: Option<String>,
    /// Projects that don't say otherwise are treated as archived.
    #[serde(default = "archived_by_default")]
    archived: bool,
    #[serde(default)]
    memberships: Vec<MembershipDto>,
}

fn archived_by_default() -> bool {
    true
}

impl From<ProjectDto> for RemoteProject {
    fn from(dto: ProjectDto) -> Self {
        let colour = dto.color.as_deref().and_then(|c| {
            c.parse::<Rgb>()
                .inspect_err(|e| warn!("Ignoring colour of project {}: {e}", dto.name))
                .ok()
        });
        let active_member = dto
            .memberships
            .first()
            .and_then(|m| m.membership_status.as_deref())
            == Some(ACTIVE_MEMBERSHIP);
        RemoteProject {
            id: dto.id,
            name: dto.name,
            colour,
            archived: dto.archived,
            active_member,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimeIntervalDto {
    #[serde(default)]
    start: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimeEntryDto {
    id: String,
    #[serde(default)]
    project_id: Option<String>,
    #[serde(default)]
    time_interval: Option<TimeIntervalDto>,
}

impl TimeEntryDto {
    fn into_active(self) -> Result<ActiveEntry> {
        let started_at = self
            .time_interval
            .and_then(|interval| interval.start)
            .ok_or_else(|| anyhow!("Running entry {} has no start", self.id))?;
        Ok(ActiveEntry {
            id: self.id,
            project_id: self.project_id,
            started_at,
        })
    }
}

/// The service lists at most one running entry per user. One without a start is an error rather
/// than nothing running, so callers keep what they knew.
fn first_active(entries: Vec<TimeEntryDto>) -> Result<Option<ActiveEntry>> {
    entries
        .into_iter()
        .next()
        .map(TimeEntryDto::into_active)
        .transpose()
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_format_timestamp() {
        let time = Utc.with_ymd_and_hms(2024, 3, 5, 9, 7, 1).unwrap()
            + chrono::Duration::milliseconds(250);
        assert_eq!(format_timestamp(time), "2024-03-05T09:07:01Z");
    }

    #[test]
    fn test_project_conversion() -> Result<()> {
        let projects: Vec<ProjectDto> = serde_json::from_str(
            r##"[
                {"id": "p1", "name": "Research", "color": "#1F77B4", "archived": false,
                 "memberships": [{"membershipStatus": "ACTIVE"}]},
                {"id": "p2", "name": "Old", "color": "not a colour",
                 "memberships": [{"membershipStatus": "INACTIVE"}]}
            ]"##,
        )?;
        let projects: Vec<RemoteProject> = projects.into_iter().map(Into::into).collect();

        assert_eq!(
            projects[0],
            RemoteProject {
                id: "p1".into(),
                name: "Research".into(),
                colour: Some(Rgb(0x1f, 0x77, 0xb4)),
                archived: false,
                active_member: true,
            }
        );
        assert_eq!(projects[1].colour, None);
        assert!(projects[1].archived);
        assert!(!projects[1].active_member);
        Ok(())
    }

    #[test]
    fn test_active_entry_conversion() -> Result<()> {
        let entries: Vec<TimeEntryDto> = serde_json::from_str(
            r#"[
                {"id": "e1", "projectId": "p1", "timeInterval": {"start": "2024-03-05T09:00:00Z", "end": null}},
                {"id": "e2", "description": "no interval"}
            ]"#,
        )?;

        assert_eq!(
            first_active(entries)?,
            Some(ActiveEntry {
                id: "e1".into(),
                project_id: Some("p1".into()),
                started_at: Utc.with_ymd_and_hms(2024, 3, 5, 9, 0, 0).unwrap(),
            })
        );
        assert_eq!(first_active(Vec::new())?, None);
        Ok(())
    }

    #[test]
    fn test_running_entry_without_start_is_an_error() -> Result<()> {
        let entries: Vec<TimeEntryDto> = serde_json::from_str(
            r#"[{"id": "e2", "projectId": "p1", "timeInterval": {"start": null}}]"#,
        )?;

        let error = first_active(entries).unwrap_err();

        assert!(error.to_string().contains("e2"));
        Ok(())
    }

    #[test]
    fn test_endpoint_joins_paths() -> Result<()> {
        let client = ClockifyClient::new(ClockifyConfig {
            api_key: "key".into(),
            workspace_id: "ws".into(),
            api_url: Some("http://localhost:9000/api/".into()),
        })?;
        assert_eq!(
            client.endpoint("/workspaces/ws/projects"),
            "http://localhost:9000/api/workspaces/ws/projects"
        );
        Ok(())
    }
}
