use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::info;

use crate::{
    config::{save_config, AppConfig, ClockifyConfig, ConfigPaths},
    fs::operations::{backup_file, write_atomically},
    registry::{ProjectDefinition, ProjectsDocument},
    tracking::{create_client, RemoteProject, TimeTrackingClient},
    utils::dir::create_dir,
};

pub async fn process_init_command(
    paths: &ConfigPaths,
    api_key: String,
    workspace_id: String,
) -> Result<()> {
    let config = AppConfig::with_clockify(ClockifyConfig {
        api_key,
        workspace_id,
        api_url: None,
    });
    let client = create_client(&config)?;
    let count = initialize(paths, &config, client.as_ref(), Utc::now()).await?;
    println!(
        "Wrote {} with {count} projects. Edit the page entries to choose what shows on the deck.",
        paths.projects_file().display()
    );
    Ok(())
}

/// Writes the configuration and a registry with every project the user can track time on.
/// An existing registry is backed up first. Returns the number of projects written.
async fn initialize(
    paths: &ConfigPaths,
    config: &AppConfig,
    client: &dyn TimeTrackingClient,
    now: DateTime<Utc>,
) -> Result<usize> {
    create_dir(&paths.dir)?;
    save_config(paths, config)?;
    create_dir(&paths.assets_dir())?;
    info!("Wrote {:?}", paths.config_file());

    let remote = client
        .list_projects()
        .await
        .context("Couldn't list workspace projects")?;
    let document = projects_document(&remote);

    let projects_file = paths.projects_file();
    if let Some(backup) = backup_file(&projects_file, now).await? {
        info!("Backed up previous registry to {backup:?}");
    }
    write_atomically(&projects_file, toml::to_string_pretty(&document)?.as_bytes()).await?;
    Ok(document.page.entries.len())
}

/// Registry of the non-archived projects the user is an active member of, keyed and ordered by
/// their remote name.
fn projects_document(remote: &[RemoteProject]) -> ProjectsDocument {
    let mut document = ProjectsDocument::default();
    let mut seen = HashSet::new();
    for project in remote
        .iter()
        .filter(|p| !p.archived && p.active_member)
    {
        if !seen.insert(project.name.as_str()) {
            continue;
        }
        let definition = match project.colour {
            Some(colour) => ProjectDefinition::Full {
                name: project.name.clone(),
                colour: Some(colour.to_string()),
            },
            None => ProjectDefinition::Name(project.name.clone()),
        };
        document.projects.insert(project.name.clone(), definition);
        document.page.entries.push(project.name.clone());
    }
    document
}
