use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::warn;

use crate::{
    config::{load_config, ConfigPaths},
    registry::ProjectRegistry,
    tracking::{
        create_client,
        toggle::{ToggleOutcome, ToggleStateMachine},
    },
    utils::clock::DefaultClock,
};

pub async fn process_toggle_command(paths: &ConfigPaths, project: &str) -> Result<()> {
    let config = load_config(paths)?;
    let registry = Arc::new(ProjectRegistry::load(paths)?);
    let mut machine = ToggleStateMachine::new(
        create_client(&config)?,
        registry,
        config.entry_description.clone(),
        Box::new(DefaultClock),
    );
    machine.initialize().await?;

    let outcome = toggle_once(&mut machine, project).await;
    report(outcome)
}

/// Syncs with the service before toggling so the outcome reflects what actually runs there.
async fn toggle_once(machine: &mut ToggleStateMachine, project: &str) -> ToggleOutcome {
    if let Err(e) = machine.refresh().await {
        warn!("Couldn't fetch the running entry: {e:#}");
    }
    machine.toggle(project).await
}

fn report(outcome: ToggleOutcome) -> Result<()> {
    match outcome {
        ToggleOutcome::Started(code) => println!("Started {code}"),
        ToggleOutcome::Stopped => println!("Stopped"),
        ToggleOutcome::UnknownProject(code) => bail!("Unknown project {code:?}"),
        ToggleOutcome::ToggleFailed { reason } => bail!("Toggle failed: {reason}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use chrono::Utc;

    use super::*;
    use crate::{
        registry::{PageDefinition, ProjectDefinition, ProjectsDocument},
        tracking::{MockTimeTrackingClient, RemoteProject},
        utils::{clock::test_clock::ManualClock, logging::TEST_LOGGING},
    };

    async fn machine(mut client: MockTimeTrackingClient) -> ToggleStateMachine {
        *TEST_LOGGING;
        client.expect_list_projects().returning(|| {
            Ok(vec![RemoteProject {
                id: "p-a".into(),
                name: "Alpha".into(),
                colour: None,
                archived: false,
                active_member: true,
            }])
        });
        let mut document = ProjectsDocument::default();
        document
            .projects
            .insert("A".into(), ProjectDefinition::Name("Alpha".into()));
        document.page = PageDefinition {
            entries: vec!["A".into()],
        };
        let registry = Arc::new(ProjectRegistry::from_document(document).unwrap());
        let mut machine = ToggleStateMachine::new(
            Box::new(client),
            registry,
            "(to fill in)".into(),
            Box::new(ManualClock::new(Utc::now())),
        );
        machine.initialize().await.unwrap();
        machine
    }

    #[tokio::test]
    async fn test_toggle_survives_refresh_failure() {
        let mut client = MockTimeTrackingClient::new();
        client
            .expect_get_active_entry()
            .returning(|| Err(anyhow!("timeout")));
        client
            .expect_start_entry()
            .times(1)
            .returning(|_, _| Ok("e1".into()));
        let mut machine = machine(client).await;

        let outcome = toggle_once(&mut machine, "A").await;

        assert_eq!(outcome, ToggleOutcome::Started("A".into()));
    }

    #[tokio::test]
    async fn test_stop_sentinel() {
        let mut client = MockTimeTrackingClient::new();
        client.expect_get_active_entry().returning(|| Ok(None));
        client.expect_stop_entry().times(1).returning(|| Ok(()));
        let mut machine = machine(client).await;

        assert_eq!(toggle_once(&mut machine, "NONE").await, ToggleOutcome::Stopped);
    }

    #[test]
    fn test_failures_are_errors() {
        assert!(report(ToggleOutcome::Started("A".into())).is_ok());
        assert!(report(ToggleOutcome::Stopped).is_ok());
        assert!(report(ToggleOutcome::UnknownProject("Z".into())).is_err());
        assert!(report(ToggleOutcome::ToggleFailed {
            reason: "503".into()
        })
        .is_err());
    }
}
