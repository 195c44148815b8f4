//! The `ui` command: keeps the deck in sync with the time tracking service and turns key presses
//! into toggles until interrupted.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Result;
use session::DeckSession;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    config::{AppConfig, ConfigPaths},
    deck::{status::ElapsedTimeEngine, store::JsonDeckStore},
    registry::ProjectRegistry,
    render::PngRenderer,
    tracking::{create_client, toggle::ToggleStateMachine},
    utils::clock::DefaultClock,
};

pub mod keys;
pub mod session;
pub mod shutdown;

pub const ICON_DIR: &str = "icons";
const DEFAULT_ICON: &str = "logo.png";
const KEY_PRESS_BUFFER: usize = 16;

/// Represents the starting point of the sync loop. Key presses are read from stdin.
pub async fn start_daemon(
    config: AppConfig,
    paths: ConfigPaths,
    deck_file: PathBuf,
    state_dir: PathBuf,
) -> Result<()> {
    let mut registry = ProjectRegistry::load(&paths)?;
    let mut renderer = PngRenderer::new(state_dir.join(ICON_DIR))?;
    registry.resolve_images(&paths.assets_dir(), &mut renderer);
    let registry = Arc::new(registry);

    let mut machine = ToggleStateMachine::new(
        create_client(&config)?,
        registry.clone(),
        config.entry_description.clone(),
        Box::new(DefaultClock),
    );
    machine.initialize().await?;

    let engine = ElapsedTimeEngine::new(
        Box::new(renderer),
        config.neutral_label.clone(),
        default_icon(&paths.assets_dir()),
    );

    let (sender, receiver) = mpsc::channel(KEY_PRESS_BUFFER);
    let shutdown_token = CancellationToken::new();
    info!("Syncing deck file {deck_file:?}");
    let session = DeckSession::new(
        machine,
        engine,
        registry,
        JsonDeckStore::new(deck_file),
        &config,
        receiver,
        shutdown_token.clone(),
    );

    let (_, forwarding_result, session_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        keys::forward_key_presses(tokio::io::stdin(), sender, shutdown_token.clone()),
        async {
            let result = session.run().await;
            shutdown_token.cancel();
            result
        },
    );

    if let Err(e) = forwarding_result {
        error!("Key press forwarding got an error {e:?}");
    }
    session_result
}

/// Icon shown on the status button while nothing runs.
fn default_icon(assets_dir: &Path) -> Option<String> {
    let path = assets_dir.join(DEFAULT_ICON);
    path.is_file()
        .then(|| path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_default_icon_only_when_present() -> Result<()> {
        let dir = tempdir()?;
        assert_eq!(default_icon(dir.path()), None);

        std::fs::write(dir.path().join("logo.png"), b"png")?;
        assert_eq!(
            default_icon(dir.path()),
            Some(dir.path().join("logo.png").to_string_lossy().into_owned())
        );
        Ok(())
    }
}
