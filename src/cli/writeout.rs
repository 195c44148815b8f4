use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::info;

use crate::{
    config::{load_config, AppConfig, ConfigPaths},
    daemon::ICON_DIR,
    deck::{
        merge::StateMerger,
        store::{DeckStore, JsonDeckStore},
    },
    fs::operations::backup_file,
    registry::ProjectRegistry,
    render::PngRenderer,
    utils::clock::{Clock, DefaultClock},
};

pub async fn process_writeout_command(
    paths: &ConfigPaths,
    deck_file: PathBuf,
    output: Option<PathBuf>,
    state_dir: &Path,
) -> Result<()> {
    let config = load_config(paths)?;
    let mut registry = ProjectRegistry::load(paths)?;
    let mut renderer = PngRenderer::new(state_dir.join(ICON_DIR))?;
    registry.resolve_images(&paths.assets_dir(), &mut renderer);

    let output = JsonDeckStore::new(output.unwrap_or_else(|| deck_file.clone()));
    let written = writeout(
        &registry,
        &config,
        &JsonDeckStore::new(deck_file),
        &output,
        &DefaultClock,
    )
    .await?;

    if written {
        println!("Wrote {}", output.path().display());
    } else {
        println!("{} is up to date", output.path().display());
    }
    Ok(())
}

/// Backs up the input, merges the project pages into every device and saves the result unless
/// the output already holds it. Returns whether anything was written.
async fn writeout(
    registry: &ProjectRegistry,
    config: &AppConfig,
    input: &JsonDeckStore,
    output: &impl DeckStore,
    clock: &dyn Clock,
) -> Result<bool> {
    if let Some(backup) = backup_file(input.path(), clock.time()).await? {
        info!("Backed up deck file to {backup:?}");
    }

    let mut document = input.load().await?;
    StateMerger::new(registry).merge_document(
        &mut document,
        &config.devices,
        config.default_layout,
    )?;

    if output.load().await? == document {
        return Ok(false);
    }
    output.save(&document).await?;
    Ok(true)
}
