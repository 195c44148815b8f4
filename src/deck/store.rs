use std::{future::Future, path::PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::fs::operations::{read_locked, write_atomically};

use super::DeckDocument;

/// Where device button state is loaded from and saved to. The sync loop only talks to this
/// interface, so the persisted format can be swapped without touching it.
pub trait DeckStore {
    fn load(&self) -> impl Future<Output = Result<DeckDocument>>;

    fn save(&self, document: &DeckDocument) -> impl Future<Output = Result<()>>;
}

/// JSON deck file shared with the desktop deck application.
pub struct JsonDeckStore {
    path: PathBuf,
}

impl JsonDeckStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl DeckStore for JsonDeckStore {
    async fn load(&self) -> Result<DeckDocument> {
        match read_locked(&self.path).await? {
            Some(raw) => {
                let document = serde_json::from_str::<DeckDocument>(&raw)
                    .with_context(|| format!("Failed to parse deck file {:?}", self.path))?;
                debug!(
                    "Loaded {} devices from {:?}",
                    document.state.len(),
                    self.path
                );
                Ok(document)
            }
            None => {
                info!("Deck file {:?} doesn't exist yet, starting empty", self.path);
                Ok(DeckDocument::default())
            }
        }
    }

    async fn save(&self, document: &DeckDocument) -> Result<()> {
        let raw = serde_json::to_vec_pretty(document)?;
        write_atomically(&self.path, &raw).await
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use serde_json::json;
    use tempfile::tempdir;

    use super::*;
    use crate::deck::DeviceState;

    #[tokio::test]
    async fn test_missing_file_is_empty() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonDeckStore::new(dir.path().join("deck.json"));
        assert_eq!(store.load().await?, DeckDocument::default());
        Ok(())
    }

    #[tokio::test]
    async fn test_save_then_load() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonDeckStore::new(dir.path().join("deck.json"));
        let mut document = DeckDocument::default();
        document.extra.insert("streamdeck_ui_version".into(), json!(1));
        let mut device = DeviceState::default();
        device.button_mut(0, 3).text = Some("ABC".into());
        document.state.insert("AL12".into(), device);

        store.save(&document).await?;
        let first = std::fs::read(store.path())?;
        store.save(&store.load().await?).await?;

        assert_eq!(store.load().await?, document);
        assert_eq!(std::fs::read(store.path())?, first);
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_file_is_an_error() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("deck.json");
        std::fs::write(&path, "{ not json")?;
        assert!(JsonDeckStore::new(path).load().await.is_err());
        Ok(())
    }
}
