use std::{
    ffi::OsString,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncWriteExt},
};
use tracing::debug;

/// Appends `suffix` to the full file name, so `deck.json` becomes `deck.json.<suffix>`.
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.file_name().map(Into::into).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

/// Reads a file under a shared lock. A missing file reads as `None`.
pub async fn read_locked(path: &Path) -> Result<Option<String>> {
    let mut file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("Failed to open {path:?}")),
    };

    file.lock_shared()?;
    let mut content = String::new();
    let result = file.read_to_string(&mut content).await;
    file.unlock_async().await?;
    result.with_context(|| format!("Failed to read {path:?}"))?;
    Ok(Some(content))
}

/// Replaces the file contents in one step: writes a sibling temporary file under an exclusive
/// lock and renames it over the target, so readers never observe a half-written document.
pub async fn write_atomically(path: &Path, content: &[u8]) -> Result<()> {
    let temporary = with_suffix(path, "tmp");
    let mut file = File::options()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temporary)
        .await
        .with_context(|| format!("Failed to create {temporary:?}"))?;

    file.lock_exclusive()?;
    let result = async {
        file.write_all(content).await?;
        file.flush().await?;
        file.sync_all().await
    }
    .await;
    file.unlock_async().await?;
    drop(file);
    result.with_context(|| format!("Failed to write {temporary:?}"))?;

    tokio::fs::rename(&temporary, path)
        .await
        .with_context(|| format!("Failed to move {temporary:?} to {path:?}"))?;
    debug!("Wrote {} bytes to {path:?}", content.len());
    Ok(())
}

/// Copies the file next to itself as `<name>.<unix seconds>.bak`. Nothing to back up is not an
/// error.
pub async fn backup_file(path: &Path, now: DateTime<Utc>) -> Result<Option<PathBuf>> {
    let backup = with_suffix(path, &format!("{}.bak", now.timestamp()));
    match tokio::fs::copy(path, &backup).await {
        Ok(_) => {
            debug!("Backed up {path:?} to {backup:?}");
            Ok(Some(backup))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to back up {path:?}")),
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::TimeZone;
    use tempfile::tempdir;

    use super::*;

    #[tokio::test]
    async fn test_read_missing_file() -> Result<()> {
        let dir = tempdir()?;
        assert_eq!(read_locked(&dir.path().join("absent.json")).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_write_replaces_content() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("deck.json");

        write_atomically(&path, b"first version, longer").await?;
        write_atomically(&path, b"second").await?;

        assert_eq!(read_locked(&path).await?.as_deref(), Some("second"));
        assert!(!dir.path().join("deck.json.tmp").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_backup_names_by_timestamp() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("deck.json");
        std::fs::write(&path, "{}")?;
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 9, 0, 0).unwrap();

        let backup = backup_file(&path, now).await?.unwrap();

        assert_eq!(
            backup.file_name().unwrap().to_string_lossy(),
            format!("deck.json.{}.bak", now.timestamp())
        );
        assert_eq!(std::fs::read_to_string(backup)?, "{}");
        Ok(())
    }

    #[tokio::test]
    async fn test_backup_of_missing_file() -> Result<()> {
        let dir = tempdir()?;
        let backup = backup_file(&dir.path().join("absent.json"), Utc::now()).await?;
        assert_eq!(backup, None);
        Ok(())
    }
}
