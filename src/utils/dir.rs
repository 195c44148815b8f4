use std::{
    env, io,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Result};

const APPLICATION_NAME: &str = "deckclock";
pub const CONFIG_DIR_VARIABLE: &str = "DECKCLOCK_CONFIG_DIR";

/// Directory holding `config.toml`, `projects.toml` and `assets/`. Not created here: a missing
/// directory means the application was never initialized.
pub fn application_config_path() -> Result<PathBuf> {
    if let Ok(dir) = env::var(CONFIG_DIR_VARIABLE) {
        return Ok(PathBuf::from(dir));
    }

    let mut path = {
        cfg_if::cfg_if! {
            if #[cfg(windows)] {
                env::var("APPDATA")
                    .map(PathBuf::from)
                    .map_err(|_| anyhow!("APPDATA should be present on Windows"))?
            } else {
                env::var("XDG_CONFIG_HOME")
                    .map(PathBuf::from)
                    .or_else(|_| home_relative(".config"))
                    .map_err(|_| anyhow!("Couldn't find neither XDG_CONFIG_HOME nor HOME"))?
            }
        }
    };
    path.push(APPLICATION_NAME);
    Ok(path)
}

/// Directory for logs and rendered icons. Created on demand.
pub fn create_application_state_path() -> Result<PathBuf> {
    let mut path = {
        cfg_if::cfg_if! {
            if #[cfg(windows)] {
                env::var("LOCALAPPDATA")
                    .map(PathBuf::from)
                    .map_err(|_| anyhow!("LOCALAPPDATA should be present on Windows"))?
            } else {
                env::var("XDG_STATE_HOME")
                    .map(PathBuf::from)
                    .or_else(|_| home_relative(".local/state"))
                    .map_err(|_| anyhow!("Couldn't find neither XDG_STATE_HOME nor HOME"))?
            }
        }
    };
    path.push(APPLICATION_NAME);
    create_dir(&path)?;
    Ok(path)
}

/// Deck file the desktop deck application reads on startup.
pub fn default_deck_file() -> Result<PathBuf> {
    home_relative(".streamdeck_ui.json").map_err(|_| anyhow!("HOME is not set"))
}

pub fn create_dir(path: &Path) -> Result<()> {
    match std::fs::create_dir_all(path) {
        Ok(_) => Ok(()),
        Err(v) if v.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(v) => Err(v.into()),
    }
}

fn home_relative(suffix: &str) -> Result<PathBuf, env::VarError> {
    env::var("HOME").map(|home| {
        let mut path = PathBuf::from(home);
        path.push(suffix);
        path
    })
}
