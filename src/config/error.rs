use std::path::PathBuf;

use thiserror::Error;

/// Failures reading persisted configuration that callers need to tell apart.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration directory or one of its documents is missing. There is no sensible default
    /// registry, so this is a hard stop until `deckclock init` has been run.
    #[error("Not initialized: {path:?} is missing")]
    NotInitialized { path: PathBuf },
    #[error("Page entry {0:?} has no matching project definition")]
    UnknownEntry(String),
    #[error("Page entry {0:?} is listed more than once")]
    DuplicateEntry(String),
    #[error("Invalid colour {0:?}, expected six hex digits such as \"ff8800\"")]
    InvalidColour(String),
    #[error("Backend {0} is selected but its [{0}] section is missing")]
    MissingBackendSection(&'static str),
}
