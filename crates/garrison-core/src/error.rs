//! Error types for Garrison

use std::path::PathBuf;

/// Garrison error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Server not found: {0}")]
    ServerNotFound(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Already in progress: {0}")]
    AlreadyInProgress(String),

    #[error("Failed to spawn process: {0}")]
    SpawnFailed(String),

    #[error("Server not running: {0}")]
    NotRunning(String),

    #[error("File is too large to open: {0}")]
    FileTooLarge(PathBuf),

    #[error("Daemon not running")]
    DaemonNotRunning,

    #[error("Daemon already running")]
    DaemonAlreadyRunning,

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("IPC error: {0}")]
    IpcError(String),

    #[error("IPC connection failed: {0}")]
    IpcConnectionFailed(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for Garrison
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::ConfigError(msg.into())
    }

    pub fn ipc<S: Into<String>>(msg: S) -> Self {
        Error::IpcError(msg.into())
    }

    pub fn spawn<S: Into<String>>(msg: S) -> Self {
        Error::SpawnFailed(msg.into())
    }

    pub fn denied<S: Into<String>>(msg: S) -> Self {
        Error::AccessDenied(msg.into())
    }
}
