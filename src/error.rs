use std::path::PathBuf;
use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Failed to serialize config: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Queue state error: {0}")]
    State(String),

    #[error("Staging error for {path}: {message}")]
    Staging { path: PathBuf, message: String },
}

/// Errors raised while probing media properties.
///
/// `ToolNotFound` is fatal for a whole verification run: without the probing
/// tool no file can be compared at all. The other variants affect only the
/// single file being probed.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("ffprobe command not found")]
    ToolNotFound,

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("ffprobe failed: {0}")]
    Failed(String),

    #[error("Failed to parse ffprobe output: {0}")]
    Parse(String),
}
