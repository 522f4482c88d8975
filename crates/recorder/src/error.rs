use snapshot::SnapshotError;
use thiserror::Error;

/// Recorder errors
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("Invalid snapshot config: {0}")]
    Config(#[from] SnapshotError),

    #[error("Config parse error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RecorderError>;
