use thiserror::Error;

/// Snapshot errors
///
/// A walk never fails; only resolving a configuration can.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Invalid class pattern: {0}")]
    InvalidRegex(#[from] regex::Error),

    #[error("Invalid option {name}: {value}")]
    InvalidOption { name: String, value: String },

    #[error("Config parse error: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SnapshotError>;
