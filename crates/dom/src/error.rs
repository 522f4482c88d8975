//! Error types for live DOM reads
//!
//! Simple, flat error hierarchy. No over-engineering.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DomError>;

#[derive(Debug, Error)]
pub enum DomError {
    #[error("Node not found: {0}")]
    NodeNotFound(u32),

    #[error("Invalid node type: expected {expected}, got {actual}")]
    InvalidNodeType { expected: String, actual: String },

    /// Cross-origin stylesheet, subdocument or tainted canvas
    #[error("Security error: {0}")]
    Security(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Encoding error: {0}")]
    Encode(String),

    #[error("CDP protocol error: {0}")]
    CdpError(String),

    #[error("Parse error: {0}")]
    ParseError(#[from] serde_json::Error),
}
