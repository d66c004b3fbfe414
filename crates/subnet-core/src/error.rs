use thiserror::Error;

use crate::NetUid;

/// Errors surfaced by the epoch engine and its host collaborators.
///
/// Stage-internal anomalies (degenerate math, malformed weight rows) are
/// recovered locally and never appear here. Only registry and persistence
/// failures abort an epoch.
#[derive(Debug, Error)]
pub enum EpochError {
    /// The registry has no subnet with this id.
    #[error("Subnet not found: {0}")]
    SubnetNotFound(NetUid),

    /// Registry read failure (participants, weights, parameters).
    #[error("Registry error: {0}")]
    Registry(String),

    /// Write-back of epoch state failed. The previous bonds stay authoritative.
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for EpochError {
    fn from(e: serde_json::Error) -> Self {
        EpochError::Serialization(e.to_string())
    }
}
