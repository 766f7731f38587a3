use crate::client::ClientError;
use crate::store::StoreError;

/// Errors surfaced by fleet operations and the refresh pipeline
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// Bad hostname, foreign domain or cluster already tracked
    #[error("{0}")]
    Validation(String),
    #[error("no such cluster: {0}")]
    NotFound(String),
    #[error(transparent)]
    Transport(#[from] ClientError),
    #[error(transparent)]
    Persistence(#[from] StoreError),
    #[error("cluster {cluster} did not accept the license")]
    LicenseRejected { cluster: String },
}

impl MonitorError {
    /// Caller mistakes as opposed to failures of the system or its peers.
    pub fn is_client_error(&self) -> bool {
        matches!(self, MonitorError::Validation(_) | MonitorError::NotFound(_))
    }
}
