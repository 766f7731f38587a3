use crate::models::{LicenseEnvelope, LicenseSnapshot};
use crate::store::StoreError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Supplies the house license pushed to clusters that need a new one.
#[async_trait]
pub trait LicenseSource: Send + Sync {
    async fn license_bytes(&self) -> Result<Vec<u8>, StoreError>;
}

/// License file on local disk, re-read on every push so a replaced file is
/// picked up without a restart.
#[derive(Debug, Clone)]
pub struct LicenseFile {
    path: PathBuf,
}

impl LicenseFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parses the file for display purposes.
    pub async fn snapshot(&self) -> Result<LicenseSnapshot, StoreError> {
        let bytes = self.license_bytes().await?;
        let envelope: LicenseEnvelope =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::json(&self.path, e))?;
        Ok(envelope.license)
    }
}

#[async_trait]
impl LicenseSource for LicenseFile {
    async fn license_bytes(&self) -> Result<Vec<u8>, StoreError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|e| StoreError::io(&self.path, e))
    }
}
