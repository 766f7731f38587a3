use crate::models::ClusterEndpoint;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io { path: path.to_path_buf(), source }
    }

    pub(crate) fn json(path: &Path, source: serde_json::Error) -> Self {
        StoreError::Json { path: path.to_path_buf(), source }
    }
}

/// Where the tracked cluster list lives between restarts.
#[async_trait]
pub trait ClusterStore: Send + Sync {
    async fn load_cluster_list(&self) -> Result<Vec<ClusterEndpoint>, StoreError>;

    async fn save_cluster_list(&self, clusters: &[ClusterEndpoint]) -> Result<(), StoreError>;
}

/// Cluster list kept as a pretty-printed JSON array.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ClusterStore for JsonFileStore {
    async fn load_cluster_list(&self) -> Result<Vec<ClusterEndpoint>, StoreError> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "no cluster list yet, starting empty");
            return Ok(Vec::new());
        }

        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| StoreError::io(&self.path, e))?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        let clusters: Vec<ClusterEndpoint> =
            serde_json::from_str(&content).map_err(|e| StoreError::json(&self.path, e))?;

        info!(count = clusters.len(), path = %self.path.display(), "loaded cluster list");
        Ok(clusters)
    }

    async fn save_cluster_list(&self, clusters: &[ClusterEndpoint]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent, e))?;
        }

        let content = serde_json::to_string_pretty(clusters).map_err(|e| StoreError::json(&self.path, e))?;
        // write aside then rename, a crash never leaves a truncated list
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| StoreError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StoreError::io(&self.path, e))?;

        debug!(count = clusters.len(), path = %self.path.display(), "saved cluster list");
        Ok(())
    }
}
