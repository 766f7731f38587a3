use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct KernelConfig {
    /// Only hostnames under this domain can be tracked
    pub domain: String,
    /// Persisted list of tracked clusters
    pub cluster_path: PathBuf,
    /// House license pushed to clusters needing one
    pub license_path: PathBuf,
    pub listen: String,
    pub monitor_interval_secs: u64,
    /// Port used when a hostname does not carry one
    pub cluster_port: u16,
    pub request_timeout_secs: u64,
    pub default_username: String,
    pub default_password: String,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            domain: "example.com".into(),
            cluster_path: PathBuf::from("config/clusters.json"),
            license_path: PathBuf::from("license.json"),
            listen: "0.0.0.0:8080".into(),
            monitor_interval_secs: 3600,
            cluster_port: crate::client::DEFAULT_PORT,
            request_timeout_secs: 30,
            default_username: "elastic".into(),
            default_password: "changeme".into(),
        }
    }
}

impl KernelConfig {
    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs.max(60))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn apply_env(&mut self, domain: Option<String>) {
        if let Some(domain) = domain.filter(|d| !d.is_empty()) {
            self.domain = domain;
        }
    }
}

/// Reads `LICWATCH_CONFIG` (default `licwatch.yaml`); a missing or broken file
/// means defaults. `DOMAIN` overrides the configured domain.
pub async fn load_config() -> KernelConfig {
    let path = std::env::var("LICWATCH_CONFIG").unwrap_or_else(|_| "licwatch.yaml".into());
    let mut cfg = read_config_file(Path::new(&path)).await;
    cfg.apply_env(std::env::var("DOMAIN").ok());
    cfg
}

async fn read_config_file(path: &Path) -> KernelConfig {
    if !path.exists() {
        info!(path = %path.display(), "no config file, using defaults");
        return KernelConfig::default();
    }
    let txt = fs::read_to_string(path).await.unwrap_or_default();
    if txt.trim().is_empty() {
        return KernelConfig::default();
    }
    serde_yaml::from_str(&txt).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "invalid config, using defaults");
        KernelConfig::default()
    })
}
