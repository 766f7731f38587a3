/*!
 * FLEET - Registry of every tracked cluster
 *
 * ROLE: add/remove/lookup of cluster records, persistence of the tracked list
 * and lifecycle of the per-cluster monitors.
 *
 * LOCKING:
 * - structural changes (add, remove) and the list persistence they trigger run
 *   under the write lock, so they are serialized with each other and with the
 *   duplicate checks;
 * - lookups take the read lock just long enough to clone the record handle,
 *   refreshes then run without holding it.
 */

use crate::error::MonitorError;
use crate::models::ClusterEndpoint;
use crate::monitor::{self, spawn_monitor};
use crate::pipeline::{self, RefreshContext, RefreshOutcome};
use crate::record::{ClusterRecord, NameRegistry};
use crate::store::{ClusterStore, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct FleetSettings {
    /// Every tracked hostname must end with this
    pub domain: String,
    pub monitor_interval: Duration,
}

impl Default for FleetSettings {
    fn default() -> Self {
        Self { domain: "example.com".into(), monitor_interval: monitor::DEFAULT_INTERVAL }
    }
}

pub struct Fleet {
    records: RwLock<Vec<Arc<ClusterRecord>>>,
    /// Cluster names held by the records above, or by a record being added
    names: Arc<NameRegistry>,
    store: Arc<dyn ClusterStore>,
    ctx: RefreshContext,
    settings: FleetSettings,
}

pub type SharedFleet = Arc<Fleet>;

impl Fleet {
    pub fn new(settings: FleetSettings, ctx: RefreshContext, store: Arc<dyn ClusterStore>) -> Self {
        Self { records: RwLock::new(Vec::new()), names: Arc::new(NameRegistry::default()), store, ctx, settings }
    }

    pub fn settings(&self) -> &FleetSettings {
        &self.settings
    }

    pub fn context(&self) -> &RefreshContext {
        &self.ctx
    }

    /// Restores the persisted list. Every cluster gets an initial refresh and a
    /// monitor, reachable or not: a cluster that is down at startup stays
    /// tracked (under its hostname until it answers).
    pub async fn load(&self) -> Result<usize, MonitorError> {
        let endpoints = self.store.load_cluster_list().await?;

        let mut loaded: Vec<Arc<ClusterRecord>> = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            if loaded.iter().any(|r| r.hostname() == endpoint.hostname) {
                warn!(hostname = %endpoint.hostname, "duplicate entry in cluster list, skipped");
                continue;
            }
            let record = Arc::new(ClusterRecord::with_names(endpoint, self.names.clone()));
            if let Err(e) = pipeline::refresh(&record, &self.ctx).await {
                error!(hostname = %record.hostname(), error = %e, "initial refresh failed");
            }
            loaded.push(record);
        }

        let mut records = self.records.write().await;
        for record in loaded {
            self.start_monitor(&record);
            records.push(record);
        }
        info!(count = records.len(), "fleet loaded");
        Ok(records.len())
    }

    /// Starts tracking a cluster and returns its cluster name.
    pub async fn add(&self, endpoint: ClusterEndpoint) -> Result<String, MonitorError> {
        validate_hostname(&endpoint, &self.settings.domain)?;
        {
            let records = self.records.read().await;
            if let Some(taken) = collision(&records, &endpoint.hostname, None) {
                return Err(already_tracked(&taken));
            }
        }

        // not registered yet: a failure here leaves nothing behind
        let record = Arc::new(ClusterRecord::with_names(endpoint, self.names.clone()));
        if let Err(e) = pipeline::refresh(&record, &self.ctx).await {
            record.release_name();
            return Err(e);
        }
        let name = record.key();

        let mut records = self.records.write().await;
        if let Some(taken) = collision(&records, record.hostname(), Some(&name)) {
            record.release_name();
            return Err(already_tracked(&taken));
        }

        records.push(record.clone());
        if let Err(e) = self.persist(&records).await {
            records.retain(|r| !Arc::ptr_eq(r, &record));
            record.release_name();
            return Err(e.into());
        }
        self.start_monitor(&record);

        info!(cluster = %name, hostname = %record.hostname(), "cluster added");
        Ok(name)
    }

    pub async fn remove(&self, name: &str) -> Result<(), MonitorError> {
        let mut records = self.records.write().await;
        let index = records
            .iter()
            .position(|r| r.answers_to(name))
            .ok_or_else(|| MonitorError::NotFound(name.to_string()))?;

        records[index].cancel_monitor();
        let record = records.remove(index);
        record.release_name();
        self.persist(&records).await?;

        info!(cluster = %name, hostname = %record.hostname(), "cluster removed");
        Ok(())
    }

    /// Refreshes one cluster now, independently of its monitor's schedule.
    pub async fn refresh_now(&self, name: &str) -> Result<RefreshOutcome, MonitorError> {
        let record = self.find(name).await?;
        pipeline::refresh(&record, &self.ctx).await
    }

    /// Pushes the house license to one cluster even if its license is fine.
    pub async fn set_license(&self, name: &str) -> Result<(), MonitorError> {
        let record = self.find(name).await?;
        pipeline::force_license(&record, &self.ctx).await
    }

    pub async fn find(&self, name: &str) -> Result<Arc<ClusterRecord>, MonitorError> {
        self.records
            .read()
            .await
            .iter()
            .find(|r| r.answers_to(name))
            .cloned()
            .ok_or_else(|| MonitorError::NotFound(name.to_string()))
    }

    pub async fn records(&self) -> Vec<Arc<ClusterRecord>> {
        self.records.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Stops every monitor, the tracked list itself is left as is.
    pub async fn shutdown(&self) {
        let records = self.records.read().await;
        let stopped = records.iter().filter(|r| r.cancel_monitor()).count();
        info!(stopped, "monitors cancelled");
    }

    fn start_monitor(&self, record: &Arc<ClusterRecord>) {
        if spawn_monitor(record.clone(), self.ctx.clone(), self.settings.monitor_interval).is_none() {
            warn!(cluster = %record.key(), "monitor already started");
        }
    }

    async fn persist(&self, records: &[Arc<ClusterRecord>]) -> Result<(), StoreError> {
        let endpoints: Vec<ClusterEndpoint> = records.iter().map(|r| r.endpoint().clone()).collect();
        self.store.save_cluster_list(&endpoints).await.inspect_err(|e| {
            error!(error = %e, "failed to save cluster list");
        })
    }
}

fn validate_hostname(endpoint: &ClusterEndpoint, domain: &str) -> Result<(), MonitorError> {
    let host = endpoint.host();
    if host.is_empty() {
        return Err(MonitorError::Validation("hostname is empty".into()));
    }
    if !host.ends_with(domain) {
        return Err(MonitorError::Validation(format!("{} does not end in {}", endpoint.hostname, domain)));
    }
    Ok(())
}

/// Finds a record already tracking `hostname`, or named `name`.
fn collision(records: &[Arc<ClusterRecord>], hostname: &str, name: Option<&str>) -> Option<String> {
    records.iter().find_map(|r| {
        let cluster_name = r.cluster_name();
        let clash = r.hostname() == hostname
            || cluster_name.as_deref() == Some(hostname)
            || (name.is_some() && cluster_name.as_deref() == name);
        clash.then(|| if r.hostname() == hostname { hostname.to_string() } else { r.key() })
    })
}

fn already_tracked(what: &str) -> MonitorError {
    MonitorError::Validation(format!("{what} is already being monitored"))
}
