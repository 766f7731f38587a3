/*!
 * CLUSTER RECORD - State of one tracked cluster
 *
 * ROLE: identity and credentials of the cluster, last observed health and
 * license, and the cancellation handle of its monitor.
 *
 * CONCURRENCY: a record is shared (Arc) between the fleet, its monitor task and
 * any administrative request touching it. Observed state sits behind a
 * per-record lock that is only taken to apply results, never across a network
 * call. Each field group keeps the instant it was observed and an older
 * observation is dropped instead of overwriting a newer one.
 */

use crate::error::MonitorError;
use crate::models::{ClusterEndpoint, ClusterStatus, LicenseSnapshot};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::{oneshot, watch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorState {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observed<T> {
    pub value: T,
    pub observed_at: OffsetDateTime,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservedState {
    pub status: Option<Observed<ClusterStatus>>,
    pub license: Option<Observed<LicenseSnapshot>>,
}

/// Cluster names held by the records of one fleet. A name is claimed by the
/// record applying it and stays held until that record renames or releases it.
#[derive(Debug, Default)]
pub struct NameRegistry {
    next_id: AtomicU64,
    held: Mutex<Held>,
}

#[derive(Debug, Default)]
struct Held {
    names: HashMap<String, (u64, String)>,
    /// Records that left the fleet, a refresh still in flight must not claim
    retired: HashSet<u64>,
}

impl NameRegistry {
    fn issue_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Hostname of the record holding `name`, if any.
    pub fn holder(&self, name: &str) -> Option<String> {
        self.held.lock().names.get(name).map(|(_, hostname)| hostname.clone())
    }

    fn claim(&self, id: u64, hostname: &str, name: &str, previous: Option<&str>) -> Result<(), MonitorError> {
        let mut held = self.held.lock();
        if held.retired.contains(&id) {
            return Err(MonitorError::NotFound(hostname.to_string()));
        }
        match held.names.get(name) {
            Some((owner, other)) if *owner != id => {
                return Err(MonitorError::Validation(format!(
                    "{hostname} reports cluster {name}, already being monitored through {other}"
                )));
            }
            Some(_) => return Ok(()),
            None => {}
        }
        if let Some(previous) = previous {
            if held.names.get(previous).is_some_and(|(owner, _)| *owner == id) {
                held.names.remove(previous);
            }
        }
        held.names.insert(name.to_string(), (id, hostname.to_string()));
        Ok(())
    }

    fn release(&self, id: u64) {
        let mut held = self.held.lock();
        held.names.retain(|_, (owner, _)| *owner != id);
        held.retired.insert(id);
    }
}

pub struct ClusterRecord {
    id: u64,
    names: Arc<NameRegistry>,
    endpoint: ClusterEndpoint,
    observed: Mutex<ObservedState>,
    cancel: Mutex<Option<oneshot::Sender<()>>>,
    monitor_state: watch::Sender<MonitorState>,
}

impl ClusterRecord {
    /// Standalone record with a registry of its own.
    pub fn new(endpoint: ClusterEndpoint) -> Self {
        Self::with_names(endpoint, Arc::new(NameRegistry::default()))
    }

    /// Record whose cluster name must stay unique within `names`.
    pub fn with_names(endpoint: ClusterEndpoint, names: Arc<NameRegistry>) -> Self {
        let (monitor_state, _) = watch::channel(MonitorState::Idle);
        Self {
            id: names.issue_id(),
            names,
            endpoint,
            observed: Mutex::new(ObservedState::default()),
            cancel: Mutex::new(None),
            monitor_state,
        }
    }

    pub fn endpoint(&self) -> &ClusterEndpoint {
        &self.endpoint
    }

    pub fn hostname(&self) -> &str {
        &self.endpoint.hostname
    }

    pub fn cluster_name(&self) -> Option<String> {
        self.observed.lock().status.as_ref().map(|s| s.value.cluster_name.clone())
    }

    /// Name the record is addressed by: the cluster name once known, the
    /// hostname before the first successful status fetch.
    pub fn key(&self) -> String {
        self.cluster_name().unwrap_or_else(|| self.endpoint.hostname.clone())
    }

    pub fn answers_to(&self, name: &str) -> bool {
        match self.cluster_name() {
            Some(cluster_name) => cluster_name == name,
            None => self.endpoint.hostname == name,
        }
    }

    pub fn observed(&self) -> ObservedState {
        self.observed.lock().clone()
    }

    pub fn license(&self) -> Option<LicenseSnapshot> {
        self.observed.lock().license.as_ref().map(|l| l.value.clone())
    }

    /// Returns `Ok(false)` when a newer status was already applied, and a
    /// validation error when another record of the registry holds the
    /// reported cluster name (nothing is applied then).
    pub fn apply_status(&self, status: ClusterStatus, observed_at: OffsetDateTime) -> Result<bool, MonitorError> {
        let mut observed = self.observed.lock();
        if observed.status.as_ref().is_some_and(|current| current.observed_at > observed_at) {
            return Ok(false);
        }
        let previous = observed.status.as_ref().map(|s| s.value.cluster_name.as_str());
        if previous != Some(status.cluster_name.as_str()) {
            self.names.claim(self.id, &self.endpoint.hostname, &status.cluster_name, previous)?;
        }
        observed.status = Some(Observed { value: status, observed_at });
        Ok(true)
    }

    /// Gives up the cluster name, once the record leaves its fleet.
    pub fn release_name(&self) {
        self.names.release(self.id);
    }

    /// Returns false when a newer license was already applied.
    pub fn apply_license(&self, license: LicenseSnapshot, observed_at: OffsetDateTime) -> bool {
        let mut observed = self.observed.lock();
        if observed.license.as_ref().is_some_and(|current| current.observed_at > observed_at) {
            return false;
        }
        observed.license = Some(Observed { value: license, observed_at });
        true
    }

    /// Installs a fresh cancellation handle and moves the monitor to Running.
    /// A record is armed at most once in its life.
    pub(crate) fn arm_monitor(&self) -> Option<oneshot::Receiver<()>> {
        let mut cancel = self.cancel.lock();
        if cancel.is_some() || *self.monitor_state.borrow() != MonitorState::Idle {
            return None;
        }
        let (tx, rx) = oneshot::channel();
        *cancel = Some(tx);
        self.monitor_state.send_replace(MonitorState::Running);
        Some(rx)
    }

    /// Signals the monitor to stop. Only the first call sends anything; later
    /// calls return false.
    pub fn cancel_monitor(&self) -> bool {
        match self.cancel.lock().take() {
            // the loop may already be gone, which is fine
            Some(tx) => {
                let _ = tx.send(());
                true
            }
            None => false,
        }
    }

    pub(crate) fn mark_stopped(&self) {
        self.cancel.lock().take();
        self.monitor_state.send_replace(MonitorState::Stopped);
    }

    pub fn monitor_state(&self) -> MonitorState {
        *self.monitor_state.borrow()
    }

    pub fn watch_monitor(&self) -> watch::Receiver<MonitorState> {
        self.monitor_state.subscribe()
    }
}

impl std::fmt::Debug for ClusterRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterRecord")
            .field("endpoint", &self.endpoint)
            .field("observed", &*self.observed.lock())
            .field("monitor", &self.monitor_state())
            .finish()
    }
}
