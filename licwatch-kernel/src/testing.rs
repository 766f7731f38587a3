//! In-memory stand-ins for the cluster API, the store, the license file and the clock.

use crate::client::{ClientError, ClusterApi};
use crate::clock::Clock;
use crate::license::LicenseSource;
use crate::models::{ClusterEndpoint, ClusterStatus, LicenseSnapshot};
use crate::pipeline::RefreshContext;
use crate::store::{ClusterStore, StoreError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

pub const START: OffsetDateTime = datetime!(2026-03-01 12:00 UTC);

pub fn status(name: &str) -> ClusterStatus {
    ClusterStatus { cluster_name: name.into(), status: "green".into(), node_count: 3 }
}

fn millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

pub fn active_license(clock: &ManualClock, valid_for: Duration) -> LicenseSnapshot {
    LicenseSnapshot {
        status: "active".into(),
        uid: "current".into(),
        license_type: "platinum".into(),
        expiry_millis: millis(clock.now() + valid_for),
        issued_to: "acme".into(),
        issuer: "elastic".into(),
        max_nodes: 10,
    }
}

pub fn expired_license(clock: &ManualClock) -> LicenseSnapshot {
    LicenseSnapshot {
        status: "expired".into(),
        expiry_millis: millis(clock.now() - Duration::days(1)),
        ..active_license(clock, Duration::ZERO)
    }
}

#[derive(Debug, Clone)]
pub struct FakeCluster {
    pub status: ClusterStatus,
    pub license: LicenseSnapshot,
    pub reachable: bool,
    pub license_reachable: bool,
    pub accept_push: bool,
}

impl FakeCluster {
    pub const RENEWED_UID: &'static str = "house";

    pub fn new(status: ClusterStatus, license: LicenseSnapshot) -> Self {
        Self { status, license, reachable: true, license_reachable: true, accept_push: true }
    }

    fn renewed() -> LicenseSnapshot {
        LicenseSnapshot {
            status: "active".into(),
            uid: Self::RENEWED_UID.into(),
            license_type: "platinum".into(),
            expiry_millis: millis(START + Duration::days(365)),
            issued_to: "acme".into(),
            issuer: "elastic".into(),
            max_nodes: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Op {
    Status,
    License,
    Push,
}

/// Clusters keyed by hostname; unknown hostnames are unreachable.
#[derive(Default)]
pub struct FakeClusterApi {
    clusters: Mutex<HashMap<String, FakeCluster>>,
    calls: Mutex<HashMap<(String, Op), usize>>,
    pushed: Mutex<HashMap<String, Vec<u8>>>,
}

impl FakeClusterApi {
    pub fn insert(&self, hostname: &str, cluster: FakeCluster) {
        self.clusters.lock().insert(hostname.to_string(), cluster);
    }

    pub fn update(&self, hostname: &str, f: impl FnOnce(&mut FakeCluster)) {
        if let Some(cluster) = self.clusters.lock().get_mut(hostname) {
            f(cluster);
        }
    }

    fn count(&self, hostname: &str, op: Op) -> usize {
        self.calls.lock().get(&(hostname.to_string(), op)).copied().unwrap_or(0)
    }

    pub fn status_fetches(&self, hostname: &str) -> usize {
        self.count(hostname, Op::Status)
    }

    pub fn license_fetches(&self, hostname: &str) -> usize {
        self.count(hostname, Op::License)
    }

    pub fn pushes(&self, hostname: &str) -> usize {
        self.count(hostname, Op::Push)
    }

    pub fn last_push(&self, hostname: &str) -> Option<Vec<u8>> {
        self.pushed.lock().get(hostname).cloned()
    }

    fn call(&self, endpoint: &ClusterEndpoint, op: Op) -> Result<FakeCluster, ClientError> {
        *self.calls.lock().entry((endpoint.hostname.clone(), op)).or_default() += 1;
        let unreachable = || ClientError::Status { url: format!("http://{}/", endpoint.hostname), status: 503 };
        let cluster = self.clusters.lock().get(&endpoint.hostname).cloned().ok_or_else(unreachable)?;
        let up = match op {
            Op::License => cluster.reachable && cluster.license_reachable,
            _ => cluster.reachable,
        };
        if up {
            Ok(cluster)
        } else {
            Err(unreachable())
        }
    }
}

#[async_trait]
impl ClusterApi for FakeClusterApi {
    async fn fetch_status(&self, endpoint: &ClusterEndpoint) -> Result<ClusterStatus, ClientError> {
        Ok(self.call(endpoint, Op::Status)?.status)
    }

    async fn fetch_license(&self, endpoint: &ClusterEndpoint) -> Result<LicenseSnapshot, ClientError> {
        Ok(self.call(endpoint, Op::License)?.license)
    }

    async fn push_license(&self, endpoint: &ClusterEndpoint, license: Vec<u8>) -> Result<bool, ClientError> {
        let cluster = self.call(endpoint, Op::Push)?;
        self.pushed.lock().insert(endpoint.hostname.clone(), license);
        if cluster.accept_push {
            self.update(&endpoint.hostname, |c| c.license = FakeCluster::renewed());
        }
        Ok(cluster.accept_push)
    }
}

pub struct StaticLicense {
    bytes: Vec<u8>,
    readable: AtomicBool,
}

impl StaticLicense {
    pub fn new() -> Self {
        Self {
            bytes: br#"{"license":{"uid":"house","type":"platinum"}}"#.to_vec(),
            readable: AtomicBool::new(true),
        }
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    pub fn make_unreadable(&self) {
        self.readable.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl LicenseSource for StaticLicense {
    async fn license_bytes(&self) -> Result<Vec<u8>, StoreError> {
        if self.readable.load(Ordering::SeqCst) {
            Ok(self.bytes.clone())
        } else {
            Err(StoreError::Io {
                path: PathBuf::from("license.json"),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
            })
        }
    }
}

/// Wall time is set by hand; waits go through tokio so paused-time tests control them.
pub struct ManualClock {
    now: Mutex<OffsetDateTime>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self { now: Mutex::new(START) }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock()
    }

    async fn sleep(&self, period: std::time::Duration) {
        tokio::time::sleep(period).await
    }
}

#[derive(Default)]
pub struct MemoryStore {
    clusters: Mutex<Vec<ClusterEndpoint>>,
    saves: Mutex<usize>,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn with(clusters: Vec<ClusterEndpoint>) -> Self {
        Self { clusters: Mutex::new(clusters), ..Default::default() }
    }

    pub fn saved(&self) -> Vec<ClusterEndpoint> {
        self.clusters.lock().clone()
    }

    pub fn saves(&self) -> usize {
        *self.saves.lock()
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ClusterStore for MemoryStore {
    async fn load_cluster_list(&self) -> Result<Vec<ClusterEndpoint>, StoreError> {
        Ok(self.saved())
    }

    async fn save_cluster_list(&self, clusters: &[ClusterEndpoint]) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Io {
                path: PathBuf::from("clusters.json"),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        *self.clusters.lock() = clusters.to_vec();
        *self.saves.lock() += 1;
        Ok(())
    }
}

/// Bundle of fakes with handles kept for assertions.
pub struct TestContext {
    pub api: Arc<FakeClusterApi>,
    pub licenses: Arc<StaticLicense>,
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryStore>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::default())
    }

    pub fn with_store(store: MemoryStore) -> Self {
        Self {
            api: Arc::new(FakeClusterApi::default()),
            licenses: Arc::new(StaticLicense::new()),
            clock: Arc::new(ManualClock::new()),
            store: Arc::new(store),
        }
    }

    pub fn ctx(&self) -> RefreshContext {
        RefreshContext::new(self.api.clone(), self.licenses.clone(), self.clock.clone())
    }
}
