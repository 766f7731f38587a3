use crate::client::ClusterApi;
use crate::clock::Clock;
use crate::error::MonitorError;
use crate::license::LicenseSource;
use crate::policy;
use crate::record::ClusterRecord;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Collaborators every refresh needs, shared by the fleet and its monitors.
#[derive(Clone)]
pub struct RefreshContext {
    pub api: Arc<dyn ClusterApi>,
    pub licenses: Arc<dyn LicenseSource>,
    pub clock: Arc<dyn Clock>,
}

impl RefreshContext {
    pub fn new(api: Arc<dyn ClusterApi>, licenses: Arc<dyn LicenseSource>, clock: Arc<dyn Clock>) -> Self {
        Self { api, licenses, clock }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshOutcome {
    /// License was fine, nothing pushed
    Current,
    /// House license pushed and accepted
    Renewed,
}

/// Brings `record` up to date: status, then license, then a renewal when the
/// license just fetched calls for one.
///
/// Status and license are stored independently: a failed license fetch keeps
/// the status that was just fetched.
pub async fn refresh(record: &ClusterRecord, ctx: &RefreshContext) -> Result<RefreshOutcome, MonitorError> {
    let endpoint = record.endpoint();

    let status = ctx.api.fetch_status(endpoint).await?;
    debug!(hostname = %endpoint.hostname, cluster = %status.cluster_name, health = %status.status, "status fetched");
    if !record.apply_status(status, ctx.clock.now())? {
        debug!(hostname = %endpoint.hostname, "newer status already applied, dropping this one");
    }

    let license = ctx.api.fetch_license(endpoint).await?;
    let now = ctx.clock.now();
    let renew = policy::needs_renewal(&license, now);
    let expires = license.expiry();
    let license_status = license.status.clone();
    record.apply_license(license, now);

    if !renew {
        return Ok(RefreshOutcome::Current);
    }

    info!(cluster = %record.key(), status = %license_status, %expires, "license needs renewal");
    push_house_license(record, ctx).await?;
    Ok(RefreshOutcome::Renewed)
}

/// Pushes the house license whatever the state of the current one.
pub async fn force_license(record: &ClusterRecord, ctx: &RefreshContext) -> Result<(), MonitorError> {
    info!(cluster = %record.key(), "forcing license push");
    push_house_license(record, ctx).await
}

async fn push_house_license(record: &ClusterRecord, ctx: &RefreshContext) -> Result<(), MonitorError> {
    let endpoint = record.endpoint();
    let payload = ctx.licenses.license_bytes().await?;

    if !ctx.api.push_license(endpoint, payload).await? {
        warn!(cluster = %record.key(), "cluster refused the license");
        return Err(MonitorError::LicenseRejected { cluster: record.key() });
    }

    let license = ctx.api.fetch_license(endpoint).await?;
    info!(cluster = %record.key(), uid = %license.uid, expires = %license.expiry(), "license installed");
    record.apply_license(license, ctx.clock.now());
    Ok(())
}
