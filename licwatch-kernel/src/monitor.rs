use crate::pipeline::{self, RefreshContext};
use crate::record::ClusterRecord;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Starts the background loop keeping `record` fresh.
///
/// Returns `None` if the record already had a monitor: a record gets one
/// monitor in its life, re-adding a cluster means a new record.
pub fn spawn_monitor(record: Arc<ClusterRecord>, ctx: RefreshContext, every: Duration) -> Option<JoinHandle<()>> {
    let cancel = record.arm_monitor()?;
    let span = info_span!("monitor", cluster = %record.key());
    Some(tokio::spawn(run(record, ctx, every, cancel).instrument(span)))
}

async fn run(record: Arc<ClusterRecord>, ctx: RefreshContext, every: Duration, mut cancel: oneshot::Receiver<()>) {
    info!(hostname = %record.hostname(), "monitoring {}", record.key());

    loop {
        debug!(?every, "waiting before next check");
        tokio::select! {
            biased;
            _ = &mut cancel => break,
            _ = ctx.clock.sleep(every) => {}
        }

        // checked again after waking, before going to the network
        if cancelled(&mut cancel) {
            break;
        }

        debug!("checking {}", record.key());
        if let Err(e) = pipeline::refresh(&record, &ctx).await {
            warn!(error = %e, "scheduled refresh failed");
        }
    }

    record.mark_stopped();
    info!("shutting down monitor for {}", record.key());
}

// a dropped sender counts as cancellation
fn cancelled(cancel: &mut oneshot::Receiver<()>) -> bool {
    !matches!(cancel.try_recv(), Err(TryRecvError::Empty))
}
