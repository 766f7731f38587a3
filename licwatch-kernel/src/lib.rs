//! License monitor kernel: tracks a fleet of Elasticsearch clusters, polls
//! their health and license, and renews licenses about to lapse.

pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod fleet;
pub mod http;
pub mod license;
pub mod models;
pub mod monitor;
pub mod pipeline;
pub mod policy;
pub mod record;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use error::MonitorError;
pub use fleet::{Fleet, FleetSettings, SharedFleet};
pub use pipeline::{RefreshContext, RefreshOutcome};
pub use record::{ClusterRecord, MonitorState};
