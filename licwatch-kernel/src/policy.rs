use crate::models::LicenseSnapshot;
use time::{Duration, OffsetDateTime};

/// A license closer than this to its expiry gets replaced.
pub const RENEWAL_THRESHOLD: Duration = Duration::hours(48);

/// Decides whether `license`, as just fetched from the cluster, must be replaced.
pub fn needs_renewal(license: &LicenseSnapshot, now: OffsetDateTime) -> bool {
    if !license.is_active() {
        return true;
    }
    license.expiry() - now <= RENEWAL_THRESHOLD
}
