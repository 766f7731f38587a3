use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use time::OffsetDateTime;

/// Connection details of one tracked cluster, as persisted in the cluster list.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterEndpoint {
    /// `host` or `host:port`
    pub hostname: String,
    #[serde(rename = "usessl")]
    pub use_ssl: bool,
    pub username: String,
    pub password: String,
}

impl ClusterEndpoint {
    pub fn new(hostname: impl Into<String>, use_ssl: bool, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            use_ssl,
            username: username.into(),
            password: password.into(),
        }
    }

    /// Hostname without any explicit port.
    pub fn host(&self) -> &str {
        self.hostname
            .rsplit_once(':')
            .map(|(host, _)| host)
            .unwrap_or(&self.hostname)
    }

    pub fn explicit_port(&self) -> Option<u16> {
        self.hostname
            .rsplit_once(':')
            .and_then(|(_, port)| port.parse().ok())
    }
}

// credentials never end up in logs
impl fmt::Debug for ClusterEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterEndpoint")
            .field("hostname", &self.hostname)
            .field("use_ssl", &self.use_ssl)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Body of `GET _cluster/health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStatus {
    pub cluster_name: String,
    /// green, yellow, red
    pub status: String,
    #[serde(rename = "number_of_nodes")]
    pub node_count: u32,
}

/// Commercial license attached to a cluster (or the house license file).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LicenseSnapshot {
    /// active, expired, invalid. Empty for a license file that was never installed.
    #[serde(deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(deserialize_with = "null_as_default")]
    pub uid: String,
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub license_type: String,
    #[serde(rename = "expiry_date_in_millis", deserialize_with = "null_as_default")]
    pub expiry_millis: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub issued_to: String,
    #[serde(deserialize_with = "null_as_default")]
    pub issuer: String,
    /// Enterprise licenses count resource units instead and report `null` here
    #[serde(deserialize_with = "null_as_default")]
    pub max_nodes: u32,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl LicenseSnapshot {
    pub fn expiry(&self) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(self.expiry_millis) * 1_000_000)
            .unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }

    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

/// `{"license": {...}}` wrapper used both by `_xpack/license` and license files.
#[derive(Debug, Clone, Deserialize)]
pub struct LicenseEnvelope {
    pub license: LicenseSnapshot,
}

/// Answer to a license push.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LicenseAck {
    pub acknowledged: bool,
    pub license_status: Option<String>,
}

impl LicenseAck {
    pub fn accepted(&self) -> bool {
        self.acknowledged && self.license_status.as_deref() == Some("valid")
    }
}
