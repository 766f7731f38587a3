//! Cluster client: talks to one Elasticsearch cluster's health and license APIs.
//!
//! One request per call, basic auth with the cluster's own credentials, no
//! retries. Certificates are not verified: tracked clusters run with
//! self-signed certificates.

use crate::models::{ClusterEndpoint, ClusterStatus, LicenseAck, LicenseEnvelope, LicenseSnapshot};
use async_trait::async_trait;
use reqwest::{header, Method};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_PORT: u16 = 9200;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("unexpected response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Remote operations the refresh pipeline needs from a cluster.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    async fn fetch_status(&self, endpoint: &ClusterEndpoint) -> Result<ClusterStatus, ClientError>;

    async fn fetch_license(&self, endpoint: &ClusterEndpoint) -> Result<LicenseSnapshot, ClientError>;

    /// Installs `license` (a license file body). `Ok(false)` means the cluster
    /// answered but refused it.
    async fn push_license(&self, endpoint: &ClusterEndpoint, license: Vec<u8>) -> Result<bool, ClientError>;
}

#[derive(Debug, Clone)]
pub struct HttpClusterClient {
    http: reqwest::Client,
    default_port: u16,
}

impl HttpClusterClient {
    pub fn new(default_port: u16, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(timeout)
            .build()?;
        Ok(Self { http, default_port })
    }

    pub fn url(&self, endpoint: &ClusterEndpoint, path: &str) -> String {
        let scheme = if endpoint.use_ssl { "https" } else { "http" };
        let port = endpoint.explicit_port().unwrap_or(self.default_port);
        format!("{scheme}://{}:{port}/{path}", endpoint.host())
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &ClusterEndpoint,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<T, ClientError> {
        let url = self.url(endpoint, path);
        debug!(%method, %url, "cluster request");

        let mut req = self
            .http
            .request(method, &url)
            .basic_auth(&endpoint.username, Some(&endpoint.password));
        if let Some(body) = body {
            req = req.header(header::CONTENT_TYPE, "application/json").body(body);
        }

        let response = req.send().await.map_err(|source| ClientError::Http { url: url.clone(), source })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status { url, status: status.as_u16() });
        }
        let bytes = response.bytes().await.map_err(|source| ClientError::Http { url: url.clone(), source })?;
        serde_json::from_slice(&bytes).map_err(|source| ClientError::Decode { url, source })
    }
}

#[async_trait]
impl ClusterApi for HttpClusterClient {
    async fn fetch_status(&self, endpoint: &ClusterEndpoint) -> Result<ClusterStatus, ClientError> {
        self.request(Method::GET, endpoint, "_cluster/health", None).await
    }

    async fn fetch_license(&self, endpoint: &ClusterEndpoint) -> Result<LicenseSnapshot, ClientError> {
        let envelope: LicenseEnvelope = self.request(Method::GET, endpoint, "_xpack/license", None).await?;
        Ok(envelope.license)
    }

    async fn push_license(&self, endpoint: &ClusterEndpoint, license: Vec<u8>) -> Result<bool, ClientError> {
        let ack: LicenseAck = self.request(Method::POST, endpoint, "_xpack/license", Some(license)).await?;
        Ok(ack.accepted())
    }
}
