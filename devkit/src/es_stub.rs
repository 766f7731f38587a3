/*!
Stub Elasticsearch cluster for tests without a real cluster

Serves `_cluster/health` and `_xpack/license` (GET and POST) on a local port,
records every request and lets tests flip the cluster's behaviour.
*/

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use time::{Duration, OffsetDateTime};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct StubState {
    pub cluster_name: String,
    pub health: String,
    pub nodes: u32,
    /// Inner object of the `_xpack/license` answer
    pub license: Value,
    pub accept_licenses: bool,
    /// When false every endpoint answers 503
    pub available: bool,
    pub last_authorization: Option<String>,
    pub hits: HashMap<String, usize>,
    pub pushed: Vec<Value>,
}

type Shared = Arc<Mutex<StubState>>;

/// Running stub, stopped on drop.
pub struct StubCluster {
    addr: SocketAddr,
    state: Shared,
    task: JoinHandle<()>,
}

impl StubCluster {
    pub async fn start(cluster_name: &str, license: Value) -> Result<Self> {
        let state: Shared = Arc::new(Mutex::new(StubState {
            cluster_name: cluster_name.to_string(),
            health: "green".into(),
            nodes: 3,
            license,
            accept_licenses: true,
            available: true,
            last_authorization: None,
            hits: HashMap::new(),
            pushed: Vec::new(),
        }));

        let app = Router::new()
            .route("/_cluster/health", get(cluster_health))
            .route("/_xpack/license", get(get_license).post(put_license).put(put_license))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                log::error!("[STUB] server error: {}", e);
            }
        });

        log::info!("[STUB] cluster '{}' listening on {}", cluster_name, addr);
        Ok(Self { addr, state, task })
    }

    /// `host:port` to hand to the monitor, plain HTTP.
    pub fn hostname(&self) -> String {
        format!("localhost:{}", self.addr.port())
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn state(&self) -> StubState {
        self.state.lock().unwrap().clone()
    }

    pub fn update(&self, f: impl FnOnce(&mut StubState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn set_license(&self, license: Value) {
        self.update(|s| s.license = license);
    }

    pub fn accept_licenses(&self, accept: bool) {
        self.update(|s| s.accept_licenses = accept);
    }

    pub fn set_available(&self, available: bool) {
        self.update(|s| s.available = available);
    }

    /// Number of requests seen, e.g. `hits("GET /_cluster/health")`
    pub fn hits(&self, route: &str) -> usize {
        self.state.lock().unwrap().hits.get(route).copied().unwrap_or(0)
    }

    pub fn pushed_licenses(&self) -> Vec<Value> {
        self.state.lock().unwrap().pushed.clone()
    }
}

impl Drop for StubCluster {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn record_hit(state: &mut StubState, route: &str, headers: &HeaderMap) {
    *state.hits.entry(route.to_string()).or_insert(0) += 1;
    state.last_authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
}

async fn cluster_health(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let mut s = state.lock().unwrap();
    record_hit(&mut s, "GET /_cluster/health", &headers);
    if !s.available {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    Json(serde_json::json!({
        "cluster_name": s.cluster_name,
        "status": s.health,
        "timed_out": false,
        "number_of_nodes": s.nodes,
        "number_of_data_nodes": s.nodes,
    }))
    .into_response()
}

async fn get_license(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let mut s = state.lock().unwrap();
    record_hit(&mut s, "GET /_xpack/license", &headers);
    if !s.available {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    Json(serde_json::json!({ "license": s.license })).into_response()
}

async fn put_license(State(state): State<Shared>, headers: HeaderMap, body: Bytes) -> Response {
    let mut s = state.lock().unwrap();
    record_hit(&mut s, "POST /_xpack/license", &headers);
    if !s.available {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let Ok(file) = serde_json::from_slice::<Value>(&body) else {
        return (StatusCode::BAD_REQUEST, "license body is not JSON").into_response();
    };
    s.pushed.push(file.clone());

    if !s.accept_licenses {
        log::info!("[STUB] refusing license for '{}'", s.cluster_name);
        return Json(serde_json::json!({ "acknowledged": true, "license_status": "invalid" })).into_response();
    }

    let mut installed = file.get("license").cloned().unwrap_or(Value::Null);
    if let Value::Object(ref mut fields) = installed {
        fields.insert("status".into(), Value::from("active"));
        fields.remove("signature");
    }
    s.license = installed;
    log::info!("[STUB] installed license on '{}'", s.cluster_name);
    Json(serde_json::json!({ "acknowledged": true, "license_status": "valid" })).into_response()
}

/// Builds license documents in the shapes Elasticsearch uses
pub struct LicenseBuilder;

impl LicenseBuilder {
    fn expiry_millis(valid_for: Duration) -> i64 {
        ((OffsetDateTime::now_utc() + valid_for).unix_timestamp_nanos() / 1_000_000) as i64
    }

    /// License as reported by `GET _xpack/license` (the inner object)
    pub fn installed(uid: &str, status: &str, valid_for: Duration) -> Value {
        serde_json::json!({
            "status": status,
            "uid": uid,
            "type": "platinum",
            "issue_date_in_millis": 1_600_000_000_000i64,
            "expiry_date_in_millis": Self::expiry_millis(valid_for),
            "max_nodes": 10,
            "issued_to": "acme",
            "issuer": "elastic",
            "start_date_in_millis": -1,
        })
    }

    /// License file as downloaded from the vendor (no status, signed)
    pub fn file(uid: &str, valid_for: Duration) -> Value {
        serde_json::json!({
            "license": {
                "uid": uid,
                "type": "platinum",
                "issue_date_in_millis": 1_600_000_000_000i64,
                "expiry_date_in_millis": Self::expiry_millis(valid_for),
                "max_nodes": 10,
                "issued_to": "acme",
                "issuer": "elastic",
                "signature": "AAAAAwAAAA0stub",
                "start_date_in_millis": -1,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_serves_health_and_license() {
        let stub = StubCluster::start("logs", LicenseBuilder::installed("abc", "active", Duration::days(30)))
            .await
            .unwrap();
        let client = reqwest::Client::new();

        let health: Value = client
            .get(format!("http://{}/_cluster/health", stub.addr()))
            .basic_auth("elastic", Some("changeme"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["cluster_name"], "logs");
        assert_eq!(health["number_of_nodes"], 3);

        let license: Value = client
            .get(format!("http://{}/_xpack/license", stub.addr()))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(license["license"]["uid"], "abc");

        assert_eq!(stub.hits("GET /_cluster/health"), 1);
        assert_eq!(stub.hits("GET /_xpack/license"), 1);
    }

    #[tokio::test]
    async fn test_stub_installs_or_refuses_pushed_license() {
        let stub = StubCluster::start("logs", LicenseBuilder::installed("old", "expired", Duration::days(-1)))
            .await
            .unwrap();
        let client = reqwest::Client::new();
        let url = format!("http://{}/_xpack/license", stub.addr());

        stub.accept_licenses(false);
        let ack: Value = client
            .post(&url)
            .json(&LicenseBuilder::file("new", Duration::days(365)))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(ack["license_status"], "invalid");
        assert_eq!(stub.state().license["uid"], "old");

        stub.accept_licenses(true);
        let ack: Value = client
            .post(&url)
            .json(&LicenseBuilder::file("new", Duration::days(365)))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(ack["license_status"], "valid");
        assert_eq!(stub.state().license["uid"], "new");
        assert_eq!(stub.state().license["status"], "active");
        assert_eq!(stub.pushed_licenses().len(), 2);
    }

    #[tokio::test]
    async fn test_unavailable_stub_answers_503() {
        let stub = StubCluster::start("logs", Value::Null).await.unwrap();
        stub.set_available(false);
        let response = reqwest::get(format!("http://{}/_cluster/health", stub.addr())).await.unwrap();
        assert_eq!(response.status().as_u16(), 503);
    }
}
