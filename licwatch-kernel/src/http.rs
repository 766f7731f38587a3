/*!
 * HTTP API - administrative surface of the license monitor
 *
 * ROUTES (all GET, parameters in the query string):
 * - `/`         overview: house license and every tracked cluster
 * - `/add`      hostname, usessl, username, password
 * - `/refresh`  cluster
 * - `/remove`   cluster
 * - `/set`      cluster (forced license push)
 * - `/health`   liveness
 *
 * Errors come back as `{"error": "..."}`: 400 for caller mistakes (bad or
 * missing parameter, foreign domain, duplicate, unknown cluster), 500 when a
 * cluster or the local disk failed us.
 */

use crate::error::MonitorError;
use crate::fleet::SharedFleet;
use crate::models::{ClusterEndpoint, LicenseSnapshot};
use crate::pipeline::RefreshOutcome;
use crate::policy;
use crate::record::{ClusterRecord, MonitorState};
use axum::extract::{Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub fleet: SharedFleet,
    /// Parsed house license, shown on the overview only
    pub house_license: Option<LicenseSnapshot>,
    pub default_username: String,
    pub default_password: String,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(|| async { "ok" }))
        .route("/add", get(add))
        .route("/refresh", get(refresh))
        .route("/remove", get(remove))
        .route("/set", get(set_license))
        .with_state(app_state)
        .layer(middleware::from_fn(access_log))
}

impl IntoResponse for MonitorError {
    fn into_response(self) -> Response {
        let status = if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

// query strings are not logged, /add carries a password
async fn access_log(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let response = next.run(req).await;
    info!(
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "request"
    );
    response
}

#[derive(Serialize)]
struct FleetView {
    house_license: Option<LicenseSnapshot>,
    clusters: Vec<ClusterView>,
}

#[derive(Serialize)]
struct ClusterView {
    hostname: String,
    usessl: bool,
    cluster_name: Option<String>,
    health: Option<String>,
    number_of_nodes: Option<u32>,
    last_checked: Option<String>,
    license: Option<LicenseSnapshot>,
    license_expires: Option<String>,
    needs_renewal: Option<bool>,
    monitor: MonitorState,
}

fn rfc3339(at: OffsetDateTime) -> Option<String> {
    at.format(&Rfc3339).ok()
}

fn to_view(record: &ClusterRecord, now: OffsetDateTime) -> ClusterView {
    let observed = record.observed();
    let status = observed.status.as_ref();
    let license = observed.license.as_ref().map(|l| &l.value);
    ClusterView {
        hostname: record.hostname().to_string(),
        usessl: record.endpoint().use_ssl,
        cluster_name: status.map(|s| s.value.cluster_name.clone()),
        health: status.map(|s| s.value.status.clone()),
        number_of_nodes: status.map(|s| s.value.node_count),
        last_checked: status.and_then(|s| rfc3339(s.observed_at)),
        license: license.cloned(),
        license_expires: license.and_then(|l| rfc3339(l.expiry())),
        needs_renewal: license.map(|l| policy::needs_renewal(l, now)),
        monitor: record.monitor_state(),
    }
}

// GET / (overview)
async fn index(State(app): State<AppState>) -> Json<FleetView> {
    let now = app.fleet.context().clock.now();
    let clusters = app.fleet.records().await.iter().map(|r| to_view(r, now)).collect();
    Json(FleetView { house_license: app.house_license.clone(), clusters })
}

#[derive(Debug, Deserialize)]
struct AddParams {
    hostname: Option<String>,
    usessl: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClusterParams {
    cluster: Option<String>,
}

impl ClusterParams {
    fn cluster(self) -> Result<String, MonitorError> {
        self.cluster
            .filter(|c| !c.is_empty())
            .ok_or_else(|| MonitorError::Validation("missing cluster name form input".into()))
    }
}

/// Same spellings as Go's strconv.ParseBool, which older clients rely on.
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

fn non_empty(value: Option<String>, default: &str) -> String {
    value.filter(|v| !v.is_empty()).unwrap_or_else(|| default.to_string())
}

fn logged<T>(result: Result<T, MonitorError>, action: &str) -> Result<T, MonitorError> {
    result.inspect_err(|e| warn!(error = %e, "{action} failed"))
}

// GET /add?hostname=&usessl=&username=&password=
async fn add(State(app): State<AppState>, Query(params): Query<AddParams>) -> Result<Json<serde_json::Value>, MonitorError> {
    let hostname = params
        .hostname
        .filter(|h| !h.is_empty())
        .ok_or_else(|| MonitorError::Validation("missing hostname form input".into()))?;
    // TLS unless explicitly turned off
    let use_ssl = params.usessl.as_deref().and_then(parse_bool).unwrap_or(true);
    let endpoint = ClusterEndpoint::new(
        hostname.clone(),
        use_ssl,
        non_empty(params.username, &app.default_username),
        non_empty(params.password, &app.default_password),
    );

    let cluster = logged(app.fleet.add(endpoint).await, "add")?;
    Ok(Json(serde_json::json!({ "message": "success", "hostname": hostname, "cluster": cluster })))
}

// GET /refresh?cluster=
async fn refresh(State(app): State<AppState>, Query(params): Query<ClusterParams>) -> Result<Json<serde_json::Value>, MonitorError> {
    let cluster = params.cluster()?;
    let outcome: RefreshOutcome = logged(app.fleet.refresh_now(&cluster).await, "refresh")?;
    Ok(Json(serde_json::json!({ "message": "success", "cluster": cluster, "outcome": outcome })))
}

// GET /remove?cluster=
async fn remove(State(app): State<AppState>, Query(params): Query<ClusterParams>) -> Result<Json<serde_json::Value>, MonitorError> {
    let cluster = params.cluster()?;
    logged(app.fleet.remove(&cluster).await, "remove")?;
    Ok(Json(serde_json::json!({ "message": "success", "cluster": cluster })))
}

// GET /set?cluster=
async fn set_license(State(app): State<AppState>, Query(params): Query<ClusterParams>) -> Result<Json<serde_json::Value>, MonitorError> {
    let cluster = params.cluster()?;
    logged(app.fleet.set_license(&cluster).await, "set license")?;
    Ok(Json(serde_json::json!({ "message": "success", "cluster": cluster })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientError;

    #[test]
    fn test_parse_bool_spellings() {
        assert_eq!(parse_bool("false"), Some(false));
        assert_eq!(parse_bool("F"), Some(false));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("yes"), None);
    }

    #[test]
    fn test_error_status_codes() {
        let status = |e: MonitorError| e.into_response().status();
        assert_eq!(status(MonitorError::Validation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(MonitorError::NotFound("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(MonitorError::Transport(ClientError::Status { url: "http://x/".into(), status: 503 })),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status(MonitorError::LicenseRejected { cluster: "logs".into() }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_blank_credentials_fall_back_to_defaults() {
        assert_eq!(non_empty(Some(String::new()), "elastic"), "elastic");
        assert_eq!(non_empty(None, "changeme"), "changeme");
        assert_eq!(non_empty(Some("admin".into()), "elastic"), "admin");
    }
}
