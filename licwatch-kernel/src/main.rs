/*!
 * LICWATCH KERNEL - Process entry point
 *
 * ROLE: wires config, logging, cluster client, cluster list store, house
 * license and the fleet together, restores the tracked clusters and serves
 * the administrative HTTP API until Ctrl-C.
 */

use anyhow::{Context, Result};
use licwatch_kernel::client::HttpClusterClient;
use licwatch_kernel::clock::SystemClock;
use licwatch_kernel::config::load_config;
use licwatch_kernel::http::{self, AppState};
use licwatch_kernel::license::LicenseFile;
use licwatch_kernel::store::JsonFileStore;
use licwatch_kernel::{Fleet, FleetSettings, RefreshContext};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("XPack license monitor starting");
    let cfg = load_config().await;
    info!(domain = %cfg.domain, clusters = %cfg.cluster_path.display(), license = %cfg.license_path.display(), "config loaded");

    // house license, only displayed; pushes re-read the file
    let license_file = LicenseFile::new(&cfg.license_path);
    let house_license = match license_file.snapshot().await {
        Ok(license) => {
            info!(uid = %license.uid, expires = %license.expiry(), "house license loaded");
            Some(license)
        }
        Err(e) => {
            warn!(error = %e, "house license unavailable, renewals will fail until it is fixed");
            None
        }
    };

    let client = HttpClusterClient::new(cfg.cluster_port, cfg.request_timeout()).context("failed to build HTTP client")?;
    let ctx = RefreshContext::new(Arc::new(client), Arc::new(license_file), Arc::new(SystemClock));
    let settings = FleetSettings { domain: cfg.domain.clone(), monitor_interval: cfg.monitor_interval() };
    let fleet = Arc::new(Fleet::new(settings, ctx, Arc::new(JsonFileStore::new(&cfg.cluster_path))));

    // a broken cluster list must not keep the API down
    if let Err(e) = fleet.load().await {
        error!(error = %e, "failed to load cluster list");
    }

    let app_state = AppState {
        fleet: fleet.clone(),
        house_license,
        default_username: cfg.default_username.clone(),
        default_password: cfg.default_password.clone(),
    };
    let app = http::build_router(app_state);

    let addr: SocketAddr = cfg.listen.parse().with_context(|| format!("invalid listen address {}", cfg.listen))?;
    let listener = TcpListener::bind(addr).await.with_context(|| format!("cannot bind {addr}"))?;
    info!("listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "cannot listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await
        .context("HTTP server failed")?;

    fleet.shutdown().await;
    info!("bye");
    Ok(())
}
