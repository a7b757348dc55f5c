//! warpgate binary: binds the bridge and compat servers to their ports.
//!
//! The bridge listens on `BRIDGE_HOST`/`BRIDGE_PORT` (default
//! 127.0.0.1:8000) and the compat front end on `HOST`/`PORT` (default
//! 0.0.0.0:8010). The JWT is refreshed once at startup, best-effort.

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use warp_bridge::auth::CredentialManager;
use warp_bridge::client::UpstreamClient;
use warp_compat::settings::CompatSettings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = warp_config::load_and_apply(None) {
        warn!("loading .env failed: {e}");
    }

    let env_path = std::env::current_dir()?.join(".env");
    let creds = Arc::new(CredentialManager::new(env_path)?);
    let upstream = UpstreamClient::new(creds.clone())?;
    let bridge_state = Arc::new(warp_bridge::AppState { upstream, creds: creds.clone() });

    let bridge_host = std::env::var("BRIDGE_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let bridge_port: u16 = warp_config::env_parse("BRIDGE_PORT", 8000);
    let bridge_listener =
        tokio::net::TcpListener::bind((bridge_host.as_str(), bridge_port)).await?;
    info!("bridge server listening on http://{}", bridge_listener.local_addr()?);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(bridge_listener, warp_bridge::router(bridge_state)).await {
            warn!("bridge server exited: {e}");
        }
    });

    if !creds.refresh_if_needed().await {
        warn!("startup JWT refresh failed; continuing with existing credentials");
    }

    let compat_state = Arc::new(warp_compat::AppState::new(CompatSettings::from_env())?);
    let warm_state = compat_state.clone();
    tokio::spawn(async move {
        if let Err(e) = warp_compat::warmup::initialize_once(&warm_state).await {
            warn!("startup warmup failed: {e}");
        }
    });

    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = warp_config::env_parse("PORT", 8010);
    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
    info!("compat server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, warp_compat::router(compat_state)).await?;
    Ok(())
}
