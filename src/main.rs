use anyhow::Result;
use axum::Router;
use std::{fs, io::ErrorKind, path::Path, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;

use routes::routes::AppState;
use services::{artifact_store::ArtifactStore, upload_service::UploadService};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = config::AppConfig::from_env_and_args()?;
    tracing::info!("Starting filedepot with config: {:?}", cfg);

    // --- Ensure scratch and storage directories exist ---
    for dir in [&cfg.storage_dir, &cfg.upload_dir] {
        if !Path::new(dir).exists() {
            fs::create_dir_all(dir)?;
            tracing::info!("Created directory at {}", dir);
        }
    }

    // --- Initialize core services ---
    let uploads = UploadService::new(
        cfg.upload_dir.clone(),
        cfg.storage_dir.clone(),
        cfg.max_chunk_bytes,
    );
    let artifacts = ArtifactStore::new(cfg.storage_dir.clone());

    // --- Background session reaper ---
    if cfg.session_ttl_secs > 0 {
        let reaper = uploads.clone();
        let ttl = cfg.session_ttl_secs;
        tokio::spawn(async move {
            let period = Duration::from_secs((ttl / 4).max(60));
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let reaped = reaper.reap_expired(ttl).await;
                if reaped > 0 {
                    tracing::info!("session reaper removed {} expired sessions", reaped);
                }
            }
        });
    }

    // --- Build router ---
    let app: Router = routes::routes::routes(cfg.max_chunk_bytes)
        .with_state(AppState { uploads, artifacts });

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
