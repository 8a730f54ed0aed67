//! GCP Inventory Server
//!
//! Impersonates a target service account, discovers the projects it can
//! reach, and serves aggregated resource and telemetry reports over HTTP.
//! The aggregation core is a plain async function; this binary is only the
//! transport wrapped around it.

use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use clap::Parser;
use reqwest::Client;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use gcp_inventory::config::Config;
use gcp_inventory::inventory::{run_asset_inventory, run_inventory};

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    http: Client,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();

    let level = if config.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder().with_max_level(level).json().init();

    info!("starting inventory server");

    let http = Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;

    let state = AppState {
        config: Arc::new(config),
        http,
    };

    // Collect once on boot so credential problems show up before the first
    // request does.
    {
        let state = state.clone();
        tokio::spawn(async move {
            match run_inventory(&state.config, &state.http).await {
                Ok(run) => info!(
                    "startup inventory complete: {} reports, {} warnings",
                    run.reports.len(),
                    run.warnings.len()
                ),
                Err(e) => error!("startup inventory failed: {}", e),
            }
        });
    }

    let port = state.config.port;
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/api/data", get(all_data))
        .route("/api/assets/:project_id", get(tenant_assets))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("inventory server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "inventory-server",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Full pipeline run: every accessible tenant, all three collectors.
async fn all_data(State(state): State<AppState>) -> impl IntoResponse {
    match run_inventory(&state.config, &state.http).await {
        Ok(run) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "data": run.reports,
                "warnings": run.warnings
            })),
        ),
        Err(e) => {
            error!("inventory run failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "success": false,
                    "error": e.to_string()
                })),
            )
        }
    }
}

/// Asset listing for a single tenant.
async fn tenant_assets(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> impl IntoResponse {
    match run_asset_inventory(&state.config, &state.http, &project_id).await {
        Ok((assets, warnings)) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "projectId": project_id,
                "assets": assets,
                "warnings": warnings
            })),
        ),
        Err(e) => {
            error!("asset inventory failed for {}: {}", project_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "success": false,
                    "error": e.to_string()
                })),
            )
        }
    }
}
