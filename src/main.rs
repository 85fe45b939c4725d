use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use policy_pipeline::api::{self, AppState};
use policy_pipeline::cache::CacheService;
use policy_pipeline::fetch::{build_client, Fetcher};
use policy_pipeline::store::JsonFileStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let data_path = std::env::var("POLICY_DATA").unwrap_or_else(|_| "data/policies.json".to_string());
    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

    let client = build_client()?;
    let state = Arc::new(AppState::new(
        Box::new(JsonFileStore::new(&data_path)),
        CacheService::new(),
        Fetcher::new(client),
    ));

    let app = api::router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;

    tracing::info!(addr = %bind_addr, data = %data_path, "policy pipeline listening");
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
