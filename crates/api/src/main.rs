use anyhow::Context;

use peoplehub_infra::{AuthConfig, StorageConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    peoplehub_observability::init();

    let mut config = AuthConfig::from_env().context("invalid configuration")?;
    if config.jwt_secret.is_none() {
        tracing::warn!("JWT_SECRET not set; using insecure dev default");
        config.jwt_secret = Some("dev-secret".to_string());
    }
    let storage = StorageConfig::from_env();

    let app = peoplehub_api::app::build_app(&config, &storage).await?;

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
