use std::sync::Arc;

use anyhow::Context;

use addressbook_api::{app, config::ApiConfig, seed};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    addressbook_observability::init();

    let config = ApiConfig::from_env()?;
    let services = app::services::build_services(&config)
        .await
        .context("failed to initialise person store")?;

    if config.seed_data {
        seed::seed_example_persons(&services)
            .await
            .context("failed to seed example persons")?;
    }

    let app = app::build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
