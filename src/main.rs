use std::net::SocketAddr;

use anyhow::Context;
use campusdesk::campusdesk_config::ServerConfig;
use campusdesk::logging::init_tracing;
use campusdesk::metrics::{init_metrics, metrics_app};
use campusdesk::router::init_router;
use campusdesk::state::init_app_state;
use dotenvy::dotenv;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let server_config = ServerConfig::from_env();
    let _log_guard = init_tracing(&server_config.log_dir).context("Failed to set up logging")?;

    let metrics_handle =
        init_metrics(server_config.metrics_enabled).context("Failed to install metrics recorder")?;
    if let Some(handle) = metrics_handle {
        let metrics_addr = format!("{}:{}", server_config.host, server_config.metrics_port);
        let listener = tokio::net::TcpListener::bind(&metrics_addr)
            .await
            .with_context(|| format!("Failed to bind metrics listener on {}", metrics_addr))?;
        info!(address = %metrics_addr, "Metrics available at /metrics");
        tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, metrics_app(handle)).await {
                error!(error = %err, "Metrics server stopped");
            }
        });
    }

    let state = init_app_state().await?;
    let app = init_router(state);

    let address = server_config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!(address = %address, "Server running");
    info!("Scalar UI available at http://{}/scalar", address);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}
