//! dsr-handler - serve refreshes over HTTP

use anyhow::Result;
use dsr_common::logging::{init_logging, LogConfig};
use dsr_ingest::{
    api::{self, AppState},
    bootstrap,
    config::Config,
};
use std::{net::SocketAddr, sync::Arc};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let log_config = LogConfig::builder()
        .log_file_prefix("dsr-handler")
        .filter_directives("dsr_ingest=debug,tower_http=debug,sqlx=warn,aws=warn")
        .build()
        .with_env_overrides()?;

    let _guard = init_logging(&log_config)?;

    info!("Starting dsr-handler");

    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    let pipeline = bootstrap::build_pipeline(&config).await?;
    let app = api::router(AppState {
        pipeline: Arc::new(pipeline),
    });

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(api::shutdown_signal(config.server.shutdown_timeout_secs))
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
