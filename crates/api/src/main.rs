//! Feature Gateway - Main Entry Point

use api::{init_logging, run_server, GatewayConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = GatewayConfig::load()?;
    init_logging(&config)?;

    info!("=== Feature Gateway v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        "Limits: < {} rows, <= {} columns, {}s extraction timeout",
        config.row_limit, config.max_columns, config.extraction_timeout_secs
    );

    run_server(config).await?;

    Ok(())
}
