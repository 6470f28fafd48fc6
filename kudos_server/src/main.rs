// SPDX-License-Identifier: MIT OR Apache-2.0
//! Kudos server binary entry point.

use kudos_server::{KudosServer, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("kudos_server=info".parse()?)
                .add_directive("kudos_engine=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    // Load configuration from environment or defaults
    let config = ServerConfig::from_env()?;

    tracing::info!("Starting Kudos server on {}", config.bind_addr);

    let server = KudosServer::new(config)?;
    server.serve().await?;

    Ok(())
}
