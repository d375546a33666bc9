//! # Tronity Agent
//!
//! Polls one vehicle's telemetry from the Tronity API until Ctrl+C.

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use tronity_agent::{Agent, AgentConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Tronity agent");

    let config = AgentConfig::from_env()?;
    let agent = Agent::new(config)?;

    agent.run().await?;

    Ok(())
}
