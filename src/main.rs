/// Steward workflows server
///
/// Main entry point. Loads configuration from the environment and serves the
/// workflow API:
/// - Workflow management at /api/workflows/*
/// - Health check at /healthz

use steward_workflows::{config::Config, server::start_server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (defaults to 0.0.0.0:3005 and data/workflows.db)
    let config = Config::default();

    start_server(config).await?;

    Ok(())
}
