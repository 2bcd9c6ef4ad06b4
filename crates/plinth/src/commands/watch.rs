//! Development server command.

use anyhow::Result;
use plinth_server::DevServer;

use crate::config::Project;

/// Serve the output directory and rebuild on change.
pub async fn run(project: &Project, port: Option<u16>, no_open: bool) -> Result<()> {
    let config = project.server_config(port, no_open);
    tracing::info!("Starting development server on port {}", config.port);

    if !project.pipeline_config()?.out_dir().exists() {
        tracing::warn!("Output directory does not exist yet. Run 'plinth build' first.");
    }

    DevServer::new(config, project.pipeline()?).start().await?;

    Ok(())
}
