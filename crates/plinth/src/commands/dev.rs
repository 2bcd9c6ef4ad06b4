//! Build-then-watch command.

use anyhow::Result;

use crate::commands::watch;
use crate::config::Project;

/// Run a full build, then serve and watch.
pub async fn run(project: &Project, port: Option<u16>, no_open: bool) -> Result<()> {
    super::build::run(project).await?;

    watch::run(project, port, no_open).await
}
