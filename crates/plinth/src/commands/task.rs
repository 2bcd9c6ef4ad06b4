//! Single-task command.

use anyhow::Result;
use plinth_pipeline::Task;

use crate::config::Project;

/// Run one task and its prerequisites.
pub async fn run(project: &Project, task: Task) -> Result<()> {
    let result = project.pipeline()?.run(&[task]).await?;

    super::build::report(&result);

    Ok(())
}
