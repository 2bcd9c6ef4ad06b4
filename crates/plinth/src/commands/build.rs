//! Full build command.

use anyhow::Result;
use plinth_pipeline::BuildResult;

use crate::config::Project;

/// Run the build command.
pub async fn run(project: &Project) -> Result<()> {
    let result = project.pipeline()?.build().await?;

    report(&result);

    Ok(())
}

pub(crate) fn report(result: &BuildResult) {
    tracing::info!(
        "Finished {} tasks in {}ms",
        result.completed.len(),
        result.duration_ms
    );

    tracing::info!("Output: {}", result.output_dir.display());
}
