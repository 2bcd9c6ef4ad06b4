//! Grid generation command.

use anyhow::{Context, Result};

use crate::config::Project;

/// Regenerate the grid partial.
pub async fn run(project: &Project) -> Result<()> {
    let dest = project.grid_dest();

    plinth_grid::write(&dest, &project.file.grid.settings)
        .with_context(|| format!("Failed to generate grid in {}", dest.display()))?;

    Ok(())
}
