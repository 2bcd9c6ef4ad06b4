//! Responsive grid generator.
//!
//! Writes an SCSS partial of variables and mixins (`wrapper`, `row-flex`,
//! `col`, `size-md`, ...) for a fixed column count and a set of named
//! breakpoints. Stylesheets `@import` the partial and include the mixins.

pub mod generator;
pub mod settings;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub use generator::generate;
pub use settings::{Breakpoint, Container, GridSettings, ResolvedBreakpoint};

/// Errors that can occur while generating the grid.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("Grid needs at least one column")]
    NoColumns,

    #[error("Invalid grid file name '{0}'")]
    InvalidFilename(String),

    #[error("Invalid length for {field}: '{value}'")]
    InvalidLength { field: String, value: String },

    #[error("Invalid breakpoint name '{0}': use lowercase letters, digits, '-' or '_'")]
    InvalidBreakpointName(String),

    #[error("Breakpoint name '{0}' clashes with a grid mixin")]
    ReservedBreakpointName(String),

    #[error("Breakpoint '{0}' is defined twice")]
    DuplicateBreakpoint(String),

    #[error("Failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Generate the partial and write it to `<dest>/<filename>.scss`.
pub fn write(dest: &Path, settings: &GridSettings) -> Result<PathBuf, GridError> {
    let scss = generate(settings)?;

    fs::create_dir_all(dest).map_err(|e| GridError::Write {
        path: dest.to_path_buf(),
        source: e,
    })?;

    let path = dest.join(format!("{}.scss", settings.filename));
    fs::write(&path, scss).map_err(|e| GridError::Write {
        path: path.clone(),
        source: e,
    })?;

    tracing::info!("Wrote grid to {}", path.display());

    Ok(path)
}
