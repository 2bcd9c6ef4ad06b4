//! Font copying.

use std::fs;
use std::io;
use std::path::PathBuf;

use rayon::prelude::*;

use crate::config::PipelineConfig;
use crate::sources::SourceError;

/// Errors that can occur in the fonts task.
#[derive(Debug, thiserror::Error)]
pub enum FontError {
    #[error(transparent)]
    Sources(#[from] SourceError),

    #[error("Failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
}

/// Copy every font source byte-for-byte into `fonts/`.
///
/// Returns the number of files copied.
pub fn run(config: &PipelineConfig) -> Result<usize, FontError> {
    let out_dir = config.out_subdir("fonts");
    let files = config.fonts.files(&config.root)?;

    files
        .par_iter()
        .map(|file| {
            let dest = out_dir.join(&file.relative);
            let copy = || -> io::Result<u64> {
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(&file.path, &dest)
            };
            copy().map_err(|e| FontError::Copy {
                from: file.path.clone(),
                to: dest.clone(),
                source: e,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!("Copied {} fonts to {}", files.len(), out_dir.display());

    Ok(files.len())
}
