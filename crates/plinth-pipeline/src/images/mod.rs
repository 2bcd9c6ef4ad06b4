//! Image compression.
//!
//! Every matched image goes through two optimizer passes in order. A pass
//! result is kept only when it is smaller than what the file already is.
//! Files no pass understands are copied unchanged.

pub mod raster;
pub mod strip;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::config::PipelineConfig;
use crate::sources::SourceError;
pub use raster::RasterOptimizer;
pub use strip::MetadataStripper;

/// Errors that can occur in the images task.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error(transparent)]
    Sources(#[from] SourceError),

    #[error("Failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),

    #[error("Malformed image: {0}")]
    Malformed(String),

    #[error("Failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Image formats the optimizers know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
    Svg,
    Other,
}

impl ImageKind {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "png" => Self::Png,
            "jpg" | "jpeg" | "jpe" => Self::Jpeg,
            "svg" => Self::Svg,
            _ => Self::Other,
        }
    }
}

/// One optimization pass.
pub trait ImageOptimizer: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Return a replacement, or `None` when the pass has nothing to offer.
    fn optimize(&self, kind: ImageKind, data: &[u8]) -> Result<Option<Vec<u8>>, ImageError>;
}

/// Summary of one images run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImagesOutput {
    pub files: usize,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

/// The two passes, in order.
pub fn default_passes(jpeg_quality: Option<u8>) -> Vec<Box<dyn ImageOptimizer>> {
    vec![
        Box::new(RasterOptimizer::new(jpeg_quality)),
        Box::new(MetadataStripper),
    ]
}

/// Run every pass over one file's bytes, keeping only improvements.
pub fn optimize_bytes(
    passes: &[Box<dyn ImageOptimizer>],
    kind: ImageKind,
    data: Vec<u8>,
    label: &Path,
) -> Vec<u8> {
    let mut current = data;

    for pass in passes {
        match pass.optimize(kind, &current) {
            Ok(Some(candidate)) if candidate.len() < current.len() => {
                tracing::debug!(
                    "{}: {} saved {} bytes",
                    label.display(),
                    pass.name(),
                    current.len() - candidate.len()
                );
                current = candidate;
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("{}: {} pass skipped: {}", label.display(), pass.name(), e),
        }
    }

    current
}

/// Compress every image source into `img/`, mirroring relative paths.
pub fn run(config: &PipelineConfig) -> Result<ImagesOutput, ImageError> {
    let out_dir = config.out_subdir("img");
    let passes = default_passes(config.images.jpeg_quality);
    let files = config.images.sources.files(&config.root)?;

    let sizes: Vec<(u64, u64)> = files
        .par_iter()
        .map(|file| {
            let data = fs::read(&file.path).map_err(|e| ImageError::Read {
                path: file.path.clone(),
                source: e,
            })?;
            let before = data.len() as u64;

            let kind = ImageKind::from_path(&file.path);
            let optimized = optimize_bytes(&passes, kind, data, &file.relative);

            let dest = out_dir.join(&file.relative);
            write(&dest, &optimized)?;

            Ok((before, optimized.len() as u64))
        })
        .collect::<Result<_, ImageError>>()?;

    let output = ImagesOutput {
        files: sizes.len(),
        bytes_in: sizes.iter().map(|(b, _)| b).sum(),
        bytes_out: sizes.iter().map(|(_, a)| a).sum(),
    };

    tracing::debug!(
        "Images: {} files, {} -> {} bytes",
        output.files,
        output.bytes_in,
        output.bytes_out
    );

    Ok(output)
}

fn write(path: &Path, content: &[u8]) -> Result<(), ImageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ImageError::Write {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    fs::write(path, content).map_err(|e| ImageError::Write {
        path: path.to_path_buf(),
        source: e,
    })
}
