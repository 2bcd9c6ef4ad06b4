//! Asset build pipeline for static sites.
//!
//! Each content task (html, styles, scripts, images, fonts) reads a set of
//! glob-matched sources under the project root and writes into its own
//! subdirectory of the output root. [`Pipeline`] sequences them: clean first,
//! then the content tasks concurrently.

pub mod clean;
pub mod config;
pub mod fonts;
pub mod graph;
pub mod html;
pub mod images;
pub mod runner;
pub mod scripts;
pub mod sources;
pub mod styles;

pub use config::{BuildMode, PipelineConfig};
pub use graph::{Task, TaskGraph};
pub use html::HtmlSnapshot;
pub use runner::{BuildResult, Pipeline, PipelineError, TaskFailure};
pub use sources::{SourceError, SourceFile, SourceSet};
