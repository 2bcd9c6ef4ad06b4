//! HTML assembly and minification.

pub mod include;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub use include::{expand_file, Context, IncludeError};

use crate::config::PipelineConfig;
use crate::sources::{min_file_name, SourceError};

/// Rendered HTML the styles task checks selectors against.
#[derive(Debug, Clone, Default)]
pub struct HtmlSnapshot {
    /// The assembled entry page followed by every HTML source as written
    pub documents: Vec<String>,
}

impl HtmlSnapshot {
    pub fn is_empty(&self) -> bool {
        self.documents.iter().all(|d| d.trim().is_empty())
    }
}

/// Files written by one HTML run.
#[derive(Debug)]
pub struct HtmlOutput {
    pub page: PathBuf,
    pub minified: PathBuf,
    pub snapshot: HtmlSnapshot,
}

/// Errors that can occur in the HTML task.
#[derive(Debug, thiserror::Error)]
pub enum HtmlError {
    #[error(transparent)]
    Include(#[from] IncludeError),

    #[error(transparent)]
    Sources(#[from] SourceError),

    #[error("Failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("Failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Assemble the entry page, write it and its minified copy.
pub fn run(config: &PipelineConfig) -> Result<HtmlOutput, HtmlError> {
    let entry = config.resolve(&config.html.entry);
    let page = expand_file(&entry)?;

    let out_dir = config.out_dir();
    let file_name = entry
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "index.html".to_string());

    let page_path = out_dir.join(&file_name);
    write(&page_path, page.as_bytes())?;

    let minified_path = out_dir.join(min_file_name(&file_name));
    write(&minified_path, &minify(&page))?;

    tracing::debug!(
        "Wrote {} and {}",
        page_path.display(),
        minified_path.display()
    );

    let mut documents = vec![page];
    for source in config.html.sources.files(&config.root)? {
        let text = fs::read_to_string(&source.path).map_err(|e| HtmlError::Read {
            path: source.path.clone(),
            source: e,
        })?;
        documents.push(text);
    }

    Ok(HtmlOutput {
        page: page_path,
        minified: minified_path,
        snapshot: HtmlSnapshot { documents },
    })
}

/// Collapse whitespace and strip comments, keeping every element intact.
pub fn minify(html: &str) -> Vec<u8> {
    let mut cfg = minify_html::Cfg::new();
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    cfg.keep_comments = false;
    minify_html::minify(html.as_bytes(), &cfg)
}

fn write(path: &Path, content: &[u8]) -> Result<(), HtmlError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| HtmlError::Write {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    fs::write(path, content).map_err(|e| HtmlError::Write {
        path: path.to_path_buf(),
        source: e,
    })
}
