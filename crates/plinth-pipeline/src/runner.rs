//! Task sequencing.
//!
//! Clean runs to completion first. The remaining tasks are grouped into
//! independent chains (`html -> styles`, `scripts`, `images`, `fonts`) that
//! run concurrently on the blocking pool. A failing chain does not cancel
//! its siblings.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinSet;

use crate::clean::{self, CleanError};
use crate::config::PipelineConfig;
use crate::fonts::{self, FontError};
use crate::graph::{schedule, Task};
use crate::html::{self, HtmlError, HtmlSnapshot};
use crate::images::{self, ImageError};
use crate::scripts::{self, ScriptError};
use crate::styles::{self, StyleError};

/// Result of a pipeline run.
#[derive(Debug)]
pub struct BuildResult {
    /// Tasks that finished successfully, in scheduling order
    pub completed: Vec<Task>,

    /// Total run time in milliseconds
    pub duration_ms: u64,

    /// Output directory
    pub output_dir: PathBuf,
}

/// One task that did not finish.
#[derive(Debug, Clone)]
pub struct TaskFailure {
    pub task: Task,
    pub message: String,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.task, self.message)
    }
}

/// Errors that can occur while running tasks.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Clean(#[from] CleanError),

    #[error(transparent)]
    Html(#[from] HtmlError),

    #[error(transparent)]
    Style(#[from] StyleError),

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Font(#[from] FontError),

    #[error("Task '{0}' is not run by the pipeline")]
    Unsupported(Task),

    #[error("{} task(s) failed: {}", .0.len(), summarize(.0))]
    Failed(Vec<TaskFailure>),

    #[error("Task panicked: {0}")]
    Join(String),
}

fn summarize(failures: &[TaskFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// What one chain of tasks achieved.
#[derive(Debug, Default)]
struct ChainOutcome {
    completed: Vec<Task>,
    failures: Vec<TaskFailure>,
}

/// Runs tasks against a shared configuration.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Arc<PipelineConfig>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Clean, then every content task.
    pub async fn build(&self) -> Result<BuildResult, PipelineError> {
        tracing::info!(
            "Building {} ({} mode)",
            self.config.root.display(),
            self.config.mode.name()
        );

        let mut tasks = vec![Task::Clean];
        tasks.extend(Task::CONTENT);
        self.run(&tasks).await
    }

    /// Run `tasks` and their prerequisites.
    pub async fn run(&self, tasks: &[Task]) -> Result<BuildResult, PipelineError> {
        let start = Instant::now();
        let scheduled = schedule(tasks);

        if scheduled.contains(&Task::Grid) {
            return Err(PipelineError::Unsupported(Task::Grid));
        }

        let mut completed = Vec::new();

        if scheduled.contains(&Task::Clean) {
            let config = Arc::clone(&self.config);
            let outcome = tokio::task::spawn_blocking(move || run_chain(&config, &[Task::Clean]))
                .await
                .map_err(|e| PipelineError::Join(e.to_string()))?;

            if !outcome.failures.is_empty() {
                return Err(PipelineError::Failed(outcome.failures));
            }
            completed.extend(outcome.completed);
        }

        let mut jobs = JoinSet::new();
        for chain in chains(&scheduled) {
            let config = Arc::clone(&self.config);
            jobs.spawn_blocking(move || run_chain(&config, &chain));
        }

        let mut failures = Vec::new();
        while let Some(joined) = jobs.join_next().await {
            let outcome = joined.map_err(|e| PipelineError::Join(e.to_string()))?;
            completed.extend(outcome.completed);
            failures.extend(outcome.failures);
        }

        if !failures.is_empty() {
            failures.sort_by_key(|f| f.task);
            return Err(PipelineError::Failed(failures));
        }

        completed.sort();
        let duration = start.elapsed();

        Ok(BuildResult {
            completed,
            duration_ms: duration.as_millis() as u64,
            output_dir: self.config.out_dir(),
        })
    }
}

/// Group scheduled content tasks into independent chains.
fn chains(scheduled: &[Task]) -> Vec<Vec<Task>> {
    let mut chains = Vec::new();

    let markup: Vec<Task> = scheduled
        .iter()
        .copied()
        .filter(|t| matches!(t, Task::Html | Task::Styles))
        .collect();
    if !markup.is_empty() {
        chains.push(markup);
    }

    for task in [Task::Scripts, Task::Images, Task::Fonts] {
        if scheduled.contains(&task) {
            chains.push(vec![task]);
        }
    }

    chains
}

/// Run a chain in order, stopping at the first failure.
fn run_chain(config: &PipelineConfig, chain: &[Task]) -> ChainOutcome {
    let mut outcome = ChainOutcome::default();
    let mut snapshot: Option<HtmlSnapshot> = None;

    for &task in chain {
        tracing::info!("Starting '{}'...", task);
        let start = Instant::now();

        match run_task(config, task, &mut snapshot) {
            Ok(()) => {
                tracing::info!(
                    "Finished '{}' after {} ms",
                    task,
                    start.elapsed().as_millis()
                );
                outcome.completed.push(task);
            }
            Err(e) => {
                tracing::error!("'{}' failed: {}", task, e);
                outcome.failures.push(TaskFailure {
                    task,
                    message: e.to_string(),
                });
                break;
            }
        }
    }

    outcome
}

fn run_task(
    config: &PipelineConfig,
    task: Task,
    snapshot: &mut Option<HtmlSnapshot>,
) -> Result<(), PipelineError> {
    match task {
        Task::Clean => {
            let removed = clean::run(&config.out_dir())?;
            tracing::debug!("Removed {} entries from {}", removed, config.out_dir().display());
        }
        Task::Html => {
            let output = html::run(config)?;
            *snapshot = Some(output.snapshot);
        }
        Task::Styles => {
            let html = match snapshot.take() {
                Some(html) => html,
                None => html::run(config)?.snapshot,
            };
            let output = styles::run(config, &html)?;
            tracing::debug!("Removed {} unused selectors", output.removed_selectors);
        }
        Task::Scripts => {
            scripts::run(config)?;
        }
        Task::Images => {
            let output = images::run(config)?;
            if output.bytes_in > output.bytes_out {
                tracing::info!(
                    "Images: saved {} bytes across {} files",
                    output.bytes_in - output.bytes_out,
                    output.files
                );
            }
        }
        Task::Fonts => {
            fonts::run(config)?;
        }
        Task::Grid => return Err(PipelineError::Unsupported(task)),
    }

    Ok(())
}
