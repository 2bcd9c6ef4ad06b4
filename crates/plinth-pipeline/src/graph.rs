//! Tasks, their prerequisites and their watched inputs.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::PipelineConfig;
use crate::sources::{pattern_base, SourceSet};

/// A unit of work the pipeline can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Task {
    Clean,
    Html,
    Styles,
    Scripts,
    Images,
    Fonts,
    Grid,
}

impl Task {
    /// Content tasks, in scheduling order.
    pub const CONTENT: [Task; 5] = [Task::Html, Task::Styles, Task::Scripts, Task::Images, Task::Fonts];

    pub fn name(self) -> &'static str {
        match self {
            Task::Clean => "clean",
            Task::Html => "html",
            Task::Styles => "styles",
            Task::Scripts => "scripts",
            Task::Images => "images",
            Task::Fonts => "fonts",
            Task::Grid => "grid",
        }
    }

    /// Tasks whose output this task reads.
    pub fn prerequisites(self) -> &'static [Task] {
        match self {
            Task::Styles => &[Task::Html],
            _ => &[],
        }
    }

    /// Tasks that read this task's output.
    pub fn dependents(self) -> Vec<Task> {
        Task::CONTENT
            .into_iter()
            .filter(|t| t.prerequisites().contains(&self))
            .collect()
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for an unknown task name.
#[derive(Debug, thiserror::Error)]
#[error("Unknown task '{0}'")]
pub struct UnknownTask(pub String);

impl FromStr for Task {
    type Err = UnknownTask;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clean" => Ok(Task::Clean),
            "html" => Ok(Task::Html),
            "styles" => Ok(Task::Styles),
            "scripts" => Ok(Task::Scripts),
            "images" => Ok(Task::Images),
            "fonts" => Ok(Task::Fonts),
            "grid" => Ok(Task::Grid),
            other => Err(UnknownTask(other.to_string())),
        }
    }
}

/// Declared inputs of every content task.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    inputs: Vec<(Task, SourceSet)>,
}

impl TaskGraph {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            inputs: vec![
                (Task::Html, config.html.sources.clone()),
                (Task::Styles, config.styles.sources.clone()),
                (Task::Scripts, config.scripts.sources.clone()),
                (Task::Images, config.images.sources.clone()),
                (Task::Fonts, config.fonts.clone()),
            ],
        }
    }

    /// Tasks to re-run after `relative` (root-relative) changed.
    ///
    /// Directly affected tasks plus everything that depends on them, in
    /// scheduling order.
    pub fn affected_by(&self, relative: &Path) -> Vec<Task> {
        let direct: Vec<Task> = self
            .inputs
            .iter()
            .filter(|(_, set)| set.is_match(relative))
            .map(|(task, _)| *task)
            .collect();

        let mut affected = BTreeSet::new();
        for task in direct {
            affected.insert(task);
            affected.extend(task.dependents());
        }

        affected.into_iter().collect()
    }

    /// Union of the tasks affected by any of `paths`.
    pub fn affected_by_all<'a>(&self, paths: impl IntoIterator<Item = &'a Path>) -> Vec<Task> {
        let mut affected = BTreeSet::new();
        for path in paths {
            affected.extend(self.affected_by(path));
        }
        affected.into_iter().collect()
    }

    /// Directories to watch: the bases of every input pattern, minus any
    /// nested inside another.
    pub fn watch_roots(&self, root: &Path) -> Vec<PathBuf> {
        let mut bases: Vec<PathBuf> = self
            .inputs
            .iter()
            .flat_map(|(_, set)| set.patterns().into_iter().map(pattern_base))
            .collect();
        bases.sort();
        bases.dedup();

        let mut roots: Vec<PathBuf> = Vec::new();
        for base in bases {
            if !roots.iter().any(|r| base.starts_with(r)) {
                roots.push(base);
            }
        }

        roots.into_iter().map(|r| root.join(r)).collect()
    }
}

/// Expand `requested` with prerequisites, ordered for execution.
pub fn schedule(requested: &[Task]) -> Vec<Task> {
    let mut set = BTreeSet::new();
    for task in requested {
        set.extend(task.prerequisites().iter().copied());
        set.insert(*task);
    }
    set.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::config::BuildMode;

    fn graph() -> TaskGraph {
        TaskGraph::new(&PipelineConfig::new("/project", BuildMode::Development).unwrap())
    }

    #[test]
    fn parses_and_prints_names() {
        for task in [Task::Clean, Task::Html, Task::Styles, Task::Scripts, Task::Images, Task::Fonts, Task::Grid] {
            assert_eq!(task.name().parse::<Task>().unwrap(), task);
            assert_eq!(task.to_string(), task.name());
        }
        assert!("deploy".parse::<Task>().is_err());
    }

    #[test]
    fn styles_depends_on_html() {
        assert_eq!(Task::Styles.prerequisites(), &[Task::Html]);
        assert_eq!(Task::Html.dependents(), vec![Task::Styles]);
        assert!(Task::Scripts.dependents().is_empty());
    }

    #[test]
    fn maps_changed_paths_to_tasks() {
        let graph = graph();

        assert_eq!(graph.affected_by(Path::new("src/sass/blocks/_header.scss")), vec![Task::Styles]);
        assert_eq!(graph.affected_by(Path::new("src/partials/nav.html")), vec![Task::Html, Task::Styles]);
        assert_eq!(graph.affected_by(Path::new("src/js/app.js")), vec![Task::Scripts]);
        assert_eq!(graph.affected_by(Path::new("src/img/logo.png")), vec![Task::Images]);
        assert_eq!(graph.affected_by(Path::new("src/fonts/a.woff2")), vec![Task::Fonts]);
        assert!(graph.affected_by(Path::new("README.md")).is_empty());
    }

    #[test]
    fn unions_batches() {
        let graph = graph();
        let paths = [Path::new("src/js/a.js"), Path::new("src/sass/a.scss"), Path::new("src/js/b.js")];

        assert_eq!(graph.affected_by_all(paths), vec![Task::Styles, Task::Scripts]);
    }

    #[test]
    fn watch_roots_collapse_nested_bases() {
        let roots = graph().watch_roots(Path::new("/project"));

        assert_eq!(roots, vec![PathBuf::from("/project/src")]);
    }

    #[test]
    fn schedule_adds_prerequisites_in_order() {
        assert_eq!(schedule(&[Task::Styles]), vec![Task::Html, Task::Styles]);
        assert_eq!(schedule(&[Task::Fonts, Task::Html]), vec![Task::Html, Task::Fonts]);
    }
}
