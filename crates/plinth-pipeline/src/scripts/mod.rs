//! Script bundling.
//!
//! Every matched source is a module. The module graph is walked from them,
//! project modules are lowered to the configured target, each module is
//! rewritten into a registry factory, and the registry is written as
//! `js/all.js`. Production bundles are minified as a whole.

pub mod graph;
pub mod helpers;
pub mod resolve;
pub mod rewrite;
pub mod runtime;
pub mod transpile;

use std::fs;
use std::io;
use std::path::PathBuf;

use crate::config::PipelineConfig;
use crate::sources::SourceError;
use graph::{GraphOptions, ModuleGraph};

/// Name of the bundle.
pub const BUNDLE_NAME: &str = "all.js";

/// Errors that can occur in the scripts task.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error(transparent)]
    Sources(#[from] SourceError),

    #[error("Failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("{path}: {message}")]
    Syntax { path: PathBuf, message: String },

    #[error("Cannot resolve '{specifier}' from {from}")]
    Resolve { specifier: String, from: PathBuf },

    #[error("Failed to transform {path}: {message}")]
    Transform { path: PathBuf, message: String },

    #[error("Failed to minify bundle: {0}")]
    Minify(String),

    #[error("Failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// What one scripts run produced.
#[derive(Debug)]
pub struct ScriptsOutput {
    pub bundle: PathBuf,
    pub modules: usize,
    pub entries: Vec<String>,
}

/// Bundle every script source into `js/all.js`.
pub fn run(config: &PipelineConfig) -> Result<ScriptsOutput, ScriptError> {
    let sources: Vec<PathBuf> = config
        .scripts
        .sources
        .files(&config.root)?
        .into_iter()
        .map(|f| f.path)
        .collect();

    let dev = config.mode.is_dev();
    let graph = ModuleGraph::build(
        &sources,
        &GraphOptions {
            root: &config.root,
            target: &config.scripts.target,
            source_maps: dev,
        },
    )?;

    let mut code = runtime::render(&graph, dev);
    if !dev {
        code = transpile::minify(&code)?;
    }

    let out_dir = config.out_subdir("js");
    fs::create_dir_all(&out_dir).map_err(|e| ScriptError::Write {
        path: out_dir.clone(),
        source: e,
    })?;

    let bundle = out_dir.join(BUNDLE_NAME);
    fs::write(&bundle, &code).map_err(|e| ScriptError::Write {
        path: bundle.clone(),
        source: e,
    })?;

    tracing::debug!(
        "Bundled {} modules ({} entries) into {}",
        graph.modules.len(),
        graph.entries.len(),
        bundle.display()
    );

    Ok(ScriptsOutput {
        bundle,
        modules: graph.modules.len(),
        entries: graph.entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildMode;
    use tempfile::tempdir;

    fn project(files: &[(&str, &str)]) -> tempfile::TempDir {
        let temp = tempdir().unwrap();
        for (rel, content) in files {
            let path = temp.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        temp
    }

    #[test]
    fn production_bundle_is_minified() {
        let temp = project(&[
            ("src/js/main.js", "import { greet } from './greet';\ngreet('world');\n"),
            (
                "src/js/greet.js",
                "export function greet(name) {\n  console.log(`hello ${name}`);\n}\n",
            ),
        ]);
        let config = PipelineConfig::new(temp.path(), BuildMode::Production).unwrap();

        let output = run(&config).unwrap();
        let code = fs::read_to_string(&output.bundle).unwrap();

        assert_eq!(output.modules, 2);
        assert_eq!(output.entries, vec!["src/js/main.js".to_string()]);
        assert!(code.contains("console.log"));
        assert!(!code.contains("import "));
        assert!(!code.contains("export "));
        assert!(!code.contains("\n  "));
    }

    #[test]
    fn development_bundle_uses_eval_with_source_maps() {
        let temp = project(&[("src/js/main.js", "const x = 1;\nconsole.log(x);\n")]);
        let config = PipelineConfig::new(temp.path(), BuildMode::Development).unwrap();

        let output = run(&config).unwrap();
        let code = fs::read_to_string(&output.bundle).unwrap();

        assert!(code.contains("eval("));
        assert!(code.contains("sourceMappingURL=data:application/json"));
        assert!(code.contains("sourceURL=plinth:///src/js/main.js"));
    }

    #[test]
    fn modern_syntax_bundles_without_runtime_package() {
        let temp = project(&[(
            "src/js/main.js",
            "const base = { a: 1 };\nconst merged = { ...base, b: 2 };\nasync function load() {\n  return await Promise.resolve(merged);\n}\nload().then(console.log);\n",
        )]);
        let config = PipelineConfig::new(temp.path(), BuildMode::Development).unwrap();

        let output = run(&config).unwrap();
        let code = fs::read_to_string(&output.bundle).unwrap();

        assert_eq!(output.modules, 1);
        assert!(code.contains("function _objectSpread2(e) {"));
        assert!(code.contains("function _asyncToGenerator(n) {"));
        assert!(!code.contains("@oxc-project/runtime"));
    }

    #[test]
    fn no_sources_still_writes_a_bundle() {
        let temp = tempdir().unwrap();
        let config = PipelineConfig::new(temp.path(), BuildMode::Production).unwrap();

        let output = run(&config).unwrap();

        assert!(output.bundle.is_file());
        assert_eq!(output.modules, 0);
    }

    #[test]
    fn syntax_error_fails_the_task() {
        let temp = project(&[("src/js/main.js", "const = ;\n")]);
        let config = PipelineConfig::new(temp.path(), BuildMode::Production).unwrap();

        let err = run(&config).unwrap_err();

        assert!(matches!(err, ScriptError::Syntax { .. }));
        assert!(err.to_string().contains("main.js"));
    }
}
