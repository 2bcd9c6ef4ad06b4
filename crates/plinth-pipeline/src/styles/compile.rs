//! Stylesheet concatenation and SCSS compilation.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use super::StyleError;
use crate::config::PipelineConfig;

/// normalize.css v8.0.1
pub const NORMALIZE_CSS: &str = include_str!("../../assets/normalize.css");

/// Label used for the bundled normalize.css in diagnostics.
pub const NORMALIZE_LABEL: &str = "normalize.css";

static LOCATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(\S+):(\d+):(\d+)(?:\s|$)").expect("Invalid grass location regex")
});

/// One source inside a [`SourceBundle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub path: PathBuf,

    /// First line of the chunk in the bundle (1-based)
    pub start_line: usize,

    pub line_count: usize,
}

/// Concatenated stylesheet sources with a line table back to each file.
#[derive(Debug, Default)]
pub struct SourceBundle {
    pub text: String,
    pub chunks: Vec<Chunk>,
}

impl SourceBundle {
    pub fn push(&mut self, path: impl Into<PathBuf>, content: &str) {
        let start_line = self.text.matches('\n').count() + 1;
        let line_count = content.lines().count().max(1);

        self.text.push_str(content);
        if !content.ends_with('\n') {
            self.text.push('\n');
        }

        self.chunks.push(Chunk {
            path: path.into(),
            start_line,
            line_count,
        });
    }

    /// Map a bundle line (1-based) to its source file and line in that file.
    pub fn locate(&self, line: usize) -> Option<(&Path, usize)> {
        self.chunks
            .iter()
            .find(|c| line >= c.start_line && line < c.start_line + c.line_count)
            .map(|c| (c.path.as_path(), line - c.start_line + 1))
    }
}

/// Concatenate normalize.css (when enabled) and every styles source.
pub fn bundle(config: &PipelineConfig) -> Result<SourceBundle, StyleError> {
    let mut bundle = SourceBundle::default();

    if config.styles.normalize {
        bundle.push(NORMALIZE_LABEL, NORMALIZE_CSS);
    }

    for file in config.styles.sources.files(&config.root)? {
        let content = fs::read_to_string(&file.path).map_err(|e| StyleError::Read {
            path: file.path.clone(),
            source: e,
        })?;
        tracing::debug!("Bundling {}", file.path.display());
        bundle.push(file.path, &content);
    }

    Ok(bundle)
}

/// Compile the bundle with grass, resolving imports from each pattern base.
pub fn compile(bundle: &SourceBundle, config: &PipelineConfig) -> Result<String, StyleError> {
    let load_paths: Vec<PathBuf> = config
        .styles
        .sources
        .bases()
        .into_iter()
        .map(|base| config.root.join(base))
        .collect();

    let mut options = grass::Options::default().style(grass::OutputStyle::Expanded);
    for path in &load_paths {
        options = options.load_path(path);
    }

    grass::from_string(bundle.text.clone(), &options).map_err(|e| compile_error(bundle, &e.to_string()))
}

fn compile_error(bundle: &SourceBundle, rendered: &str) -> StyleError {
    let message = rendered
        .lines()
        .next()
        .unwrap_or("SCSS compile error")
        .trim_start_matches("Error: ")
        .to_string();

    // Location lines look like `./stdin:3:10`; the innermost frame comes first.
    let location = LOCATION_RE.captures(rendered).and_then(|caps| {
        let name = caps[1].trim_start_matches("./").to_string();
        caps[2].parse::<usize>().ok().map(|line| (name, line))
    });

    match location {
        Some((name, line)) if name == "stdin" => match bundle.locate(line) {
            Some((path, local)) => StyleError::Compile {
                file: path.to_path_buf(),
                line: local,
                message,
            },
            None => StyleError::Compile {
                file: PathBuf::from(name),
                line,
                message,
            },
        },
        Some((name, line)) => StyleError::Compile {
            file: PathBuf::from(name),
            line,
            message,
        },
        None => StyleError::Compile {
            file: PathBuf::from("all.css"),
            line: 0,
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildMode;
    use tempfile::tempdir;

    #[test]
    fn locates_lines_per_chunk() {
        let mut bundle = SourceBundle::default();
        bundle.push("a.scss", "a {}\nb {}");
        bundle.push("b.scss", "c {}\n");

        assert_eq!(bundle.locate(1), Some((Path::new("a.scss"), 1)));
        assert_eq!(bundle.locate(2), Some((Path::new("a.scss"), 2)));
        assert_eq!(bundle.locate(3), Some((Path::new("b.scss"), 1)));
        assert_eq!(bundle.locate(9), None);
    }

    #[test]
    fn compiles_with_imports_from_pattern_base() {
        let temp = tempdir().unwrap();
        let sass = temp.path().join("src/sass");
        fs::create_dir_all(sass.join("vars")).unwrap();
        fs::write(sass.join("vars/_colors.scss"), "$brand: #ff0000;").unwrap();
        fs::write(
            sass.join("main.scss"),
            "@import 'vars/colors';\n.title { .icon { color: $brand; } }\n",
        )
        .unwrap();

        let mut config = PipelineConfig::new(temp.path(), BuildMode::Production).unwrap();
        config.styles.sources = crate::sources::SourceSet::new(["src/sass/*.scss"]).unwrap();
        config.styles.normalize = false;

        let bundle = bundle(&config).unwrap();
        let css = compile(&bundle, &config).unwrap();

        assert!(css.contains(".title .icon"));
        assert!(css.contains("#ff0000") || css.contains("red"));
    }

    #[test]
    fn normalize_is_prepended() {
        let temp = tempdir().unwrap();
        let config = PipelineConfig::new(temp.path(), BuildMode::Production).unwrap();

        let bundle = bundle(&config).unwrap();

        assert!(bundle.text.starts_with("/*! normalize.css v8.0.1"));
        assert_eq!(bundle.chunks[0].path, PathBuf::from(NORMALIZE_LABEL));
    }

    #[test]
    fn maps_grass_stdin_location_through_chunks() {
        let mut bundle = SourceBundle::default();
        bundle.push("a.scss", ".a { color: red; }");
        bundle.push("b.scss", ".b {\n  color: $undefined;\n}");
        let rendered = "Error: Undefined variable.\n  \u{2577}\n3 \u{2502}   color: $undefined;\n  \u{2502}          ^^^^^^^^^^\n  \u{2575}\n  ./stdin:3:10";

        match compile_error(&bundle, rendered) {
            StyleError::Compile { file, line, message } => {
                assert_eq!(file, PathBuf::from("b.scss"));
                assert_eq!(line, 2);
                assert_eq!(message, "Undefined variable.");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn imported_file_location_is_kept() {
        let bundle = SourceBundle::default();
        let rendered = "Error: expected \";\".\n  \u{2577}\n4 \u{2502} $a: 1\n  \u{2575}\n  ./src/sass/_vars.scss:4:1";

        match compile_error(&bundle, rendered) {
            StyleError::Compile { file, line, .. } => {
                assert_eq!(file, PathBuf::from("src/sass/_vars.scss"));
                assert_eq!(line, 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn compile_error_names_source_file_and_line() {
        let temp = tempdir().unwrap();
        let sass = temp.path().join("src/sass");
        fs::create_dir_all(&sass).unwrap();
        fs::write(sass.join("a.scss"), ".a { color: red; }\n").unwrap();
        fs::write(sass.join("b.scss"), ".b {\n  color: $undefined;\n}\n").unwrap();

        let mut config = PipelineConfig::new(temp.path(), BuildMode::Production).unwrap();
        config.styles.normalize = false;

        let bundle = bundle(&config).unwrap();
        let err = compile(&bundle, &config).unwrap_err();

        match err {
            StyleError::Compile { file, line, .. } => {
                assert!(file.ends_with("b.scss"));
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
