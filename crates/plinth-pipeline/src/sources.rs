//! Glob-based source sets.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

/// A file matched by a [`SourceSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path on disk (project root joined with the match)
    pub path: PathBuf,

    /// Path relative to the base of the pattern that matched it
    pub relative: PathBuf,
}

/// An ordered list of glob patterns relative to the project root.
///
/// `*` stays within one path segment, `**` crosses directories.
#[derive(Debug, Clone)]
pub struct SourceSet {
    patterns: Vec<Pattern>,
    set: GlobSet,
}

#[derive(Debug, Clone)]
struct Pattern {
    text: String,
    base: PathBuf,
    matcher: GlobMatcher,
}

/// Errors raised while compiling glob patterns or walking their bases.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Invalid glob pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Failed to read {path}: {source}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },
}

impl SourceSet {
    /// Compile a list of patterns.
    pub fn new<I, S>(patterns: I) -> Result<Self, SourceError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut compiled = Vec::new();
        let mut builder = GlobSetBuilder::new();

        for pattern in patterns {
            let text = normalize_pattern(pattern.as_ref());
            let glob = GlobBuilder::new(&text)
                .literal_separator(true)
                .build()
                .map_err(|e| SourceError::InvalidPattern {
                    pattern: text.clone(),
                    message: e.to_string(),
                })?;

            builder.add(glob.clone());
            compiled.push(Pattern {
                base: pattern_base(&text),
                matcher: glob.compile_matcher(),
                text,
            });
        }

        let set = builder.build().map_err(|e| SourceError::InvalidPattern {
            pattern: compiled
                .iter()
                .map(|p| p.text.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            message: e.to_string(),
        })?;

        Ok(Self {
            patterns: compiled,
            set,
        })
    }

    /// The patterns as written (minus any leading `./`).
    pub fn patterns(&self) -> Vec<&str> {
        self.patterns.iter().map(|p| p.text.as_str()).collect()
    }

    /// Literal directory prefix of every pattern, relative to the root.
    pub fn bases(&self) -> Vec<PathBuf> {
        self.patterns.iter().map(|p| p.base.clone()).collect()
    }

    /// Check whether a root-relative path is matched by any pattern.
    pub fn is_match(&self, relative: &Path) -> bool {
        self.set.is_match(relative)
    }

    /// Enumerate matching files under `root`.
    ///
    /// Patterns are walked in order, each directory sorted by file name.
    /// A file matched by more than one pattern is reported once, for the
    /// first pattern. Missing base directories yield nothing; any other
    /// failure while walking is an error.
    pub fn files(&self, root: &Path) -> Result<Vec<SourceFile>, SourceError> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();

        for pattern in &self.patterns {
            let base = root.join(&pattern.base);
            if !base.exists() {
                continue;
            }

            for entry in WalkDir::new(&base).follow_links(true).sort_by_file_name() {
                let entry = entry.map_err(|e| SourceError::Walk {
                    path: e.path().map(Path::to_path_buf).unwrap_or_else(|| base.clone()),
                    source: e,
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }

                let path = entry.path();
                let Ok(from_root) = path.strip_prefix(root) else {
                    continue;
                };
                if !pattern.matcher.is_match(from_root) || !seen.insert(path.to_path_buf()) {
                    continue;
                }

                let relative = path
                    .strip_prefix(&base)
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|_| from_root.to_path_buf());

                files.push(SourceFile {
                    path: path.to_path_buf(),
                    relative,
                });
            }
        }

        Ok(files)
    }
}

/// Strip a leading `./` so patterns match root-relative paths.
fn normalize_pattern(pattern: &str) -> String {
    let mut text = pattern.trim();
    while let Some(rest) = text.strip_prefix("./") {
        text = rest;
    }
    text.to_string()
}

/// Leading directories of a pattern that contain no glob syntax.
///
/// A pattern without any glob syntax names a single file; its base is the
/// file's parent directory.
pub fn pattern_base(pattern: &str) -> PathBuf {
    let path = Path::new(pattern);
    let mut base = PathBuf::new();
    let mut literal = true;

    for component in path.components() {
        let Component::Normal(part) = component else {
            base.push(component);
            continue;
        };
        if part.to_string_lossy().contains(['*', '?', '[', '{']) {
            literal = false;
            break;
        }
        base.push(part);
    }

    if literal {
        base.pop();
    }
    base
}

/// Insert a `.min` suffix before the file extension.
///
/// `index.html` becomes `index.min.html`; a name without extension gets
/// `.min` appended.
pub fn min_file_name(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}.min.{ext}"),
        _ => format!("{file_name}.min"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn computes_pattern_bases() {
        assert_eq!(pattern_base("src/**/*.html"), PathBuf::from("src"));
        assert_eq!(pattern_base("src/img/**/*"), PathBuf::from("src/img"));
        assert_eq!(pattern_base("src/index.html"), PathBuf::from("src"));
        assert_eq!(pattern_base("*.js"), PathBuf::new());
    }

    #[test]
    fn single_star_stays_in_segment() {
        let set = SourceSet::new(["src/js/*.js"]).unwrap();

        assert!(set.is_match(Path::new("src/js/main.js")));
        assert!(!set.is_match(Path::new("src/js/lib/util.js")));
    }

    #[test]
    fn double_star_crosses_directories() {
        let set = SourceSet::new(["./src/sass/**/*.scss"]).unwrap();

        assert!(set.is_match(Path::new("src/sass/main.scss")));
        assert!(set.is_match(Path::new("src/sass/blocks/header.scss")));
        assert!(!set.is_match(Path::new("src/js/main.js")));
    }

    #[test]
    fn lists_files_relative_to_base_in_sorted_order() {
        let temp = tempdir().unwrap();
        let img = temp.path().join("src/img");
        fs::create_dir_all(img.join("icons")).unwrap();
        fs::write(img.join("b.png"), b"b").unwrap();
        fs::write(img.join("a.png"), b"a").unwrap();
        fs::write(img.join("icons/x.svg"), b"x").unwrap();

        let set = SourceSet::new(["src/img/**/*"]).unwrap();
        let files = set.files(temp.path()).unwrap();
        let relative: Vec<_> = files.iter().map(|f| f.relative.clone()).collect();

        assert_eq!(
            relative,
            vec![
                PathBuf::from("a.png"),
                PathBuf::from("b.png"),
                PathBuf::from("icons/x.svg"),
            ]
        );
    }

    #[test]
    fn missing_base_is_empty() {
        let temp = tempdir().unwrap();
        let set = SourceSet::new(["src/fonts/**/*"]).unwrap();

        assert!(set.files(temp.path()).unwrap().is_empty());
    }

    #[test]
    fn deduplicates_overlapping_patterns() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("src/js")).unwrap();
        fs::write(temp.path().join("src/js/main.js"), "").unwrap();

        let set = SourceSet::new(["src/js/*.js", "src/**/*.js"]).unwrap();

        assert_eq!(set.files(temp.path()).unwrap().len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn broken_symlink_is_an_error() {
        let temp = tempdir().unwrap();
        let fonts = temp.path().join("src/fonts");
        fs::create_dir_all(&fonts).unwrap();
        fs::write(fonts.join("a.woff2"), b"a").unwrap();
        std::os::unix::fs::symlink(fonts.join("gone.woff2"), fonts.join("b.woff2")).unwrap();

        let set = SourceSet::new(["src/fonts/**/*"]).unwrap();

        match set.files(temp.path()) {
            Err(SourceError::Walk { path, .. }) => assert!(path.ends_with("b.woff2")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_invalid_pattern() {
        let result = SourceSet::new(["src/[oops"]);

        assert!(matches!(result, Err(SourceError::InvalidPattern { .. })));
    }

    #[test]
    fn adds_min_suffix() {
        assert_eq!(min_file_name("index.html"), "index.min.html");
        assert_eq!(min_file_name("all.css"), "all.min.css");
        assert_eq!(min_file_name("LICENSE"), "LICENSE.min");
    }
}
