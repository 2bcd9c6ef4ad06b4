//! Pipeline configuration.
//!
//! A [`PipelineConfig`] is built once at startup and handed to every task by
//! reference. Nothing in the pipeline reads process-wide state.

use std::path::{Path, PathBuf};

use crate::sources::{SourceError, SourceSet};

/// Default output root.
pub const DEFAULT_DEST: &str = "dist";
/// Default HTML entry document.
pub const DEFAULT_HTML_ENTRY: &str = "src/index.html";
/// Default HTML sources (includes and entry).
pub const DEFAULT_HTML: &[&str] = &["src/**/*.html"];
/// Default stylesheet sources.
pub const DEFAULT_STYLES: &[&str] = &["src/sass/**/*.scss"];
/// Default script sources.
pub const DEFAULT_SCRIPTS: &[&str] = &["src/js/**/*.js"];
/// Default image sources.
pub const DEFAULT_IMAGES: &[&str] = &["src/img/**/*"];
/// Default font sources.
pub const DEFAULT_FONTS: &[&str] = &["src/fonts/**/*"];
/// Default browserslist query for vendor prefixing.
pub const DEFAULT_BROWSERS: &[&str] = &["> 0.1%"];
/// Default ECMAScript target for transpilation.
pub const DEFAULT_SCRIPT_TARGET: &str = "es2015";

/// Development or production build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    /// Source maps on, no bundle minification, no structural CSS pass
    Development,

    /// Minified bundle, structural CSS pass, no source maps
    #[default]
    Production,
}

impl BuildMode {
    /// Mode selected by the presence of a `--dev` flag.
    pub fn from_dev_flag(dev: bool) -> Self {
        if dev {
            Self::Development
        } else {
            Self::Production
        }
    }

    pub fn is_dev(self) -> bool {
        self == Self::Development
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

/// HTML task settings.
#[derive(Debug, Clone)]
pub struct HtmlOptions {
    /// Entry document, relative to the root
    pub entry: PathBuf,

    /// Every HTML file the entry may include (watched)
    pub sources: SourceSet,
}

/// Styles task settings.
#[derive(Debug, Clone)]
pub struct StylesOptions {
    /// SCSS sources
    pub sources: SourceSet,

    /// Prepend the bundled normalize.css
    pub normalize: bool,

    /// Browserslist queries used for vendor prefixing
    pub browsers: Vec<String>,
}

/// Scripts task settings.
#[derive(Debug, Clone)]
pub struct ScriptsOptions {
    /// JavaScript module sources
    pub sources: SourceSet,

    /// Transpilation target (e.g. "es2015")
    pub target: String,
}

/// Images task settings.
#[derive(Debug, Clone)]
pub struct ImagesOptions {
    /// Image sources
    pub sources: SourceSet,

    /// Quality for lossy re-encoding of baseline JPEGs; off when unset
    pub jpeg_quality: Option<u8>,
}

/// Configuration shared by every task.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Project root; every pattern is relative to it
    pub root: PathBuf,

    /// Output root, relative to `root` unless absolute
    pub dest: PathBuf,

    /// Build mode, fixed for the process lifetime
    pub mode: BuildMode,

    pub html: HtmlOptions,
    pub styles: StylesOptions,
    pub scripts: ScriptsOptions,
    pub images: ImagesOptions,
    pub fonts: SourceSet,
}

impl PipelineConfig {
    /// Configuration with every default path, rooted at `root`.
    pub fn new(root: impl Into<PathBuf>, mode: BuildMode) -> Result<Self, SourceError> {
        Ok(Self {
            root: root.into(),
            dest: PathBuf::from(DEFAULT_DEST),
            mode,
            html: HtmlOptions {
                entry: PathBuf::from(DEFAULT_HTML_ENTRY),
                sources: SourceSet::new(DEFAULT_HTML)?,
            },
            styles: StylesOptions {
                sources: SourceSet::new(DEFAULT_STYLES)?,
                normalize: true,
                browsers: DEFAULT_BROWSERS.iter().map(|s| s.to_string()).collect(),
            },
            scripts: ScriptsOptions {
                sources: SourceSet::new(DEFAULT_SCRIPTS)?,
                target: DEFAULT_SCRIPT_TARGET.to_string(),
            },
            images: ImagesOptions {
                sources: SourceSet::new(DEFAULT_IMAGES)?,
                jpeg_quality: None,
            },
            fonts: SourceSet::new(DEFAULT_FONTS)?,
        })
    }

    /// Absolute (or root-joined) output directory.
    pub fn out_dir(&self) -> PathBuf {
        self.root.join(&self.dest)
    }

    /// Output subdirectory for one asset class (`css`, `js`, `img`, `fonts`).
    pub fn out_subdir(&self, name: &str) -> PathBuf {
        self.out_dir().join(name)
    }

    /// Resolve a root-relative path.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dev_flag_selects_mode() {
        assert_eq!(BuildMode::from_dev_flag(true), BuildMode::Development);
        assert_eq!(BuildMode::from_dev_flag(false), BuildMode::Production);
        assert!(!BuildMode::default().is_dev());
    }

    #[test]
    fn defaults_match_conventional_layout() {
        let config = PipelineConfig::new("/project", BuildMode::Production).unwrap();

        assert_eq!(config.out_dir(), PathBuf::from("/project/dist"));
        assert_eq!(config.out_subdir("css"), PathBuf::from("/project/dist/css"));
        assert_eq!(config.html.entry, PathBuf::from("src/index.html"));
        assert_eq!(config.styles.sources.patterns(), vec!["src/sass/**/*.scss"]);
        assert_eq!(config.styles.browsers, vec!["> 0.1%".to_string()]);
        assert!(config.styles.normalize);
    }
}
