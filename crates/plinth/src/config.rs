//! `plinth.toml` loading.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use plinth_grid::GridSettings;
use plinth_pipeline::config::{
    DEFAULT_BROWSERS, DEFAULT_DEST, DEFAULT_FONTS, DEFAULT_HTML, DEFAULT_HTML_ENTRY,
    DEFAULT_IMAGES, DEFAULT_SCRIPTS, DEFAULT_SCRIPT_TARGET, DEFAULT_STYLES,
};
use plinth_pipeline::{BuildMode, Pipeline, PipelineConfig, SourceSet};
use plinth_server::DevServerConfig;

/// Configuration file structure (plinth.toml).
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub paths: PathsConfig,
    pub styles: StylesConfig,
    pub scripts: ScriptsConfig,
    pub images: ImagesConfig,
    pub server: ServerConfig,
    pub grid: GridConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub dest: String,
    pub html_entry: String,
    pub html: Vec<String>,
    pub styles: Vec<String>,
    pub scripts: Vec<String>,
    pub images: Vec<String>,
    pub fonts: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StylesConfig {
    pub normalize: bool,
    pub browsers: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ScriptsConfig {
    pub target: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    /// Opt-in lossy JPEG re-encoding
    pub jpeg_quality: Option<u8>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub open: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Directory the partial is written to
    pub dest: String,

    #[serde(flatten)]
    pub settings: GridSettings,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            dest: DEFAULT_DEST.to_string(),
            html_entry: DEFAULT_HTML_ENTRY.to_string(),
            html: strings(DEFAULT_HTML),
            styles: strings(DEFAULT_STYLES),
            scripts: strings(DEFAULT_SCRIPTS),
            images: strings(DEFAULT_IMAGES),
            fonts: strings(DEFAULT_FONTS),
        }
    }
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            normalize: true,
            browsers: strings(DEFAULT_BROWSERS),
        }
    }
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            target: DEFAULT_SCRIPT_TARGET.to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        let defaults = DevServerConfig::default();
        Self {
            host: defaults.host,
            port: defaults.port,
            open: defaults.open,
        }
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            dest: "src/sass".to_string(),
            settings: GridSettings::default(),
        }
    }
}

/// Load configuration from `path` if it exists.
/// Returns an error if the config file exists but is malformed.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        tracing::debug!("No {} found, using defaults", path.display());
        return Ok(ConfigFile::default());
    }

    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    tracing::info!("Loaded config from {}", path.display());

    Ok(config)
}

/// Everything a command needs: where the project is, its settings and
/// the build mode.
#[derive(Debug)]
pub struct Project {
    pub root: PathBuf,
    pub file: ConfigFile,
    pub mode: BuildMode,
}

impl Project {
    /// Load `config_path`; the project root is the directory holding it.
    pub fn load(config_path: &Path, mode: BuildMode) -> Result<Self> {
        let file = load_config(config_path)?;
        let root = match config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => std::env::current_dir().context("Failed to determine current directory")?,
        };

        Ok(Self { root, file, mode })
    }

    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        let paths = &self.file.paths;
        let mut config = PipelineConfig::new(&self.root, self.mode)?;

        config.dest = PathBuf::from(&paths.dest);
        config.html.entry = PathBuf::from(&paths.html_entry);
        config.html.sources = SourceSet::new(&paths.html)?;
        config.styles.sources = SourceSet::new(&paths.styles)?;
        config.styles.normalize = self.file.styles.normalize;
        config.styles.browsers = self.file.styles.browsers.clone();
        config.scripts.sources = SourceSet::new(&paths.scripts)?;
        config.scripts.target = self.file.scripts.target.clone();
        config.images.sources = SourceSet::new(&paths.images)?;
        config.images.jpeg_quality = self.file.images.jpeg_quality;
        config.fonts = SourceSet::new(&paths.fonts)?;

        Ok(config)
    }

    pub fn pipeline(&self) -> Result<Pipeline> {
        Ok(Pipeline::new(self.pipeline_config()?))
    }

    /// Server settings, with command-line overrides applied.
    pub fn server_config(&self, port: Option<u16>, no_open: bool) -> DevServerConfig {
        let server = &self.file.server;
        DevServerConfig {
            host: server.host.clone(),
            port: port.unwrap_or(server.port),
            open: server.open && !no_open,
        }
    }

    pub fn grid_dest(&self) -> PathBuf {
        self.root.join(&self.file.grid.dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let temp = tempdir().unwrap();

        let config = load_config(&temp.path().join("plinth.toml")).unwrap();

        assert_eq!(config.paths.dest, "dist");
        assert_eq!(config.paths.styles, vec!["src/sass/**/*.scss".to_string()]);
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.grid.dest, "src/sass");
        assert_eq!(config.grid.settings.columns, 12);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("plinth.toml");
        fs::write(&path, "[paths\ndest = ").unwrap();

        assert!(load_config(&path).is_err());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("plinth.toml");
        fs::write(
            &path,
            r#"
[paths]
dest = "public"

[images]
jpeg_quality = 70

[server]
port = 8080

[grid]
columns = 24
offset = "20px"
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();

        assert_eq!(config.paths.dest, "public");
        assert_eq!(config.paths.html_entry, "src/index.html");
        assert_eq!(config.images.jpeg_quality, Some(70));
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.grid.settings.columns, 24);
        assert_eq!(config.grid.settings.offset, "20px");
        assert_eq!(config.grid.settings.break_points.len(), 4);
    }

    #[test]
    fn builds_pipeline_config_from_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("plinth.toml");
        fs::write(
            &path,
            "[paths]\ndest = \"out\"\nscripts = [\"assets/js/*.js\"]\n\n[styles]\nnormalize = false\n",
        )
        .unwrap();

        let project = Project::load(&path, BuildMode::Development).unwrap();
        let config = project.pipeline_config().unwrap();

        assert_eq!(config.root, temp.path());
        assert_eq!(config.out_dir(), temp.path().join("out"));
        assert_eq!(config.scripts.sources.patterns(), vec!["assets/js/*.js"]);
        assert!(!config.styles.normalize);
        assert!(config.mode.is_dev());
    }

    #[test]
    fn invalid_glob_is_an_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("plinth.toml");
        fs::write(&path, "[paths]\nimages = [\"src/[img\"]\n").unwrap();

        let project = Project::load(&path, BuildMode::Production).unwrap();

        assert!(project.pipeline_config().is_err());
    }

    #[test]
    fn cli_flags_override_server_settings() {
        let temp = tempdir().unwrap();
        let project = Project::load(&temp.path().join("plinth.toml"), BuildMode::Development).unwrap();

        let server = project.server_config(Some(4000), true);

        assert_eq!(server.port, 4000);
        assert!(!server.open);
    }
}
