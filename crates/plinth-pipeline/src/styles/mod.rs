//! Stylesheet pipeline.
//!
//! normalize.css and every SCSS source are concatenated into one sheet,
//! compiled, pruned against the rendered HTML, ordered, compressed, grouped
//! by media query and prefixed. The result is written twice: readable as
//! `css/all.css`, then re-ordered, re-compressed and minified as
//! `css/all.min.css`.

pub mod compile;
pub mod media;
pub mod order;
pub mod structure;
pub mod unused;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;

use crate::config::PipelineConfig;
use crate::sources::SourceError;
use crate::html::HtmlSnapshot;
use unused::UsedSymbols;

/// Name of the bundled stylesheet.
pub const CSS_NAME: &str = "all.css";
/// Name of the minified stylesheet.
pub const MIN_CSS_NAME: &str = "all.min.css";

/// Errors that can occur in the styles task.
#[derive(Debug, thiserror::Error)]
pub enum StyleError {
    #[error(transparent)]
    Sources(#[from] SourceError),

    #[error("Failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("{file}:{line}: {message}")]
    Compile {
        file: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Failed to parse compiled CSS: {0}")]
    Parse(String),

    #[error("Failed to compress CSS: {0}")]
    Minify(String),

    #[error("Failed to print CSS: {0}")]
    Print(String),

    #[error("Invalid browsers query: {0}")]
    Browsers(String),

    #[error("Failed to build source map: {0}")]
    SourceMap(String),

    #[error("Failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Files written by one styles run.
#[derive(Debug)]
pub struct StylesOutput {
    pub css: PathBuf,
    pub minified: PathBuf,
    pub source_map: Option<PathBuf>,
    pub removed_selectors: usize,
}

/// Run the stylesheet pipeline against an HTML snapshot.
pub fn run(config: &PipelineConfig, html: &HtmlSnapshot) -> Result<StylesOutput, StyleError> {
    let bundle = compile::bundle(config)?;
    let css = compile::compile(&bundle, config)?;
    let targets = browser_targets(&config.styles.browsers)?;

    let mut sheet = StyleSheet::parse(
        &css,
        ParserOptions {
            filename: CSS_NAME.to_string(),
            error_recovery: true,
            ..ParserOptions::default()
        },
    )
    .map_err(|e| StyleError::Parse(e.to_string()))?;

    let used = UsedSymbols::from_snapshot(html);
    let removed_selectors = unused::remove_unused(&mut sheet.rules, &used);
    tracing::debug!("Removed {} unused selectors", removed_selectors);

    order::sort_rules(&mut sheet.rules);
    compress(&mut sheet, Targets::default())?;

    let merged = media::merge_media(&mut sheet.rules);
    tracing::debug!("Merged {} media blocks", merged);

    // Prefixes are added while compressing with browser targets
    compress(&mut sheet, targets)?;

    let out_dir = config.out_subdir("css");
    let pretty = sheet
        .to_css(PrinterOptions {
            targets,
            ..PrinterOptions::default()
        })
        .map_err(|e| StyleError::Print(e.to_string()))?;
    let css_path = out_dir.join(CSS_NAME);
    write(&css_path, &pretty.code)?;

    order::sort_rules(&mut sheet.rules);
    compress(&mut sheet, targets)?;

    if !config.mode.is_dev() {
        let folded = structure::restructure(&mut sheet.rules);
        tracing::debug!("Structural pass removed {} rules", folded);
        compress(&mut sheet, targets)?;
    }

    let mut source_map = if config.mode.is_dev() {
        let mut map = SourceMap::new("/");
        map.add_source(CSS_NAME);
        map.set_source_content(0, &css)
            .map_err(|e| StyleError::SourceMap(e.to_string()))?;
        Some(map)
    } else {
        None
    };

    let minified = sheet
        .to_css(PrinterOptions {
            minify: true,
            source_map: source_map.as_mut(),
            targets,
            ..PrinterOptions::default()
        })
        .map_err(|e| StyleError::Print(e.to_string()))?;
    let mut code = minified.code;

    let min_path = out_dir.join(MIN_CSS_NAME);
    let map_path = match source_map.as_mut() {
        Some(map) => {
            let json = map
                .to_json(None)
                .map_err(|e| StyleError::SourceMap(e.to_string()))?;
            let map_name = format!("{MIN_CSS_NAME}.map");
            let path = out_dir.join(&map_name);
            write(&path, &json)?;
            code.push_str(&format!("\n/*# sourceMappingURL={map_name} */"));
            Some(path)
        }
        None => None,
    };

    write(&min_path, &code)?;

    Ok(StylesOutput {
        css: css_path,
        minified: min_path,
        source_map: map_path,
        removed_selectors,
    })
}

/// Resolve a browserslist query into lightningcss targets.
pub fn browser_targets(queries: &[String]) -> Result<Targets, StyleError> {
    if queries.is_empty() {
        return Ok(Targets::default());
    }

    let browsers =
        Browsers::from_browserslist(queries).map_err(|e| StyleError::Browsers(e.to_string()))?;

    Ok(Targets {
        browsers,
        ..Targets::default()
    })
}

fn compress(sheet: &mut StyleSheet, targets: Targets) -> Result<(), StyleError> {
    sheet
        .minify(MinifyOptions {
            targets,
            ..MinifyOptions::default()
        })
        .map_err(|e| StyleError::Minify(e.to_string()))
}

fn write(path: &Path, content: &str) -> Result<(), StyleError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StyleError::Write {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    fs::write(path, content).map_err(|e| StyleError::Write {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildMode;
    use tempfile::tempdir;

    const SCSS: &str = r#"
$accent: #336699;

.card {
  color: $accent;
  display: flex;
  user-select: none;

  &__title { margin: 0; }
}

.unused { color: red; }

@media (max-width: 600px) {
  .card { padding: 0; }
}

@media (max-width: 600px) {
  .card__title { padding: 0 4px; }
}
"#;

    fn fixture(mode: BuildMode) -> (tempfile::TempDir, PipelineConfig, HtmlSnapshot) {
        let temp = tempdir().unwrap();
        let sass = temp.path().join("src/sass");
        fs::create_dir_all(&sass).unwrap();
        fs::write(sass.join("main.scss"), SCSS).unwrap();

        let config = PipelineConfig::new(temp.path(), mode).unwrap();
        let snapshot = HtmlSnapshot {
            documents: vec![
                r#"<html><body><div class="card"><h2 class="card__title">Hi</h2></div></body></html>"#
                    .to_string(),
            ],
        };
        (temp, config, snapshot)
    }

    #[test]
    fn production_build_writes_both_sheets_without_map() {
        let (_temp, config, snapshot) = fixture(BuildMode::Production);

        let output = run(&config, &snapshot).unwrap();

        let css = fs::read_to_string(&output.css).unwrap();
        let min = fs::read_to_string(&output.minified).unwrap();

        assert!(css.contains(".card"));
        assert!(css.contains(".card__title"));
        assert!(!css.contains(".unused"));
        assert!(!min.contains(".unused"));
        assert!(min.len() < css.len());
        assert!(output.source_map.is_none());
        assert!(!min.contains("sourceMappingURL"));
        assert!(output.removed_selectors >= 1);
    }

    #[test]
    fn identical_media_queries_are_merged() {
        let (_temp, config, snapshot) = fixture(BuildMode::Production);

        let output = run(&config, &snapshot).unwrap();
        let css = fs::read_to_string(&output.css).unwrap();

        let media_count = css.matches("@media").count();
        assert_eq!(media_count, 1, "{css}");
    }

    #[test]
    fn adds_vendor_prefixes() {
        let (_temp, config, snapshot) = fixture(BuildMode::Production);

        let output = run(&config, &snapshot).unwrap();
        let css = fs::read_to_string(&output.css).unwrap();

        assert!(css.contains("-webkit-user-select"), "{css}");
    }

    #[test]
    fn development_build_writes_source_map() {
        let (_temp, config, snapshot) = fixture(BuildMode::Development);

        let output = run(&config, &snapshot).unwrap();

        let map_path = output.source_map.unwrap();
        assert!(map_path.ends_with("css/all.min.css.map"));

        let map = fs::read_to_string(map_path).unwrap();
        assert!(map.contains("\"mappings\""));

        let min = fs::read_to_string(&output.minified).unwrap();
        assert!(min.ends_with("/*# sourceMappingURL=all.min.css.map */"));
    }

    #[test]
    fn normalize_rules_are_pruned_against_html() {
        let (_temp, config, snapshot) = fixture(BuildMode::Production);

        let output = run(&config, &snapshot).unwrap();
        let css = fs::read_to_string(&output.css).unwrap();

        // body and html always survive; textarea never appears in the page
        assert!(css.contains("body"));
        assert!(!css.contains("textarea"));
    }

    #[test]
    fn production_sheet_is_smaller_than_development_sheet() {
        let scss = ".a { color: red; }\n.b { margin: 0; }\n.c { color: red; }\n";
        let html = r#"<div class="a"></div><div class="b"></div><div class="c"></div>"#;

        let build = |mode: BuildMode| {
            let temp = tempdir().unwrap();
            let sass = temp.path().join("src/sass");
            fs::create_dir_all(&sass).unwrap();
            fs::write(sass.join("main.scss"), scss).unwrap();
            let mut config = PipelineConfig::new(temp.path(), mode).unwrap();
            config.styles.normalize = false;
            let snapshot = HtmlSnapshot {
                documents: vec![html.to_string()],
            };

            let output = run(&config, &snapshot).unwrap();
            let min = fs::read_to_string(&output.minified).unwrap();
            match min.find("\n/*# sourceMappingURL=") {
                Some(at) => min[..at].to_string(),
                None => min,
            }
        };

        let dev = build(BuildMode::Development);
        let prod = build(BuildMode::Production);

        assert!(prod.len() < dev.len(), "prod: {prod}\ndev: {dev}");
        assert!(prod.contains(".a,.c{color:red}"), "{prod}");
    }

    #[test]
    fn empty_browser_list_means_no_targets() {
        let targets = browser_targets(&[]).unwrap();

        assert!(targets.browsers.is_none());
    }

    #[test]
    fn rejects_invalid_browser_query() {
        let result = browser_targets(&["not a real query at all".to_string()]);

        assert!(matches!(result, Err(StyleError::Browsers(_))));
    }
}
