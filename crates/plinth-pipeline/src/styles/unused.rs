//! Unused selector removal.
//!
//! A selector survives when every class, id and element name it mentions
//! shows up somewhere in the rendered HTML. Pseudo-classes, pseudo-elements
//! and attribute selectors are ignored, so `:root`, `[hidden]` and
//! `::selection` always survive.

use std::collections::HashSet;
use std::sync::LazyLock;

use lightningcss::printer::PrinterOptions;
use lightningcss::rules::{CssRule, CssRuleList};
use lightningcss::traits::ToCss;
use regex::Regex;

use crate::html::HtmlSnapshot;

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([A-Za-z][A-Za-z0-9-]*)").expect("Invalid tag regex"));

static CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:^|\s)(?i:class)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("Invalid class regex")
});

static ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:^|\s)(?i:id)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("Invalid id regex")
});

static IGNORED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[[^\]]*\]|::?[A-Za-z-]+(?:\([^)]*\))?").expect("Invalid pseudo regex")
});

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([.#]?)((?:\\.|[\w-])+)").expect("Invalid token regex"));

/// Element names that are always considered present.
const ALWAYS_PRESENT: &[&str] = &["html", "body"];

/// Classes, ids and element names found in rendered HTML.
#[derive(Debug, Default)]
pub struct UsedSymbols {
    tags: HashSet<String>,
    classes: HashSet<String>,
    ids: HashSet<String>,
}

impl UsedSymbols {
    pub fn from_snapshot(snapshot: &HtmlSnapshot) -> Self {
        let mut used = Self::default();
        for tag in ALWAYS_PRESENT {
            used.tags.insert(tag.to_string());
        }

        for document in &snapshot.documents {
            for caps in TAG_RE.captures_iter(document) {
                used.tags.insert(caps[1].to_ascii_lowercase());
            }
            for value in attribute_values(&CLASS_RE, document) {
                used.classes.extend(value.split_whitespace().map(str::to_string));
            }
            for value in attribute_values(&ID_RE, document) {
                used.ids.insert(value.trim().to_string());
            }
        }

        used
    }

    /// Check a single selector (no commas) against the collected symbols.
    pub fn matches(&self, selector: &str) -> bool {
        let stripped = IGNORED_RE.replace_all(selector, " ");

        TOKEN_RE.captures_iter(&stripped).all(|caps| {
            let name = caps[2].replace('\\', "");
            match &caps[1] {
                "." => self.classes.contains(&name),
                "#" => self.ids.contains(&name),
                _ => {
                    // Keyframe selectors and numeric fragments
                    if name.starts_with(|c: char| c.is_ascii_digit()) {
                        return true;
                    }
                    self.tags.contains(&name.to_ascii_lowercase())
                }
            }
        })
    }
}

fn attribute_values<'a>(re: &'a Regex, document: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    re.captures_iter(document).filter_map(|caps| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
    })
}

/// Drop unused selectors, and rules left without any, from a rule list.
///
/// Returns the number of selectors removed.
pub fn remove_unused(rules: &mut CssRuleList, used: &UsedSymbols) -> usize {
    let mut removed = 0;

    rules.0.retain_mut(|rule| match rule {
        CssRule::Style(style) => {
            let before = style.selectors.0.len();
            style.selectors.0.retain(|selector| {
                selector
                    .to_css_string(PrinterOptions::default())
                    .map(|text| used.matches(&text))
                    .unwrap_or(true)
            });
            removed += before - style.selectors.0.len();
            !style.selectors.0.is_empty()
        }
        CssRule::Media(media) => {
            removed += remove_unused(&mut media.rules, used);
            !media.rules.0.is_empty()
        }
        CssRule::Supports(supports) => {
            removed += remove_unused(&mut supports.rules, used);
            !supports.rules.0.is_empty()
        }
        _ => true,
    });

    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use lightningcss::stylesheet::{ParserOptions, StyleSheet};

    fn snapshot(html: &str) -> HtmlSnapshot {
        HtmlSnapshot {
            documents: vec![html.to_string()],
        }
    }

    #[test]
    fn collects_symbols() {
        let used = UsedSymbols::from_snapshot(&snapshot(
            r##"<DIV class="card  card--wide" id='main'><a href="#">x</a></DIV>"##,
        ));

        assert!(used.matches("div"));
        assert!(used.matches(".card.card--wide"));
        assert!(used.matches("#main > a"));
        assert!(used.matches("body .card"));
        assert!(!used.matches(".missing"));
        assert!(!used.matches("div span"));
    }

    #[test]
    fn data_attributes_are_not_classes_or_ids() {
        let used = UsedSymbols::from_snapshot(&snapshot(
            r#"<div data-class="ghost" data-id="phantom" CLASS="real" aria-id='x'></div>"#,
        ));

        assert!(used.matches(".real"));
        assert!(!used.matches(".ghost"));
        assert!(!used.matches("#phantom"));
        assert!(!used.matches("#x"));
    }

    #[test]
    fn ignores_pseudo_and_attribute_parts() {
        let used = UsedSymbols::from_snapshot(&snapshot(r#"<button class="btn">"#));

        assert!(used.matches(".btn:hover"));
        assert!(used.matches("button::-moz-focus-inner"));
        assert!(used.matches("[type=\"button\"]"));
        assert!(used.matches(":root"));
        assert!(used.matches("*"));
        assert!(!used.matches(".nav:hover"));
    }

    #[test]
    fn removes_rules_and_selectors() {
        let css = ".used, .unused { color: red }\n.unused { color: blue }\n@media (max-width: 600px) { .unused { margin: 0 } .used { margin: 1px } }\n@font-face { font-family: x; src: url(x.woff) }";
        let mut sheet = StyleSheet::parse(css, ParserOptions::default()).unwrap();
        let used = UsedSymbols::from_snapshot(&snapshot(r#"<p class="used"></p>"#));

        let removed = remove_unused(&mut sheet.rules, &used);
        let out = sheet.to_css(PrinterOptions::default()).unwrap().code;

        assert_eq!(removed, 3);
        assert!(out.contains(".used"));
        assert!(!out.contains(".unused"));
        assert!(out.contains("@media"));
        assert!(out.contains("@font-face"));
    }

    #[test]
    fn drops_emptied_media_blocks() {
        let css = "@media print { .gone { display: none } }";
        let mut sheet = StyleSheet::parse(css, ParserOptions::default()).unwrap();

        remove_unused(&mut sheet.rules, &UsedSymbols::default());

        assert!(sheet.rules.0.is_empty());
    }
}
