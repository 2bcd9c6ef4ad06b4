//! Media query grouping.

use lightningcss::printer::PrinterOptions;
use lightningcss::rules::media::MediaRule;
use lightningcss::rules::{CssRule, CssRuleList};
use lightningcss::traits::ToCss;

/// Merge top-level `@media` blocks that share a query.
///
/// Merged blocks are appended after every other rule, in the order their
/// query first appeared. Rules inside a merged block keep their order.
/// Returns the number of blocks folded into an earlier one.
pub fn merge_media(rules: &mut CssRuleList) -> usize {
    let mut plain = Vec::with_capacity(rules.0.len());
    let mut groups: Vec<(Option<String>, MediaRule)> = Vec::new();
    let mut merged = 0;

    for rule in std::mem::take(&mut rules.0) {
        let media = match rule {
            CssRule::Media(media) => media,
            other => {
                plain.push(other);
                continue;
            }
        };

        let key = media.query.to_css_string(PrinterOptions::default()).ok();
        let existing = key
            .as_ref()
            .and_then(|key| groups.iter().position(|(k, _)| k.as_ref() == Some(key)));

        match existing {
            Some(index) => {
                groups[index].1.rules.0.extend(media.rules.0);
                merged += 1;
            }
            None => groups.push((key, media)),
        }
    }

    plain.extend(groups.into_iter().map(|(_, media)| CssRule::Media(media)));
    rules.0 = plain;

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use lightningcss::stylesheet::{ParserOptions, StyleSheet};

    fn minified(sheet: &StyleSheet) -> String {
        sheet
            .to_css(PrinterOptions {
                minify: true,
                ..PrinterOptions::default()
            })
            .unwrap()
            .code
    }

    #[test]
    fn groups_identical_queries_at_the_end() {
        let css = ".a{color:red}\
            @media (max-width:600px){.b{color:red}}\
            .c{margin:0}\
            @media print{.e{display:none}}\
            @media (max-width:600px){.d{margin:0}}";
        let mut sheet = StyleSheet::parse(css, ParserOptions::default()).unwrap();

        let merged = merge_media(&mut sheet.rules);
        let out = minified(&sheet);

        assert_eq!(merged, 1);
        assert!(out.starts_with(".a{color:red}.c{margin:0}@media"));
        assert_eq!(out.matches("@media").count(), 2);
        assert!(out.contains("{.b{color:red}.d{margin:0}}"));
        assert!(out.ends_with("@media print{.e{display:none}}"));
    }

    #[test]
    fn leaves_sheet_without_media_alone() {
        let css = ".a{color:red}.b{margin:0}";
        let mut sheet = StyleSheet::parse(css, ParserOptions::default()).unwrap();

        assert_eq!(merge_media(&mut sheet.rules), 0);
        assert_eq!(minified(&sheet), css);
    }
}
