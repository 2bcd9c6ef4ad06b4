//! Declaration ordering.
//!
//! Declarations are grouped (positioning, box model, typography, visual,
//! animation, everything else) and sorted by name inside each group. Equal
//! names keep their relative order, so prefixed fallbacks stay ahead of the
//! standard property.

use lightningcss::declaration::DeclarationBlock;
use lightningcss::properties::Property;
use lightningcss::rules::{CssRule, CssRuleList};

const POSITIONING: &[&str] = &["position", "inset", "top", "right", "bottom", "left", "z-index"];

const BOX_MODEL: &[&str] = &[
    "display", "flex", "grid", "align-", "justify-", "place-", "order", "gap", "row-gap",
    "column-gap", "float", "clear", "box-sizing", "width", "min-width", "max-width", "height",
    "min-height", "max-height", "margin", "padding", "overflow", "columns", "column-",
    "table-layout", "empty-cells", "caption-side", "border-spacing", "border-collapse",
];

const TYPOGRAPHY: &[&str] = &[
    "font", "line-height", "letter-spacing", "text-", "white-space", "word-", "overflow-wrap",
    "hyphens", "tab-size", "direction", "unicode-bidi", "color", "vertical-align", "list-style",
    "quotes", "content", "counter-",
];

const VISUAL: &[&str] = &[
    "background", "border", "outline", "box-shadow", "box-decoration-break", "opacity",
    "visibility", "filter", "backdrop-filter", "mix-blend-mode", "clip", "mask", "cursor",
    "pointer-events", "resize", "user-select", "appearance", "fill", "stroke", "object-",
];

const ANIMATION: &[&str] = &[
    "transition", "animation", "transform", "perspective", "backface-visibility", "will-change",
];

/// Group rank of a property name; lower sorts first.
pub fn group_rank(name: &str) -> u8 {
    let groups: [&[&str]; 5] = [POSITIONING, BOX_MODEL, TYPOGRAPHY, VISUAL, ANIMATION];

    groups
        .iter()
        .position(|group| group.iter().any(|prefix| matches_prefix(name, prefix)))
        .map(|i| i as u8)
        .unwrap_or(groups.len() as u8)
}

fn matches_prefix(name: &str, prefix: &str) -> bool {
    if prefix.ends_with('-') {
        return name.starts_with(prefix);
    }
    name == prefix || name.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('-'))
}

/// Sort declarations in every style rule of the list, recursing into
/// conditional group rules.
pub fn sort_rules(rules: &mut CssRuleList) {
    for rule in rules.0.iter_mut() {
        match rule {
            CssRule::Style(style) => {
                sort_block(&mut style.declarations);
                sort_rules(&mut style.rules);
            }
            CssRule::Media(media) => sort_rules(&mut media.rules),
            CssRule::Supports(supports) => sort_rules(&mut supports.rules),
            _ => {}
        }
    }
}

fn sort_block(block: &mut DeclarationBlock) {
    sort_properties(&mut block.declarations);
    sort_properties(&mut block.important_declarations);
}

fn sort_properties(properties: &mut [Property]) {
    properties.sort_by_cached_key(|property| {
        let id = property.property_id();
        let name = id.name().to_string();
        (group_rank(&name), name)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};

    #[test]
    fn ranks_groups() {
        assert_eq!(group_rank("position"), 0);
        assert_eq!(group_rank("z-index"), 0);
        assert_eq!(group_rank("margin-top"), 1);
        assert_eq!(group_rank("flex-direction"), 1);
        assert_eq!(group_rank("font-size"), 2);
        assert_eq!(group_rank("color"), 2);
        assert_eq!(group_rank("border-radius"), 3);
        assert_eq!(group_rank("transition"), 4);
        assert_eq!(group_rank("will-change"), 4);
        assert_eq!(group_rank("zoom"), 5);
    }

    #[test]
    fn prefix_requires_segment_boundary() {
        assert!(matches_prefix("margin-left", "margin"));
        assert!(!matches_prefix("marginal", "margin"));
        assert!(matches_prefix("text-align", "text-"));
    }

    #[test]
    fn sorts_declarations_by_group_then_name() {
        let css = ".a { color: red; opacity: 0; position: absolute; width: 10px; display: block }";
        let mut sheet = StyleSheet::parse(css, ParserOptions::default()).unwrap();

        sort_rules(&mut sheet.rules);
        let out = sheet
            .to_css(PrinterOptions {
                minify: true,
                ..PrinterOptions::default()
            })
            .unwrap()
            .code;

        assert_eq!(
            out,
            ".a{position:absolute;display:block;width:10px;color:red;opacity:0}"
        );
    }

    #[test]
    fn sorts_inside_media() {
        let css = "@media print { .a { color: red; display: none } }";
        let mut sheet = StyleSheet::parse(css, ParserOptions::default()).unwrap();

        sort_rules(&mut sheet.rules);
        let out = sheet
            .to_css(PrinterOptions {
                minify: true,
                ..PrinterOptions::default()
            })
            .unwrap()
            .code;

        assert_eq!(out, "@media print{.a{display:none;color:red}}");
    }
}
