//! Structural rule merging for production builds.
//!
//! Two rewrites, applied per rule list and inside `@media`:
//! - an earlier style rule identical to a later one (same selectors, same
//!   declarations) is dropped
//! - a style rule whose declarations match an earlier rule is folded into
//!   that rule, provided no rule in between sets any of those properties

use std::collections::HashSet;

use lightningcss::declaration::DeclarationBlock;
use lightningcss::printer::PrinterOptions;
use lightningcss::rules::style::StyleRule;
use lightningcss::rules::{CssRule, CssRuleList};
use lightningcss::traits::ToCss;

/// Shorthands whose longhands do not share their name as a prefix.
const SHORTHANDS: &[(&str, &[&str])] = &[
    ("font", &["line-height"]),
    ("inset", &["top", "right", "bottom", "left"]),
    ("gap", &["row-gap", "column-gap"]),
    ("place-content", &["align-content", "justify-content"]),
    ("place-items", &["align-items", "justify-items"]),
    ("place-self", &["align-self", "justify-self"]),
    ("columns", &["column-width", "column-count"]),
    ("grid", &["grid-template", "grid-auto", "grid-row", "grid-column"]),
];

/// Apply both rewrites; returns the number of rules removed.
pub fn restructure(rules: &mut CssRuleList) -> usize {
    let mut removed = drop_duplicates(rules);
    removed += merge_by_body(rules);

    for rule in rules.0.iter_mut() {
        if let CssRule::Media(media) = rule {
            removed += restructure(&mut media.rules);
        }
    }

    removed
}

fn drop_duplicates(rules: &mut CssRuleList) -> usize {
    let keys: Vec<Option<String>> = rules
        .0
        .iter()
        .map(|rule| match rule {
            CssRule::Style(style) if style.rules.0.is_empty() => rule_key(style),
            _ => None,
        })
        .collect();

    let mut seen = HashSet::new();
    let mut keep = vec![true; keys.len()];
    for (i, key) in keys.iter().enumerate().rev() {
        if let Some(key) = key {
            keep[i] = seen.insert(key.as_str());
        }
    }

    let before = rules.0.len();
    let mut index = 0;
    rules.0.retain(|_| {
        let kept = keep[index];
        index += 1;
        kept
    });

    before - rules.0.len()
}

/// What the merge needs to know about one rule.
struct Body {
    /// Declarations key, for rules that may take part in a merge
    key: Option<String>,

    /// Properties set, or `None` for rules the merge cannot see through
    properties: Option<Vec<String>>,
}

impl Body {
    fn of(rule: &CssRule) -> Self {
        match rule {
            CssRule::Style(style) if style.rules.0.is_empty() => Self {
                key: is_mergeable(style)
                    .then(|| declarations_key(&style.declarations))
                    .flatten(),
                properties: Some(property_names(&style.declarations)),
            },
            _ => Self {
                key: None,
                properties: None,
            },
        }
    }
}

fn merge_by_body(rules: &mut CssRuleList) -> usize {
    let mut bodies: Vec<Body> = rules.0.iter().map(Body::of).collect();
    let mut count = 0;

    let mut j = 1;
    while j < rules.0.len() {
        let Some(i) = merge_target(&bodies, j) else {
            j += 1;
            continue;
        };

        let current = rules.0.remove(j);
        bodies.remove(j);
        if let (CssRule::Style(target), CssRule::Style(current)) = (&mut rules.0[i], current) {
            target.selectors.0.extend(current.selectors.0);
        }
        count += 1;
    }

    count
}

/// Nearest earlier rule with the same declarations as rule `j`, when every
/// rule in between leaves those properties alone.
fn merge_target(bodies: &[Body], j: usize) -> Option<usize> {
    let key = bodies[j].key.as_ref()?;
    let properties = bodies[j].properties.as_ref()?;

    for i in (0..j).rev() {
        let body = &bodies[i];
        if body.key.as_ref() == Some(key) {
            return Some(i);
        }
        let between = body.properties.as_ref()?;
        if between.iter().any(|a| properties.iter().any(|b| overlaps(a, b))) {
            return None;
        }
    }

    None
}

fn overlaps(a: &str, b: &str) -> bool {
    a == "all" || b == "all" || covers(a, b) || covers(b, a)
}

/// `shorthand` equals `property` or sets it.
fn covers(shorthand: &str, property: &str) -> bool {
    if property == shorthand {
        return true;
    }
    if property
        .strip_prefix(shorthand)
        .is_some_and(|rest| rest.starts_with('-'))
    {
        return true;
    }
    SHORTHANDS
        .iter()
        .filter(|(name, _)| *name == shorthand)
        .flat_map(|(_, longhands)| longhands.iter())
        .any(|longhand| property == *longhand || property.starts_with(&format!("{longhand}-")))
}

fn property_names(block: &DeclarationBlock) -> Vec<String> {
    block
        .declarations
        .iter()
        .chain(block.important_declarations.iter())
        .map(|p| p.property_id().name().to_string())
        .collect()
}

fn is_mergeable(rule: &StyleRule) -> bool {
    rule.rules.0.is_empty() && rule.vendor_prefix.is_empty() && !has_vendor_pseudo(rule)
}

fn has_vendor_pseudo(rule: &StyleRule) -> bool {
    rule.selectors
        .to_css_string(PrinterOptions::default())
        .map(|text| text.contains(":-"))
        .unwrap_or(true)
}

fn rule_key(rule: &StyleRule) -> Option<String> {
    let selectors = rule.selectors.to_css_string(PrinterOptions::default()).ok()?;
    let declarations = declarations_key(&rule.declarations)?;
    Some(format!("{selectors}{{{declarations}}}"))
}

fn declarations_key(block: &DeclarationBlock) -> Option<String> {
    let normal = block
        .declarations
        .iter()
        .map(|p| p.to_css_string(false, PrinterOptions::default()));
    let important = block
        .important_declarations
        .iter()
        .map(|p| p.to_css_string(true, PrinterOptions::default()));

    normal
        .chain(important)
        .collect::<Result<Vec<_>, _>>()
        .ok()
        .map(|parts| parts.join(";"))
}
