//! Grid settings.

use serde::{Deserialize, Serialize};

use crate::GridError;

/// Mixin names a breakpoint may not take.
const RESERVED: &[&str] = &[
    "wrapper",
    "wrapper-full",
    "row-flex",
    "row-float",
    "row-ib",
    "row-offsets",
    "col",
    "col-offsets",
    "col-float",
    "col-ib",
    "col-padding",
    "size",
    "shift",
    "shift-left",
    "shift-right",
    "clearfix",
    "reset",
    "debug",
];

/// Settings for the generated grid partial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    /// File name without extension
    pub filename: String,

    /// Number of columns
    pub columns: u32,

    /// Gutter between columns
    pub offset: String,

    pub container: Container,

    /// Breakpoints in any order; emitted widest first
    pub break_points: Vec<Breakpoint>,
}

/// Outer wrapper dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Container {
    pub max_width: String,

    /// Horizontal padding of the wrapper
    pub fields: String,
}

/// A named media breakpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breakpoint {
    pub name: String,
    pub width: String,

    /// Wrapper padding below this width; inherited from the next wider one
    #[serde(default)]
    pub fields: Option<String>,

    /// Gutter below this width; inherited from the next wider one
    #[serde(default)]
    pub offset: Option<String>,
}

impl Breakpoint {
    pub fn new(name: &str, width: &str) -> Self {
        Self {
            name: name.to_string(),
            width: width.to_string(),
            fields: None,
            offset: None,
        }
    }

    pub fn with_fields(mut self, fields: &str) -> Self {
        self.fields = Some(fields.to_string());
        self
    }
}

impl Default for Container {
    fn default() -> Self {
        Self {
            max_width: "1000px".to_string(),
            fields: "30px".to_string(),
        }
    }
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            filename: "_smart-grid".to_string(),
            columns: 12,
            offset: "10px".to_string(),
            container: Container::default(),
            break_points: vec![
                Breakpoint::new("lg", "1200px"),
                Breakpoint::new("md", "992px").with_fields("15px"),
                Breakpoint::new("sm", "768px"),
                Breakpoint::new("xs", "576px"),
            ],
        }
    }
}

/// A breakpoint with every inherited value filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedBreakpoint {
    pub name: String,
    pub width: String,
    pub fields: String,
    pub offset: String,
}

impl GridSettings {
    /// Validate the settings and resolve breakpoint inheritance.
    ///
    /// Breakpoints come back sorted widest first.
    pub fn resolve(&self) -> Result<Vec<ResolvedBreakpoint>, GridError> {
        if self.columns == 0 {
            return Err(GridError::NoColumns);
        }
        if self.filename.is_empty() || self.filename.contains(['/', '\\']) {
            return Err(GridError::InvalidFilename(self.filename.clone()));
        }

        check_length("offset", &self.offset)?;
        check_length("container.max_width", &self.container.max_width)?;
        check_length("container.fields", &self.container.fields)?;

        let mut sorted: Vec<(f64, &Breakpoint)> = Vec::with_capacity(self.break_points.len());
        for bp in &self.break_points {
            check_name(&bp.name)?;
            if sorted.iter().any(|(_, other)| other.name == bp.name) {
                return Err(GridError::DuplicateBreakpoint(bp.name.clone()));
            }
            let (width, _) = check_length(&format!("{}.width", bp.name), &bp.width)?;
            if let Some(fields) = &bp.fields {
                check_length(&format!("{}.fields", bp.name), fields)?;
            }
            if let Some(offset) = &bp.offset {
                check_length(&format!("{}.offset", bp.name), offset)?;
            }
            sorted.push((width, bp));
        }
        sorted.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut fields = self.container.fields.clone();
        let mut offset = self.offset.clone();
        let resolved = sorted
            .into_iter()
            .map(|(_, bp)| {
                if let Some(f) = &bp.fields {
                    fields = f.clone();
                }
                if let Some(o) = &bp.offset {
                    offset = o.clone();
                }
                ResolvedBreakpoint {
                    name: bp.name.clone(),
                    width: bp.width.clone(),
                    fields: fields.clone(),
                    offset: offset.clone(),
                }
            })
            .collect();

        Ok(resolved)
    }
}

/// Split a CSS length into its number and unit.
pub fn parse_length(value: &str) -> Option<(f64, &str)> {
    let value = value.trim();
    let split = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);

    let number: f64 = number.parse().ok()?;
    if !(unit.is_empty() || unit == "%" || unit.chars().all(|c| c.is_ascii_alphabetic())) {
        return None;
    }
    if unit.is_empty() && number != 0.0 {
        return None;
    }

    Some((number, unit))
}

fn check_length(field: &str, value: &str) -> Result<(f64, String), GridError> {
    parse_length(value)
        .map(|(n, unit)| (n, unit.to_string()))
        .ok_or_else(|| GridError::InvalidLength {
            field: field.to_string(),
            value: value.to_string(),
        })
}

fn check_name(name: &str) -> Result<(), GridError> {
    let mut chars = name.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');

    if !valid {
        return Err(GridError::InvalidBreakpointName(name.to_string()));
    }
    if RESERVED.contains(&name) || name.starts_with("from-") || name.starts_with("size-") || name.starts_with("shift-") {
        return Err(GridError::ReservedBreakpointName(name.to_string()));
    }
    Ok(())
}
