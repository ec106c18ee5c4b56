//! Search filters and shell-pattern translation.

use std::fmt;
use std::str::FromStr;

use regex::Regex;

use crate::inventory::error::{InventoryError, InventoryResult};
use crate::table::SUB_SEPARATOR;

/// One `field=value` search condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFilter {
    pub field: String,
    pub value: String,
}

impl FieldFilter {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

impl FromStr for FieldFilter {
    type Err = InventoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((field, value)) if !field.trim().is_empty() => {
                Ok(Self::new(field.trim(), value.trim()))
            }
            _ => Err(InventoryError::InvalidFilter(s.to_string())),
        }
    }
}

impl fmt::Display for FieldFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.field, self.value)
    }
}

/// Translate a shell pattern into an anchored regular expression.
///
/// `**` matches any run of characters, `*` any run without the sub-field
/// separator `|`, and `?` a single character other than `|`. Everything else
/// matches literally.
pub fn shell_pattern_to_regex(pattern: &str) -> String {
    let not_sep = format!("[^{}]", regex::escape(&SUB_SEPARATOR.to_string()));
    let mut out = String::from("^");
    let mut chars = pattern.chars().peekable();
    let mut literal = String::new();

    while let Some(c) = chars.next() {
        match c {
            '*' | '?' => {
                out.push_str(&regex::escape(&literal));
                literal.clear();
                if c == '?' {
                    out.push_str(&not_sep);
                } else if chars.peek() == Some(&'*') {
                    chars.next();
                    out.push_str(".*");
                } else {
                    out.push_str(&not_sep);
                    out.push('*');
                }
            }
            other => literal.push(other),
        }
    }
    out.push_str(&regex::escape(&literal));
    out.push('$');
    out
}

/// Compile a filter value, either as a shell pattern or as a raw regex.
/// A raw regex must match at the start of the value.
pub fn compile(pattern: &str, use_regex: bool) -> InventoryResult<Regex> {
    let source = if use_regex {
        format!("^(?:{})", pattern)
    } else {
        shell_pattern_to_regex(pattern)
    };
    Regex::new(&source).map_err(|error| InventoryError::InvalidPattern {
        pattern: pattern.to_string(),
        error,
    })
}
