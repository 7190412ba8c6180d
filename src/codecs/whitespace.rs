//! whiteSpace facet processing
//!
//! `preserve` leaves text untouched, `replace` turns tab, line feed and
//! carriage return into spaces, `collapse` additionally trims and squeezes
//! runs of spaces.

use crate::error::{Error, Result, ValidationError};

/// whiteSpace facet value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WhiteSpace {
    /// Preserve all white space
    Preserve,
    /// Replace tabs and newlines with spaces
    Replace,
    /// Replace and collapse multiple spaces
    Collapse,
}

impl WhiteSpace {
    /// Parse from string value
    pub fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "preserve" => Ok(WhiteSpace::Preserve),
            "replace" => Ok(WhiteSpace::Replace),
            "collapse" => Ok(WhiteSpace::Collapse),
            _ => Err(Error::Value(format!(
                "Invalid whiteSpace value: '{}'. Must be 'preserve', 'replace', or 'collapse'",
                s
            ))),
        }
    }

    /// Facet keyword
    pub fn as_str(&self) -> &'static str {
        match self {
            WhiteSpace::Preserve => "preserve",
            WhiteSpace::Replace => "replace",
            WhiteSpace::Collapse => "collapse",
        }
    }

    /// Normalize a string according to this white space mode
    pub fn normalize(&self, s: &str) -> String {
        match self {
            WhiteSpace::Preserve => s.to_string(),
            WhiteSpace::Replace => s.replace(['\t', '\n', '\r'], " "),
            WhiteSpace::Collapse => collapse(s),
        }
    }

    /// Validate that a value conforms to this white space mode
    pub fn validate(&self, value: &str) -> std::result::Result<(), ValidationError> {
        match self {
            WhiteSpace::Preserve => Ok(()),
            WhiteSpace::Replace => {
                if value.contains(['\t', '\n', '\r']) {
                    Err(ValidationError::new("Value contains tabs or newlines")
                        .with_reason("whiteSpace facet is 'replace'"))
                } else {
                    Ok(())
                }
            }
            WhiteSpace::Collapse => {
                if value.contains(['\t', '\n', '\r'])
                    || value.contains("  ")
                    || value.starts_with(' ')
                    || value.ends_with(' ')
                {
                    Err(ValidationError::new("Value contains non-collapsed white spaces")
                        .with_reason("whiteSpace facet is 'collapse'"))
                } else {
                    Ok(())
                }
            }
        }
    }
}

fn collapse(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    // true at the start trims leading spaces
    let mut prev_space = true;

    for c in s.chars() {
        if matches!(c, ' ' | '\t' | '\n' | '\r') {
            if !prev_space {
                result.push(' ');
                prev_space = true;
            }
        } else {
            result.push(c);
            prev_space = false;
        }
    }

    if result.ends_with(' ') {
        result.pop();
    }
    result
}

/// Split list text into items after collapsing
pub fn split_list(text: &str) -> Vec<&str> {
    text.split(|c: char| matches!(c, ' ' | '\t' | '\n' | '\r'))
        .filter(|item| !item.is_empty())
        .collect()
}
