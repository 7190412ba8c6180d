//! Constraining facets of simple types
//!
//! Only the lexical facets that matter for instance text are modelled:
//! whiteSpace, length, minLength, maxLength, enumeration and pattern.
//! Violations are reported as [`ValidationError`]s; the parser decides
//! whether they are collected or fatal.

use regex::Regex;

use crate::codecs::WhiteSpace;
use crate::error::{Error, Result, ValidationError};

/// Pattern facet using regular expressions
#[derive(Debug, Clone)]
pub struct PatternFacet {
    /// Regular expression pattern as written in the schema
    pub pattern: String,
    /// Compiled regex, anchored at both ends
    regex: Regex,
}

impl PatternFacet {
    /// Create a new pattern facet from an XSD regular expression
    pub fn new(pattern: &str) -> Result<Self> {
        let translated = pattern
            .replace("\\i", "[_:A-Za-z]")
            .replace("\\c", "[-._:A-Za-z0-9]");
        let regex = Regex::new(&format!("^(?:{})$", translated))
            .map_err(|e| Error::Schema(format!("Invalid pattern '{}': {}", pattern, e)))?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// Check a value against this pattern
    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

/// Facets declared on one simple type restriction step
#[derive(Debug, Clone, Default)]
pub struct FacetSet {
    /// White space handling
    pub white_space: Option<WhiteSpace>,
    /// Exact length (characters, or items for list types)
    pub length: Option<usize>,
    /// Minimum length
    pub min_length: Option<usize>,
    /// Maximum length
    pub max_length: Option<usize>,
    /// Allowed values
    pub enumeration: Vec<String>,
    /// Pattern facets (all must match)
    pub patterns: Vec<PatternFacet>,
}

impl FacetSet {
    /// Create an empty facet set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the whiteSpace facet
    pub fn with_white_space(mut self, white_space: WhiteSpace) -> Self {
        self.white_space = Some(white_space);
        self
    }

    /// Whether no facet is set
    pub fn is_empty(&self) -> bool {
        self.white_space.is_none()
            && self.length.is_none()
            && self.min_length.is_none()
            && self.max_length.is_none()
            && self.enumeration.is_empty()
            && self.patterns.is_empty()
    }

    /// Check an atomic value (already whitespace-normalized)
    pub fn check_value(&self, value: &str) -> Vec<ValidationError> {
        let mut errors = self.check_length(value.chars().count(), "length");
        errors.extend(self.check_lexical(value));
        errors
    }

    /// Check a list value: length facets count items, enumeration and
    /// pattern apply to the whole normalized text
    pub fn check_list(&self, items: &[&str], normalized: &str) -> Vec<ValidationError> {
        let mut errors = self.check_length(items.len(), "item count");
        errors.extend(self.check_lexical(normalized));
        errors
    }

    fn check_length(&self, actual: usize, what: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if let Some(length) = self.length {
            if actual != length {
                errors.push(
                    ValidationError::new(format!("Value has {} {}, expected {}", what, actual, length))
                        .with_reason("length facet"),
                );
            }
        }
        if let Some(min) = self.min_length {
            if actual < min {
                errors.push(
                    ValidationError::new(format!("Value has {} {}, minimum is {}", what, actual, min))
                        .with_reason("minLength facet"),
                );
            }
        }
        if let Some(max) = self.max_length {
            if actual > max {
                errors.push(
                    ValidationError::new(format!("Value has {} {}, maximum is {}", what, actual, max))
                        .with_reason("maxLength facet"),
                );
            }
        }
        errors
    }

    fn check_lexical(&self, value: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if !self.enumeration.is_empty() && !self.enumeration.iter().any(|v| v == value) {
            errors.push(
                ValidationError::new(format!("Value '{}' is not in the enumeration", value))
                    .with_reason(format!("Allowed values: {}", self.enumeration.join(", "))),
            );
        }
        for pattern in &self.patterns {
            if !pattern.is_match(value) {
                errors.push(
                    ValidationError::new(format!("Value does not match pattern '{}'", pattern.pattern))
                        .with_reason(format!("Value: '{}'", value)),
                );
            }
        }
        errors
    }
}
