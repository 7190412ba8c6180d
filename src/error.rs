//! Error types for xmlbinding
//!
//! Structural and configuration problems (missing bindings, malformed
//! literals, mismatched tags) are fatal and surface as a single [`Error`].
//! Validation problems are collected as [`ValidationError`]s and only become
//! an [`Error`] when the parser is told to fail on the first one.

use std::fmt;
use thiserror::Error;

use crate::namespaces::QName;

/// Result type alias using the xmlbinding Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for parse and encode sessions
#[derive(Error, Debug)]
pub enum Error {
    /// No schema declaration could be found for an instance component
    #[error("no declaration found for {name}")]
    Declaration {
        /// Qualified name of the element or attribute
        name: QName,
    },

    /// A binding failed while parsing or encoding a component
    #[error("binding failure for {component}: {source}")]
    Binding {
        /// Qualified name of the component being processed
        component: QName,
        /// Underlying cause
        #[source]
        source: Box<Error>,
    },

    /// Configuration error (unsatisfied binding dependency, bad registration)
    #[error("configuration error: {0}")]
    Config(String),

    /// Validation error escalated to fatal (fail-fast mode)
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Schema loading or import error
    #[error("schema error: {0}")]
    Schema(String),

    /// Malformed XML or mismatched element nesting
    #[error("XML error: {0}")]
    Xml(String),

    /// Value error (text that cannot be converted to the target type)
    #[error("value error: {0}")]
    Value(String),

    /// Malformed lexical representation (durations, dates, ...)
    #[error("lexical error: {0}")]
    Lexical(String),

    /// Encoding error (value to XML conversion)
    #[error("encoding error: {0}")]
    Encode(String),

    /// Limit exceeded error
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing error
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wrap an error raised while processing `component`.
    ///
    /// Errors that already carry a component are not wrapped twice.
    pub fn binding(component: &QName, source: Error) -> Self {
        match source {
            Error::Binding { .. } => source,
            other => Error::Binding {
                component: component.clone(),
                source: Box::new(other),
            },
        }
    }

    /// Name of the component a binding failure refers to, if any
    pub fn component(&self) -> Option<&QName> {
        match self {
            Error::Binding { component, .. } => Some(component),
            Error::Declaration { name } => Some(name),
            _ => None,
        }
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Xml(err.to_string())
    }
}

/// Instance document validation error with context
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error message
    pub message: String,
    /// Path to the element that failed validation
    pub path: Option<String>,
    /// Schema component that caused the error
    pub schema_component: Option<String>,
    /// Original exception reason
    pub reason: Option<String>,
}

impl ValidationError {
    /// Create a new validation error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: None,
            schema_component: None,
            reason: None,
        }
    }

    /// Set the path where validation failed
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the schema component
    pub fn with_schema_component(mut self, component: impl Into<String>) -> Self {
        self.schema_component = Some(component.into());
        self
    }

    /// Set the reason
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(ref reason) = self.reason {
            write!(f, "\n\nReason: {}", reason)?;
        }

        if let Some(ref path) = self.path {
            write!(f, "\n\nPath: {}", path)?;
        }

        if let Some(ref schema) = self.schema_component {
            write!(f, "\n\nSchema:\n{}", schema)?;
        }

        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::new("Element 'foo' is not valid")
            .with_reason("Required element 'bar' is missing")
            .with_path("/root/foo")
            .with_schema_component("{urn:test}foo");

        let msg = format!("{}", err);
        assert!(msg.contains("Element 'foo' is not valid"));
        assert!(msg.contains("Reason:"));
        assert!(msg.contains("Path:"));
        assert!(msg.contains("Schema:"));
    }

    #[test]
    fn test_binding_error_names_component() {
        let name = QName::namespaced("urn:test", "age");
        let err = Error::binding(&name, Error::Value("not a number".into()));

        assert_eq!(err.component(), Some(&name));
        let msg = err.to_string();
        assert!(msg.contains("{urn:test}age"));
        assert!(msg.contains("not a number"));
    }

    #[test]
    fn test_binding_error_not_wrapped_twice() {
        let inner = QName::local("inner");
        let outer = QName::local("outer");
        let err = Error::binding(&outer, Error::binding(&inner, Error::Value("x".into())));
        assert_eq!(err.component(), Some(&inner));
    }

    #[test]
    fn test_error_conversion() {
        let val_err = ValidationError::new("test");
        let err: Error = val_err.into();
        assert!(matches!(err, Error::Validation(_)));
    }
}
