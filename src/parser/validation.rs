//! Validation during parsing
//!
//! Structural checks run while the document streams by: undeclared
//! children, occurrence bounds, required attributes, nil on non-nillable
//! elements, and simple-type facets. Violations go to an
//! [`ErrorCollector`]; in fail-fast mode the first one aborts the parse.

use tracing::debug;

use crate::error::{Error, Result, ValidationError};
use crate::namespaces::QName;
use crate::schema::{ChildParticles, Particle};

/// Collects validation errors for one parse session
#[derive(Debug, Clone, Default)]
pub struct ErrorCollector {
    enabled: bool,
    fail_fast: bool,
    errors: Vec<ValidationError>,
}

impl ErrorCollector {
    /// Create a collector; a disabled collector ignores every report
    pub fn new(enabled: bool, fail_fast: bool) -> Self {
        Self {
            enabled,
            fail_fast,
            errors: Vec::new(),
        }
    }

    /// Whether validation is on
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record an error, or return it as fatal in fail-fast mode
    pub fn report(&mut self, error: ValidationError) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        debug!(error = %error, "validation error");
        if self.fail_fast {
            return Err(Error::Validation(error));
        }
        self.errors.push(error);
        Ok(())
    }

    /// Record several errors
    pub fn report_all(&mut self, errors: impl IntoIterator<Item = ValidationError>) -> Result<()> {
        for error in errors {
            self.report(error)?;
        }
        Ok(())
    }

    /// Errors collected so far
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Take the collected errors
    pub fn take(&mut self) -> Vec<ValidationError> {
        std::mem::take(&mut self.errors)
    }
}

/// Particle a child counts against: its own, or the one of the
/// substitution group head it replaces
pub fn matching_particle<'a>(
    particles: &'a ChildParticles,
    name: &QName,
    is_substitutable: impl Fn(&QName, &QName) -> bool,
) -> Option<&'a Particle> {
    particles
        .get(name)
        .or_else(|| particles.iter().map(|(_, p)| p).find(|p| is_substitutable(name, p.name())))
}

/// Error for a child occurring more often than its particle allows
pub fn check_max_occurs(path: &str, particle: &Particle, count: u32) -> Option<ValidationError> {
    if !particle.occurs.is_exceeded(count) {
        return None;
    }
    Some(
        ValidationError::new(format!(
            "element {} occurs {} times, more than allowed",
            particle.name(),
            count
        ))
        .with_path(path)
        .with_reason(format!("maxOccurs is {:?}", particle.occurs.max)),
    )
}

/// Errors for children occurring fewer times than their particles require
pub fn check_min_occurs(
    path: &str,
    particles: &ChildParticles,
    count: impl Fn(&QName) -> u32,
) -> Vec<ValidationError> {
    particles
        .iter()
        .filter(|(name, particle)| particle.occurs.is_missing(count(name)))
        .map(|(name, particle)| {
            ValidationError::new(format!("missing required element {}", name))
                .with_path(path)
                .with_reason(format!("minOccurs is {}", particle.occurs.min))
        })
        .collect()
}

/// Error for a child the content model does not allow
pub fn unexpected_child(path: &str, name: &QName) -> ValidationError {
    ValidationError::new(format!("unexpected child element {}", name)).with_path(path)
}

/// Error for a required attribute that is absent
pub fn missing_attribute(path: &str, name: &QName) -> ValidationError {
    ValidationError::new(format!("missing required attribute {}", name)).with_path(path)
}

/// Error for an attribute the type does not declare
pub fn unexpected_attribute(path: &str, name: &QName) -> ValidationError {
    ValidationError::new(format!("unexpected attribute {}", name)).with_path(path)
}

/// Error for xsi:nil on an element that is not nillable
pub fn not_nillable(path: &str, name: &QName) -> ValidationError {
    ValidationError::new(format!("element {} is not nillable", name)).with_path(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ElementDecl, Occurs};
    use std::sync::Arc;

    fn particle(name: &str, occurs: Occurs) -> Particle {
        Particle::new(Arc::new(ElementDecl::new(QName::local(name), None)), occurs)
    }

    #[test]
    fn test_collector_modes() {
        let mut off = ErrorCollector::new(false, true);
        off.report(ValidationError::new("ignored")).unwrap();
        assert!(off.errors().is_empty());

        let mut collecting = ErrorCollector::new(true, false);
        collecting.report(ValidationError::new("one")).unwrap();
        collecting.report(ValidationError::new("two")).unwrap();
        assert_eq!(collecting.errors().len(), 2);
        assert_eq!(collecting.take().len(), 2);
        assert!(collecting.errors().is_empty());

        let mut fail_fast = ErrorCollector::new(true, true);
        let err = fail_fast.report(ValidationError::new("boom")).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_occurrence_checks() {
        let once = particle("a", Occurs::once());
        assert!(check_max_occurs("/r", &once, 1).is_none());
        let err = check_max_occurs("/r", &once, 2).unwrap();
        assert_eq!(err.path.as_deref(), Some("/r"));

        let many = particle("b", Occurs::zero_or_more());
        assert!(check_max_occurs("/r", &many, 100).is_none());
    }
}
