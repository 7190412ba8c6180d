//! Particles and content models
//!
//! A particle pairs a schema term (element, model group or wildcard) with
//! its occurrence bounds. The index flattens content models into an ordered
//! map of child element name to [`Particle`].

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::namespaces::QName;

use super::components::ElementDecl;

/// Occurrence bounds for a particle (minOccurs, maxOccurs)
/// None for max means unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurs {
    /// Minimum number of occurrences (default 1)
    pub min: u32,
    /// Maximum number of occurrences (None = unbounded, default 1)
    pub max: Option<u32>,
}

impl Occurs {
    /// Create new occurrence bounds
    pub fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    /// Default occurrence (1, 1)
    pub fn once() -> Self {
        Self { min: 1, max: Some(1) }
    }

    /// Optional occurrence (0, 1)
    pub fn optional() -> Self {
        Self { min: 0, max: Some(1) }
    }

    /// Zero or more (0, unbounded)
    pub fn zero_or_more() -> Self {
        Self { min: 0, max: None }
    }

    /// One or more (1, unbounded)
    pub fn one_or_more() -> Self {
        Self { min: 1, max: None }
    }

    /// Check if this particle can be empty (minOccurs == 0)
    pub fn is_emptiable(&self) -> bool {
        self.min == 0
    }

    /// Check if this particle occurs at most once
    pub fn is_single(&self) -> bool {
        matches!(self.max, Some(max) if max <= 1)
    }

    /// Check if this particle can have multiple occurrences
    pub fn is_multiple(&self) -> bool {
        !self.is_single()
    }

    /// Check if `count` occurrences are below the minimum
    pub fn is_missing(&self, count: u32) -> bool {
        count < self.min
    }

    /// Check if `count` occurrences exceed the maximum
    pub fn is_exceeded(&self, count: u32) -> bool {
        matches!(self.max, Some(max) if count > max)
    }

    /// Bounds of a term nested inside a group with bounds `outer`
    pub fn multiply(&self, outer: Occurs) -> Occurs {
        let max = match (self.max, outer.max) {
            (Some(0), _) | (_, Some(0)) => Some(0),
            (Some(a), Some(b)) => Some(a.saturating_mul(b)),
            _ => None,
        };
        Occurs::new(self.min.saturating_mul(outer.min), max)
    }

    /// Bounds of two particles for the same name in one content model
    pub fn add(&self, other: Occurs) -> Occurs {
        let max = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(a.saturating_add(b)),
            _ => None,
        };
        Occurs::new(self.min.saturating_add(other.min), max)
    }

    /// Same bounds with the minimum dropped to zero (choice members)
    pub fn emptiable(&self) -> Occurs {
        Occurs::new(0, self.max)
    }
}

impl Default for Occurs {
    fn default() -> Self {
        Self::once()
    }
}

/// Parse minOccurs/maxOccurs from XML attribute values
pub fn parse_occurs(min_occurs: Option<&str>, max_occurs: Option<&str>) -> Result<Occurs> {
    let mut occurs = Occurs::once();

    if let Some(min_str) = min_occurs {
        occurs.min = min_str.trim().parse::<u32>().map_err(|_| {
            Error::Schema(format!(
                "minOccurs value '{}' is not a valid non-negative integer",
                min_str
            ))
        })?;
    }

    match max_occurs.map(str::trim) {
        Some("unbounded") => occurs.max = None,
        Some(max_str) => {
            let max = max_str.parse::<u32>().map_err(|_| {
                Error::Schema(format!(
                    "maxOccurs value '{}' must be a non-negative integer or 'unbounded'",
                    max_str
                ))
            })?;
            if occurs.min > max {
                return Err(Error::Schema(
                    "maxOccurs must be 'unbounded' or greater than minOccurs".to_string(),
                ));
            }
            occurs.max = Some(max);
        }
        None => {
            if occurs.min > 1 {
                return Err(Error::Schema(
                    "minOccurs must be lesser or equal than maxOccurs".to_string(),
                ));
            }
        }
    }

    Ok(occurs)
}

/// Kind of model group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelGroupKind {
    /// xs:sequence
    Sequence,
    /// xs:choice
    Choice,
    /// xs:all
    All,
}

/// Element term of a model group
#[derive(Debug, Clone)]
pub enum ElementTerm {
    /// Locally declared element
    Local(Arc<ElementDecl>),
    /// Reference to a global element
    Ref(QName),
}

/// Term of a model group with its occurrence bounds
#[derive(Debug, Clone)]
pub enum Term {
    /// Element particle
    Element(ElementTerm, Occurs),
    /// Nested model group
    Group(ModelGroup),
    /// Reference to a named model group
    GroupRef(QName, Occurs),
    /// Element wildcard (xs:any)
    Any(Occurs),
}

/// Model group (sequence, choice, all)
#[derive(Debug, Clone)]
pub struct ModelGroup {
    /// Group kind
    pub kind: ModelGroupKind,
    /// Occurrence bounds of the group itself
    pub occurs: Occurs,
    /// Terms in declaration order
    pub terms: Vec<Term>,
}

impl ModelGroup {
    /// Create an empty group
    pub fn new(kind: ModelGroupKind) -> Self {
        Self {
            kind,
            occurs: Occurs::once(),
            terms: Vec::new(),
        }
    }

    /// Set the occurrence bounds
    pub fn with_occurs(mut self, occurs: Occurs) -> Self {
        self.occurs = occurs;
        self
    }

    /// Add a term
    pub fn with_term(mut self, term: Term) -> Self {
        self.terms.push(term);
        self
    }
}

/// Child element particle as seen from an enclosing element
#[derive(Debug, Clone)]
pub struct Particle {
    /// Declaration of the child element
    pub element: Arc<ElementDecl>,
    /// Effective occurrence bounds
    pub occurs: Occurs,
}

impl Particle {
    /// Create a particle
    pub fn new(element: Arc<ElementDecl>, occurs: Occurs) -> Self {
        Self { element, occurs }
    }

    /// Name of the child element
    pub fn name(&self) -> &QName {
        &self.element.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_occurs_predicates() {
        assert!(Occurs::once().is_single());
        assert!(Occurs::optional().is_single());
        assert!(Occurs::zero_or_more().is_multiple());
        assert!(Occurs::new(0, Some(2)).is_multiple());

        assert!(Occurs::once().is_missing(0));
        assert!(!Occurs::optional().is_missing(0));
        assert!(Occurs::once().is_exceeded(2));
        assert!(!Occurs::one_or_more().is_exceeded(100));
    }

    #[test]
    fn test_occurs_arithmetic() {
        let nested = Occurs::once().multiply(Occurs::zero_or_more());
        assert_eq!(nested, Occurs::zero_or_more());

        let twice = Occurs::once().add(Occurs::optional());
        assert_eq!(twice, Occurs::new(1, Some(2)));

        assert_eq!(Occurs::once().emptiable(), Occurs::optional());
    }

    #[test]
    fn test_parse_occurs() {
        assert_eq!(parse_occurs(None, None).unwrap(), Occurs::once());
        assert_eq!(
            parse_occurs(Some("0"), Some("unbounded")).unwrap(),
            Occurs::zero_or_more()
        );
        assert_eq!(parse_occurs(Some("2"), Some("5")).unwrap(), Occurs::new(2, Some(5)));
        assert!(parse_occurs(Some("3"), Some("2")).is_err());
        assert!(parse_occurs(Some("2"), None).is_err());
        assert!(parse_occurs(Some("x"), None).is_err());
    }
}
