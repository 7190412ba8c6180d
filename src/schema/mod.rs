//! Schema object model and index
//!
//! A minimal XSD object model read from schema documents, the built-in type
//! hierarchy, and the [`SchemaIndex`] the parser and encoder consult.

pub mod builtins;
pub mod components;
pub mod facets;
pub mod index;
pub mod parsing;
pub mod particles;
pub mod schemas;
pub mod types;

pub use builtins::{any_type, builtin_type, is_builtin};
pub use components::{
    AttributeDecl, AttributeGroupDecl, AttributeRef, AttributeUse, Declaration, ElementDecl,
};
pub use facets::{FacetSet, PatternFacet};
pub use index::{ChildParticles, ComponentKind, IndexedComponent, ResolvedAttribute, SchemaIndex, SimpleVariety};
pub use parsing::SchemaReader;
pub use particles::{ElementTerm, ModelGroup, ModelGroupKind, Occurs, Particle, Term};
pub use schemas::{ListenerId, SchemaChange, SchemaListener, XsdSchema};
pub use types::{ComplexTypeDef, ContentModel, Derivation, SimpleDerivation, SimpleTypeDef, TypeDefinition, TypeRef};
