//! # xmlbinding
//!
//! Schema-driven XML parsing and encoding through pluggable type bindings.
//!
//! An XML Schema describes the elements, attributes and types of a
//! document. This crate streams an instance document against such a
//! schema and maps every element and attribute to a *binding*: a small
//! strategy object attached to one schema type that turns text and
//! children into a typed [`Value`], and writes a value back to XML.
//!
//! Bindings follow the type hierarchy. A value typed `Derived` is parsed by
//! the binding of `Derived`, whose result is then handed to the binding of
//! its base type, and so on up to `xs:anyType`, so each level can refine
//! what the more specific level produced.
//!
//! ## Features
//!
//! - Streaming parse with a handler stack mirroring the document
//! - Whitespace and facet aware text pre-processing, including list types
//! - Built-in bindings for the XSD primitive and derived types
//! - Optional validation with fail-fast or collected errors
//! - Streaming delivery of repeated elements with bounded memory
//! - Encoding back to XML with schema-ordered property extraction
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use xmlbinding::{Parser, ParserSettings, SchemaReader, XsConfiguration};
//!
//! let schema = SchemaReader::new().read_str(XSD)?;
//! let mut parser = Parser::new(Arc::new(XsConfiguration))
//!     .with_settings(ParserSettings::new().with_schema(schema));
//! let value = parser.parse_str("<age> 42 </age>")?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod error;
pub mod limits;

// Names and locations
pub mod namespaces;
pub mod names;
pub mod locations;

// XML input and output
pub mod loaders;
pub mod events;
pub mod documents;

// Schema model
pub mod codecs;
pub mod schema;

// Values and bindings
pub mod values;
pub mod converters;
pub mod context;
pub mod bindings;

// Pipelines
pub mod config;
pub mod parser;
pub mod encoder;

// Re-exports for convenience
pub use bindings::{
    Binding, BindingInfo, BindingLoader, BindingWalker, ComplexBinding, ExecutionMode, Property,
    SimpleBinding,
};
pub use config::{Configuration, EncoderSettings, ParserSettings, XsConfiguration};
pub use context::Context;
pub use documents::{Document, Element};
pub use encoder::Encoder;
pub use error::{Error, Result, ValidationError};
pub use limits::Limits;
pub use namespaces::QName;
pub use parser::{Parser, StreamingParser};
pub use schema::{SchemaIndex, SchemaReader, XsdSchema};
pub use values::{Record, Value, ValueType};

/// Version of the xmlbinding library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
