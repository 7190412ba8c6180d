//! Schema location resolution
//!
//! `xs:import` and `xs:include` carry location hints. A [`SchemaLocator`]
//! turns a hint into a concrete [`Location`]; locators are pluggable so that
//! callers can serve schemas from memory, a catalog, or a bundle.

use crate::error::Result;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;
use url::Url;

/// Resource location - can be a URL, file path, or in-memory content
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    /// File system path
    Path(PathBuf),
    /// URL (http, https, ftp, etc.)
    Url(Url),
    /// In-memory document content
    String(String),
}

impl Location {
    /// Create a location from a string (auto-detect type)
    pub fn from_str(s: &str) -> Result<Self> {
        if let Ok(url) = Url::parse(s) {
            if url.scheme() == "file" {
                if let Ok(path) = url.to_file_path() {
                    return Ok(Location::Path(path));
                }
            } else if url.scheme().len() > 1 {
                // single-letter schemes are Windows drive letters
                return Ok(Location::Url(url));
            }
        }

        Ok(Location::Path(PathBuf::from(s)))
    }

    /// Get the location as a string
    pub fn as_str(&self) -> String {
        match self {
            Location::Path(p) => p.to_string_lossy().to_string(),
            Location::Url(u) => u.to_string(),
            Location::String(_) => "<memory>".to_string(),
        }
    }

    /// Check if this is a remote location (URL)
    pub fn is_remote(&self) -> bool {
        matches!(self, Location::Url(_))
    }

    /// Resolve a relative hint against this location
    pub fn join(&self, hint: &str) -> Result<Location> {
        match self {
            Location::Path(base) => {
                let candidate = PathBuf::from(hint);
                if candidate.is_absolute() {
                    return Ok(Location::Path(candidate));
                }
                if let Ok(url) = Url::parse(hint) {
                    if url.scheme().len() > 1 {
                        return Location::from_str(hint);
                    }
                }
                let dir = base.parent().map(|p| p.to_path_buf()).unwrap_or_default();
                Ok(Location::Path(dir.join(candidate)))
            }
            Location::Url(base) => Ok(Location::Url(base.join(hint)?)),
            Location::String(_) => Location::from_str(hint),
        }
    }
}

/// Resolves `schemaLocation` hints found in imports and includes
pub trait SchemaLocator: Send + Sync {
    /// Locate the schema for `namespace` given a location `hint` found in
    /// a schema loaded from `base`. Returns `None` when this locator does
    /// not know the schema.
    fn locate(&self, namespace: Option<&str>, hint: Option<&str>, base: Option<&Location>)
        -> Option<Location>;
}

/// Resolves hints relative to the including schema's location
#[derive(Debug, Default, Clone, Copy)]
pub struct RelativeLocator;

impl SchemaLocator for RelativeLocator {
    fn locate(
        &self,
        _namespace: Option<&str>,
        hint: Option<&str>,
        base: Option<&Location>,
    ) -> Option<Location> {
        let hint = hint?;
        match base {
            Some(base) => base.join(hint).ok(),
            None => Location::from_str(hint).ok(),
        }
    }
}

/// Serves schema text registered in memory, keyed by location hint or
/// namespace
#[derive(Debug, Default)]
pub struct MemoryLocator {
    by_hint: RwLock<HashMap<String, String>>,
    by_namespace: RwLock<HashMap<String, String>>,
}

impl MemoryLocator {
    /// Create an empty locator
    pub fn new() -> Self {
        Self::default()
    }

    /// Register schema text under a location hint
    pub fn with_location(self, hint: impl Into<String>, xsd: impl Into<String>) -> Self {
        if let Ok(mut map) = self.by_hint.write() {
            map.insert(hint.into(), xsd.into());
        }
        self
    }

    /// Register schema text for a namespace
    pub fn with_namespace(self, namespace: impl Into<String>, xsd: impl Into<String>) -> Self {
        if let Ok(mut map) = self.by_namespace.write() {
            map.insert(namespace.into(), xsd.into());
        }
        self
    }
}

impl SchemaLocator for MemoryLocator {
    fn locate(
        &self,
        namespace: Option<&str>,
        hint: Option<&str>,
        _base: Option<&Location>,
    ) -> Option<Location> {
        if let Some(hint) = hint {
            if let Some(text) = self.by_hint.read().ok()?.get(hint) {
                return Some(Location::String(text.clone()));
            }
        }
        let namespace = namespace?;
        self.by_namespace
            .read()
            .ok()?
            .get(namespace)
            .map(|text| Location::String(text.clone()))
    }
}
