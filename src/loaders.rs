//! Schema text loading
//!
//! [`Loader`] turns a [`Location`] into the text the schema reader parses.
//! Files are size-checked against the configured [`Limits`] before they
//! are read; in-memory locations are served as they are. Remote locations
//! are refused unless allowed.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::locations::Location;

const BOM: char = '\u{feff}';

/// Reads schema documents from their locations
#[derive(Debug, Clone, Default)]
pub struct Loader {
    limits: Limits,
    allow_remote: bool,
}

impl Loader {
    /// Loader with default limits that refuses remote locations
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `limits` for the size check
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Allow or refuse remote locations
    pub fn with_allow_remote(mut self, allow: bool) -> Self {
        self.allow_remote = allow;
        self
    }

    /// Text of the document at `location`, without a byte order mark
    pub fn load(&self, location: &Location) -> Result<String> {
        let text = match location {
            Location::Path(path) => self.read_file(path)?,
            Location::Url(url) if !self.allow_remote => {
                return Err(Error::Schema(format!("remote schema refused: {}", url)));
            }
            // TODO: fetch http(s) schemas once a client crate is chosen
            Location::Url(url) => return Err(Error::Schema(format!("cannot fetch remote schema {}", url))),
            Location::String(text) => {
                self.limits.check_document_size(text.len())?;
                text.clone()
            }
        };
        Ok(match text.strip_prefix(BOM) {
            Some(rest) => rest.to_string(),
            None => text,
        })
    }

    fn read_file(&self, path: &Path) -> Result<String> {
        let size = fs::metadata(path)
            .map_err(|e| Error::Schema(format!("cannot read schema '{}': {}", path.display(), e)))?
            .len();
        self.limits
            .check_document_size(usize::try_from(size).unwrap_or(usize::MAX))?;
        let bytes = fs::read(path)?;
        debug!(path = %path.display(), bytes = bytes.len(), "schema file read");
        String::from_utf8(bytes)
            .map_err(|e| Error::Schema(format!("schema '{}' is not UTF-8: {}", path.display(), e)))
    }
}
