//! Parsing
//!
//! A [`Parser`] turns an XML instance into a [`Value`] by streaming its
//! events through a [`ParserHandler`]: every element gets a declaration,
//! a node in the [`ParseTree`], and, when it ends, a value computed by its
//! bindings. Setting a streaming target hands the values of that element
//! to a [`DeliveryBuffer`] instead of keeping them in the tree, which
//! keeps memory flat for large repetitive documents.

pub mod delegates;
pub mod executor;
pub mod handlers;
pub mod streaming;
pub mod tree;
pub mod validation;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::bindings::{BindingLoader, BindingWalker};
use crate::config::{default_schema, session_context, Configuration, ParserSettings};
use crate::context::Context;
use crate::error::{Result, ValidationError};
use crate::events::{EventReader, XmlEvent};
use crate::values::Value;

pub use delegates::{
    CaptureDelegate, DelegateSession, HandlerFactories, HandlerFactory, ParserDelegate, ParserDelegates,
    XmlFragment,
};
pub use executor::ParseExecutor;
pub use handlers::ParserHandler;
pub use streaming::{DeliveryBuffer, StreamingParser};
pub use tree::{InstanceComponent, NodeId, NodeRef, ParseTree};
pub use validation::ErrorCollector;

/// Schema-driven XML parser
pub struct Parser {
    configuration: Arc<dyn Configuration>,
    settings: ParserSettings,
    context: Arc<Context>,
    loader: Arc<BindingLoader>,
    walker: BindingWalker,
    buffer: Option<Arc<DeliveryBuffer>>,
    errors: Vec<ValidationError>,
}

impl std::fmt::Debug for Parser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser")
            .field("namespace", &self.configuration.namespace())
            .field("settings", &self.settings)
            .field("bindings", &self.loader.len())
            .finish()
    }
}

impl Parser {
    /// Create a parser for `configuration` with default settings
    pub fn new(configuration: Arc<dyn Configuration>) -> Self {
        let (context, loader) = session_context(&configuration);
        let walker = BindingWalker::new(loader.clone());
        let parser = Self {
            configuration,
            settings: ParserSettings::default(),
            context,
            loader,
            walker,
            buffer: None,
            errors: Vec::new(),
        };
        parser.context.register(parser.settings.clone());
        parser
    }

    /// Replace the settings
    pub fn with_settings(mut self, settings: ParserSettings) -> Self {
        self.buffer = settings
            .streaming_target()
            .map(|_| Arc::new(DeliveryBuffer::new()));
        self.context.register(settings.clone());
        self.settings = settings;
        self
    }

    /// Current settings
    pub fn settings(&self) -> &ParserSettings {
        &self.settings
    }

    /// Session context. Each document is parsed in a child of it.
    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    /// Binding registry
    pub fn loader(&self) -> &Arc<BindingLoader> {
        &self.loader
    }

    /// Delivery buffer of the streaming target, if one is set
    pub fn buffer(&self) -> Option<&Arc<DeliveryBuffer>> {
        self.buffer.as_ref()
    }

    pub(crate) fn set_buffer(&mut self, buffer: Arc<DeliveryBuffer>) {
        self.buffer = Some(buffer);
    }

    /// Validation errors of the last parse
    pub fn validation_errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Parse a document held in a string
    pub fn parse_str(&mut self, xml: &str) -> Result<Option<Value>> {
        self.settings.limits().check_document_size(xml.len())?;
        self.parse_reader(xml.as_bytes())
    }

    /// Parse a document from a file
    pub fn parse_file(&mut self, path: impl AsRef<Path>) -> Result<Option<Value>> {
        let path = path.as_ref();
        let size = std::fs::metadata(path)?.len();
        self.settings
            .limits()
            .check_document_size(usize::try_from(size).unwrap_or(usize::MAX))?;
        info!(path = %path.display(), "parsing document");
        self.parse_reader(BufReader::new(File::open(path)?))
    }

    /// Parse a document from a reader.
    ///
    /// Returns the value of the root element; `None` when the root is nil
    /// or empty, or when the root itself is the streaming target. The
    /// delivery buffer, if any, is closed afterwards.
    pub fn parse_reader<R: BufRead>(&mut self, input: R) -> Result<Option<Value>> {
        let result = self.run(input);
        if let Some(buffer) = &self.buffer {
            buffer.close();
        }
        result
    }

    /// Parse without closing the delivery buffer
    pub(crate) fn run<R: BufRead>(&mut self, input: R) -> Result<Option<Value>> {
        if self.settings.streaming_target().is_some() {
            let reopen = self.buffer.as_ref().map(|b| b.is_closed()).unwrap_or(true);
            if reopen {
                self.buffer = Some(Arc::new(DeliveryBuffer::new()));
            }
        }

        let mut handler = ParserHandler::new(
            self.settings.clone(),
            self.context.clone(),
            self.walker.clone(),
            default_schema(&self.configuration),
        );
        if let Some(buffer) = &self.buffer {
            handler = handler.with_buffer(buffer.clone());
        }

        let mut reader = EventReader::new(input);
        let outcome = loop {
            let event = match reader.next_event() {
                Ok(event) => event,
                Err(e) => break Err(e),
            };
            let end = matches!(event, XmlEvent::EndDocument);
            if let Err(e) = handler.handle(event) {
                break Err(e);
            }
            if end {
                break Ok(());
            }
        };

        self.errors = handler.take_errors();
        handler.finish();
        outcome?;
        debug!(validation_errors = self.errors.len(), "parse finished");
        Ok(handler.take_result())
    }

    /// Parse on a background thread, yielding the streaming target's values
    pub fn stream<R>(self, input: R) -> Result<StreamingParser>
    where
        R: BufRead + Send + 'static,
    {
        StreamingParser::spawn(self, input)
    }
}
