//! SAX-like event source
//!
//! A thin layer over quick-xml's pull reader that yields start/end/text
//! events with owned, unescaped strings. Empty elements are reported as a
//! start event followed by an end event, and unbalanced documents are
//! rejected at end of input.

use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, Result};
use crate::namespaces::NamespaceContext;

/// An attribute exactly as written in the start tag (prefix not resolved)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAttribute {
    /// Attribute name, possibly prefixed
    pub name: String,
    /// Unescaped attribute value
    pub value: String,
}

/// Event produced by [`EventReader`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    /// Start tag
    StartElement {
        /// Element name, possibly prefixed
        name: String,
        /// Attributes, including `xmlns` declarations
        attributes: Vec<RawAttribute>,
    },
    /// End tag
    EndElement {
        /// Element name, possibly prefixed
        name: String,
    },
    /// Character data (text or CDATA), possibly one of several fragments
    Characters(String),
    /// End of input
    EndDocument,
}

/// Pull reader producing [`XmlEvent`]s
pub struct EventReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    pending_end: Option<String>,
    depth: usize,
    finished: bool,
}

impl<'a> EventReader<&'a [u8]> {
    /// Read events from an in-memory document
    pub fn from_str(xml: &'a str) -> Self {
        Self::new(xml.as_bytes())
    }
}

impl<R: BufRead> EventReader<R> {
    /// Read events from a buffered reader
    pub fn new(input: R) -> Self {
        let mut reader = Reader::from_reader(input);
        reader.trim_text(false);
        Self {
            reader,
            buf: Vec::new(),
            pending_end: None,
            depth: 0,
            finished: false,
        }
    }

    /// Byte offset of the reader in the input
    pub fn position(&self) -> usize {
        self.reader.buffer_position()
    }

    /// Current element nesting depth
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Read the next event
    pub fn next_event(&mut self) -> Result<XmlEvent> {
        if let Some(name) = self.pending_end.take() {
            self.depth -= 1;
            return Ok(XmlEvent::EndElement { name });
        }
        if self.finished {
            return Ok(XmlEvent::EndDocument);
        }

        loop {
            self.buf.clear();
            let event = self.reader.read_event_into(&mut self.buf).map_err(|e| {
                Error::Xml(format!(
                    "Error parsing XML at position {}: {}",
                    self.reader.buffer_position(),
                    e
                ))
            })?;

            match event {
                Event::Start(e) => {
                    let (name, attributes) = read_start(&e)?;
                    self.depth += 1;
                    return Ok(XmlEvent::StartElement { name, attributes });
                }
                Event::Empty(e) => {
                    let (name, attributes) = read_start(&e)?;
                    self.depth += 1;
                    self.pending_end = Some(name.clone());
                    return Ok(XmlEvent::StartElement { name, attributes });
                }
                Event::End(e) => {
                    let name = utf8(e.name().as_ref())?;
                    if self.depth == 0 {
                        return Err(Error::Xml(format!("Unexpected end tag '{}'", name)));
                    }
                    self.depth -= 1;
                    return Ok(XmlEvent::EndElement { name });
                }
                Event::Text(e) => {
                    let text = e
                        .unescape()
                        .map_err(|e| Error::Xml(format!("Failed to unescape text: {}", e)))?;
                    if self.depth == 0 {
                        // whitespace between prolog items
                        continue;
                    }
                    return Ok(XmlEvent::Characters(text.into_owned()));
                }
                Event::CData(e) => {
                    let text = utf8(&e.into_inner())?;
                    return Ok(XmlEvent::Characters(text));
                }
                Event::Eof => {
                    if self.depth != 0 {
                        return Err(Error::Xml(format!(
                            "Unexpected end of document with {} unclosed element(s)",
                            self.depth
                        )));
                    }
                    self.finished = true;
                    return Ok(XmlEvent::EndDocument);
                }
                // Comments, processing instructions, declarations, doctype
                _ => continue,
            }
        }
    }
}

fn utf8(bytes: &[u8]) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(|s| s.to_string())
        .map_err(|e| Error::Xml(format!("Invalid UTF-8: {}", e)))
}

fn read_start(start: &BytesStart) -> Result<(String, Vec<RawAttribute>)> {
    let name = utf8(start.name().as_ref())?;
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| Error::Xml(format!("Failed to parse attribute: {}", e)))?;
        let value = attr
            .unescape_value()
            .map_err(|e| Error::Xml(format!("Failed to unescape attribute value: {}", e)))?
            .into_owned();
        attributes.push(RawAttribute {
            name: utf8(attr.key.as_ref())?,
            value,
        });
    }
    Ok((name, attributes))
}

/// Separate `xmlns` declarations from ordinary attributes
pub fn split_namespace_declarations(
    attributes: Vec<RawAttribute>,
) -> (NamespaceContext, Vec<RawAttribute>) {
    let mut declarations = NamespaceContext::new();
    let mut rest = Vec::with_capacity(attributes.len());
    for attr in attributes {
        if attr.name == "xmlns" {
            declarations.set_default_namespace(attr.value);
        } else if let Some(prefix) = attr.name.strip_prefix("xmlns:") {
            declarations.add_prefix(prefix, attr.value);
        } else {
            rest.push(attr);
        }
    }
    (declarations, rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(xml: &str) -> Result<Vec<XmlEvent>> {
        let mut reader = EventReader::from_str(xml);
        let mut events = Vec::new();
        loop {
            let event = reader.next_event()?;
            let done = event == XmlEvent::EndDocument;
            events.push(event);
            if done {
                return Ok(events);
            }
        }
    }

    #[test]
    fn test_empty_element_expands() {
        let events = collect(r#"<?xml version="1.0"?><a x="1"/>"#).unwrap();
        assert_eq!(
            events,
            vec![
                XmlEvent::StartElement {
                    name: "a".into(),
                    attributes: vec![RawAttribute { name: "x".into(), value: "1".into() }],
                },
                XmlEvent::EndElement { name: "a".into() },
                XmlEvent::EndDocument,
            ]
        );
    }

    #[test]
    fn test_text_is_unescaped_and_untrimmed() {
        let events = collect("<a> x &amp; y <![CDATA[<z>]]></a>").unwrap();
        assert_eq!(events[1], XmlEvent::Characters(" x & y ".into()));
        assert_eq!(events[2], XmlEvent::Characters("<z>".into()));
    }

    #[test]
    fn test_mismatched_nesting_is_fatal() {
        assert!(matches!(collect("<a><b></a></b>"), Err(Error::Xml(_))));
        assert!(matches!(collect("<a><b></b>"), Err(Error::Xml(_))));
    }

    #[test]
    fn test_split_namespace_declarations() {
        let attrs = vec![
            RawAttribute { name: "xmlns".into(), value: "urn:d".into() },
            RawAttribute { name: "xmlns:p".into(), value: "urn:p".into() },
            RawAttribute { name: "p:a".into(), value: "1".into() },
        ];
        let (decls, rest) = split_namespace_declarations(attrs);
        assert_eq!(decls.get_default_namespace(), Some("urn:d"));
        assert_eq!(decls.get_namespace("p"), Some("urn:p"));
        assert_eq!(rest.len(), 1);
    }
}
