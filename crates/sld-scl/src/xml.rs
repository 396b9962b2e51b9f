//! Minimal owned XML tree over quick-xml events.
//!
//! The SCL walk in [`crate::parser`] is recursive descent over named
//! children; building a small element tree first keeps that code free of
//! event-loop state. Character data is trimmed and inter-element whitespace
//! dropped. Namespace prefixes are stripped from element and attribute
//! names, so `scl:Substation` and `Substation` read the same.

use std::fs;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use sld_core::{SldError, SldResult};

/// An element of the parsed document.
#[derive(Debug, Clone, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    /// Attribute value by (local) name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Attribute value or `""` when absent.
    pub fn attr_or_empty(&self, name: &str) -> &str {
        self.attr(name).unwrap_or("")
    }

    /// First child element with the given (local) name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All child elements with the given (local) name, in document order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }
}

/// Read a document from a filesystem path.
///
/// An unreadable path maps to `file-not-found`; malformed content maps to
/// `xml-parse-error` with the byte offset of the failure.
pub fn read_path(path: impl AsRef<Path>) -> SldResult<Element> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
            SldError::FileNotFound(path.display().to_string())
        }
        _ => SldError::Io(err),
    })?;
    read_bytes(&bytes)
}

/// Read a document from an in-memory UTF-8 buffer.
///
/// Returns a synthetic document element whose children are the top-level
/// elements, mirroring a DOM document node.
pub fn read_bytes(bytes: &[u8]) -> SldResult<Element> {
    let text = std::str::from_utf8(bytes)
        .map_err(|err| SldError::XmlParse(format!("invalid UTF-8: {err}")))?;

    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    // Open-element stack; index 0 is the synthetic document node.
    let mut stack: Vec<Element> = vec![Element {
        name: "#document".to_string(),
        ..Element::default()
    }];

    loop {
        let event = reader.read_event().map_err(|err| {
            SldError::XmlParse(format!("{err}, offset={}", reader.buffer_position()))
        })?;
        match event {
            Event::Start(ref start) => {
                let element = open_element(start, &reader)?;
                stack.push(element);
            }
            Event::Empty(ref start) => {
                let element = open_element(start, &reader)?;
                attach(&mut stack, element);
            }
            Event::Text(text) => {
                let value = text.unescape().map_err(|err| {
                    SldError::XmlParse(format!("{err}, offset={}", reader.buffer_position()))
                })?;
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(trimmed);
                    }
                }
            }
            Event::CData(data) => {
                let value = String::from_utf8_lossy(&data).into_owned();
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&value);
                }
            }
            Event::End(_) => {
                // Well-formedness is checked by the reader; the stack cannot
                // underflow past the document node here.
                let finished = stack.pop().ok_or_else(|| {
                    SldError::XmlParse(format!(
                        "unexpected end tag, offset={}",
                        reader.buffer_position()
                    ))
                })?;
                attach(&mut stack, finished);
            }
            Event::Eof => break,
            // Declarations, comments and processing instructions are ignored.
            _ => {}
        }
    }

    match stack.pop() {
        Some(document) if stack.is_empty() => Ok(document),
        _ => Err(SldError::XmlParse(format!(
            "unclosed element <{}>",
            stack.last().map(|e| e.name.as_str()).unwrap_or("?")
        ))),
    }
}

fn open_element(start: &BytesStart, reader: &Reader<&[u8]>) -> SldResult<Element> {
    let name = local_str(start.local_name().as_ref())?;
    let mut element = Element {
        name,
        ..Element::default()
    };
    for attr in start.attributes().with_checks(false) {
        let attr = attr.map_err(|err| {
            SldError::XmlParse(format!("{err}, offset={}", reader.buffer_position()))
        })?;
        let key = local_str(attr.key.local_name().as_ref())?;
        let value = attr
            .unescape_value()
            .map_err(|err| {
                SldError::XmlParse(format!("{err}, offset={}", reader.buffer_position()))
            })?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(stack: &mut [Element], element: Element) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    }
}

fn local_str(bytes: &[u8]) -> SldResult<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|err| SldError::XmlParse(format!("invalid UTF-8 in name: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_shape() {
        let doc = read_bytes(b"<SCL version=\"2007\"><Substation name=\"SS1\"/><Substation name=\"SS2\"/></SCL>")
            .unwrap();
        let root = doc.child("SCL").unwrap();
        assert_eq!(root.attr("version"), Some("2007"));
        assert_eq!(root.children_named("Substation").count(), 2);
        assert_eq!(
            root.children_named("Substation")
                .nth(1)
                .unwrap()
                .attr_or_empty("name"),
            "SS2"
        );
    }

    #[test]
    fn test_text_trimmed() {
        let doc = read_bytes(b"<SCL><Voltage unit=\"V\" multiplier=\"k\">\n  20  \n</Voltage></SCL>")
            .unwrap();
        let voltage = doc.child("SCL").unwrap().child("Voltage").unwrap();
        assert_eq!(voltage.text, "20");
    }

    #[test]
    fn test_namespace_prefix_stripped() {
        let doc = read_bytes(
            b"<scl:SCL xmlns:scl=\"http://example\"><scl:Substation name=\"A\"/></scl:SCL>",
        )
        .unwrap();
        assert!(doc.child("SCL").is_some());
        assert!(doc.child("SCL").unwrap().child("Substation").is_some());
    }

    #[test]
    fn test_malformed_reports_offset() {
        let err = read_bytes(b"<SCL><Substation></SCL>").unwrap_err();
        match err {
            SldError::XmlParse(msg) => assert!(msg.contains("offset=")),
            other => panic!("expected XmlParse, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_file() {
        let err = read_path("/nonexistent/sample.scd").unwrap_err();
        assert!(matches!(err, SldError::FileNotFound(_)));
    }

    #[test]
    fn test_entity_unescape() {
        let doc = read_bytes(b"<SCL><P type=\"IP\">10.0.0.1 &amp; peer</P></SCL>").unwrap();
        let p = doc.child("SCL").unwrap().child("P").unwrap();
        assert_eq!(p.text, "10.0.0.1 & peer");
    }
}
