use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{CodecError, Result};

use super::{EventSource, NamespaceStack, StartElement, XmlAttribute, XmlEvent, split_qualified};

/// [`EventSource`] over an in-memory XML document, backed by `quick-xml`
pub struct XmlReader<'a> {
    reader: Reader<&'a [u8]>,
    namespaces: NamespaceStack,
    /// Qualified names of the open elements
    open: Vec<String>,
    pending_pop: bool,
}

impl<'a> XmlReader<'a> {
    pub fn from_str(xml: &'a str) -> Self {
        let mut reader = Reader::from_str(xml);
        let config = reader.config_mut();
        config.expand_empty_elements = true;
        config.check_end_names = true;
        Self {
            reader,
            namespaces: NamespaceStack::new(),
            open: Vec::new(),
            pending_pop: false,
        }
    }

    /// Number of currently open elements
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    fn malformed(&self, message: impl Into<String>) -> CodecError {
        CodecError::malformed(self.position(), message)
    }

    fn start_element(&mut self, start: &BytesStart<'_>) -> Result<StartElement> {
        let name = start.name();
        let raw = std::str::from_utf8(name.as_ref())
            .map_err(|e| self.malformed(format!("element name is not UTF-8: {}", e)))?
            .to_string();

        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| self.malformed(e.to_string()))?;
            let key = std::str::from_utf8(attr.key.as_ref())
                .map_err(|e| self.malformed(format!("attribute name is not UTF-8: {}", e)))?
                .to_string();
            let value = attr
                .unescape_value()
                .map_err(|e| self.malformed(e.to_string()))?
                .into_owned();
            attributes.push(XmlAttribute { name: key, value });
        }
        self.namespaces.push_scope(&attributes);

        let (prefix, local_name) = split_qualified(&raw);
        let namespace = self.namespaces.resolve(prefix).map(str::to_string);
        if let (Some(prefix), None) = (prefix, &namespace) {
            return Err(self.malformed(format!(
                "namespace prefix '{}' of element <{}> is not bound",
                prefix, raw
            )));
        }
        let element = StartElement {
            prefix: prefix.map(str::to_string),
            local_name: local_name.to_string(),
            namespace,
            attributes,
        };
        self.open.push(raw);
        Ok(element)
    }
}

impl EventSource for XmlReader<'_> {
    fn next_event(&mut self) -> Result<Option<XmlEvent>> {
        if self.pending_pop {
            self.namespaces.pop_scope();
            self.pending_pop = false;
        }
        loop {
            let event = self
                .reader
                .read_event()
                .map_err(|e| self.malformed(e.to_string()))?;
            match event {
                Event::Start(start) => {
                    let element = self.start_element(&start)?;
                    return Ok(Some(XmlEvent::StartElement(element)));
                }
                Event::End(end) => {
                    let name = end.name();
                    let raw = std::str::from_utf8(name.as_ref())
                        .map_err(|e| self.malformed(format!("element name is not UTF-8: {}", e)))?;
                    let (_, local_name) = split_qualified(raw);
                    let local_name = local_name.to_string();
                    self.open.pop();
                    self.pending_pop = true;
                    return Ok(Some(XmlEvent::EndElement { local_name }));
                }
                Event::Text(text) => {
                    let text = text
                        .unescape()
                        .map_err(|e| self.malformed(e.to_string()))?
                        .into_owned();
                    if !self.open.is_empty() {
                        return Ok(Some(XmlEvent::Text(text)));
                    }
                    if !text.trim().is_empty() {
                        return Err(self.malformed("text content outside of the root element"));
                    }
                }
                Event::CData(data) => {
                    let text = String::from_utf8(data.into_inner().into_owned())
                        .map_err(|e| self.malformed(format!("CDATA is not UTF-8: {}", e)))?;
                    if self.open.is_empty() {
                        return Err(self.malformed("CDATA outside of the root element"));
                    }
                    return Ok(Some(XmlEvent::Text(text)));
                }
                Event::Eof => {
                    if let Some(name) = self.open.last() {
                        return Err(self.malformed(format!(
                            "unexpected end of document, element <{}> is not closed",
                            name
                        )));
                    }
                    return Ok(None);
                }
                // Declarations, comments, processing instructions, doctypes
                _ => {}
            }
        }
    }

    fn namespaces(&self) -> &NamespaceStack {
        &self.namespaces
    }

    fn position(&self) -> u64 {
        self.reader.buffer_position() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(xml: &str) -> Result<Vec<XmlEvent>> {
        let mut reader = XmlReader::from_str(xml);
        let mut events = Vec::new();
        while let Some(event) = reader.next_event()? {
            events.push(event);
        }
        Ok(events)
    }

    #[test]
    fn test_resolves_default_and_prefixed_namespaces() {
        let events =
            collect(r#"<?xml version="1.0"?><a xmlns="urn:a" xmlns:b="urn:b"><b:c>x &amp; y</b:c></a>"#)
                .unwrap();
        let XmlEvent::StartElement(root) = &events[0] else {
            panic!("expected start, got {:?}", events[0]);
        };
        assert_eq!(root.namespace.as_deref(), Some("urn:a"));
        let XmlEvent::StartElement(child) = &events[1] else {
            panic!("expected start, got {:?}", events[1]);
        };
        assert_eq!(child.prefix.as_deref(), Some("b"));
        assert_eq!(child.namespace.as_deref(), Some("urn:b"));
        assert_eq!(events[2], XmlEvent::Text("x & y".to_string()));
        assert_eq!(
            events[3],
            XmlEvent::EndElement {
                local_name: "c".to_string()
            }
        );
    }

    #[test]
    fn test_empty_elements_expand() {
        let events = collect(r#"<a xmlns="urn:a"><b/></a>"#).unwrap();
        assert_eq!(events.len(), 4);
        assert!(matches!(&events[2], XmlEvent::EndElement { local_name } if local_name == "b"));
    }

    #[test]
    fn test_scope_survives_until_next_event() {
        let mut reader = XmlReader::from_str(r#"<a xmlns="urn:a"><b xmlns:p="urn:p">p:x</b></a>"#);
        while let Some(event) = reader.next_event().unwrap() {
            if matches!(&event, XmlEvent::EndElement { local_name } if local_name == "b") {
                assert_eq!(reader.namespaces().resolve(Some("p")), Some("urn:p"));
                reader.next_event().unwrap();
                assert_eq!(reader.namespaces().resolve(Some("p")), None);
                break;
            }
        }
    }

    #[test]
    fn test_premature_end_is_malformed() {
        let err = collect(r#"<a xmlns="urn:a"><b>text</b>"#).unwrap_err();
        assert!(matches!(err, CodecError::MalformedStream { .. }), "{err:?}");
        assert!(err.to_string().contains("<a>"), "{err}");
    }

    #[test]
    fn test_mismatched_end_is_malformed() {
        let err = collect(r#"<a><b></c></a>"#).unwrap_err();
        assert!(matches!(err, CodecError::MalformedStream { .. }), "{err:?}");
    }

    #[test]
    fn test_unbound_prefix_is_malformed() {
        let err = collect(r#"<x:a/>"#).unwrap_err();
        assert!(err.to_string().contains("'x'"), "{err}");
    }

    #[test]
    fn test_cdata_is_text() {
        let events = collect(r#"<a><![CDATA[<raw>]]></a>"#).unwrap();
        assert_eq!(events[1], XmlEvent::Text("<raw>".to_string()));
    }
}
