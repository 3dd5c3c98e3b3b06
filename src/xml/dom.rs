use crate::error::{CodecError, Result};
use crate::qname::QName;

use super::{EventSource, NamespaceStack, StartElement, XmlAttribute, XmlEvent};

/// Content of an anydata/anyxml element, kept as read.
///
/// `namespaces` holds the bindings that were in scope at the owning element,
/// so prefixed names and values inside the content can still be resolved
/// after the surrounding document is gone.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CapturedSubtree {
    pub namespaces: Vec<(Option<String>, String)>,
    pub content: Vec<XmlContent>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlContent {
    Element(CapturedElement),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedElement {
    pub prefix: Option<String>,
    pub local_name: String,
    pub namespace: Option<String>,
    pub attributes: Vec<XmlAttribute>,
    pub children: Vec<XmlContent>,
}

impl CapturedElement {
    fn from_start(start: StartElement) -> Self {
        Self {
            prefix: start.prefix,
            local_name: start.local_name,
            namespace: start.namespace,
            attributes: start.attributes,
            children: Vec::new(),
        }
    }

    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.local_name),
            None => self.local_name.clone(),
        }
    }

    pub fn matches(&self, qname: &QName) -> bool {
        self.namespace.as_deref() == Some(qname.namespace()) && self.local_name == qname.local_name()
    }

    /// Concatenated text of the direct children
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|c| match c {
                XmlContent::Text(text) => Some(text.as_str()),
                XmlContent::Element(_) => None,
            })
            .collect()
    }
}

fn push_content(content: &mut Vec<XmlContent>, item: XmlContent) {
    if let XmlContent::Text(text) = &item {
        if let Some(XmlContent::Text(previous)) = content.last_mut() {
            previous.push_str(text);
            return;
        }
    }
    content.push(item);
}

impl CapturedSubtree {
    /// Capture everything up to the end tag of the element whose start was
    /// just read from `source`, consuming that end tag
    pub fn capture(source: &mut dyn EventSource) -> Result<Self> {
        let namespaces = source.namespaces().in_scope();
        let mut content = Vec::new();
        let mut open: Vec<CapturedElement> = Vec::new();

        loop {
            let event = source.next_event()?.ok_or_else(|| {
                CodecError::malformed(source.position(), "unexpected end of document in anydata content")
            })?;
            match event {
                XmlEvent::StartElement(start) => open.push(CapturedElement::from_start(start)),
                XmlEvent::Text(text) => match open.last_mut() {
                    Some(parent) => push_content(&mut parent.children, XmlContent::Text(text)),
                    None => push_content(&mut content, XmlContent::Text(text)),
                },
                XmlEvent::EndElement { .. } => match open.pop() {
                    Some(element) => {
                        let target = match open.last_mut() {
                            Some(parent) => &mut parent.children,
                            None => &mut content,
                        };
                        target.push(XmlContent::Element(element));
                    }
                    None => return Ok(Self { namespaces, content }),
                },
            }
        }
    }

    /// True when there is no element and no non-whitespace text
    pub fn is_empty(&self) -> bool {
        self.content.iter().all(|item| match item {
            XmlContent::Text(text) => text.trim().is_empty(),
            XmlContent::Element(_) => false,
        })
    }

    /// Top-level elements
    pub fn elements(&self) -> impl Iterator<Item = &CapturedElement> {
        self.content.iter().filter_map(|item| match item {
            XmlContent::Element(element) => Some(element),
            XmlContent::Text(_) => None,
        })
    }
}

/// Replays a [`CapturedSubtree`] as an event stream
pub struct CapturedEventSource {
    events: std::vec::IntoIter<XmlEvent>,
    namespaces: NamespaceStack,
    position: u64,
    pending_pop: bool,
}

impl CapturedEventSource {
    /// Replay the captured content as-is
    pub fn new(captured: &CapturedSubtree) -> Self {
        let mut events = Vec::new();
        flatten(&captured.content, &mut events);
        Self::from_events(captured, events)
    }

    /// Replay the captured content as the children of a synthetic element
    /// named `root`
    pub fn wrapped(root: &QName, captured: &CapturedSubtree) -> Self {
        let mut events = vec![XmlEvent::StartElement(StartElement {
            prefix: None,
            local_name: root.local_name().to_string(),
            namespace: Some(root.namespace().to_string()),
            attributes: Vec::new(),
        })];
        flatten(&captured.content, &mut events);
        events.push(XmlEvent::EndElement {
            local_name: root.local_name().to_string(),
        });
        Self::from_events(captured, events)
    }

    fn from_events(captured: &CapturedSubtree, events: Vec<XmlEvent>) -> Self {
        let mut namespaces = NamespaceStack::new();
        namespaces.push_bindings(captured.namespaces.clone());
        Self {
            events: events.into_iter(),
            namespaces,
            position: 0,
            pending_pop: false,
        }
    }
}

fn flatten(content: &[XmlContent], events: &mut Vec<XmlEvent>) {
    for item in content {
        match item {
            XmlContent::Text(text) => events.push(XmlEvent::Text(text.clone())),
            XmlContent::Element(element) => {
                events.push(XmlEvent::StartElement(StartElement {
                    prefix: element.prefix.clone(),
                    local_name: element.local_name.clone(),
                    namespace: element.namespace.clone(),
                    attributes: element.attributes.clone(),
                }));
                flatten(&element.children, events);
                events.push(XmlEvent::EndElement {
                    local_name: element.local_name.clone(),
                });
            }
        }
    }
}

impl EventSource for CapturedEventSource {
    fn next_event(&mut self) -> Result<Option<XmlEvent>> {
        if self.pending_pop {
            self.namespaces.pop_scope();
            self.pending_pop = false;
        }
        let Some(event) = self.events.next() else {
            return Ok(None);
        };
        self.position += 1;
        match &event {
            XmlEvent::StartElement(start) => self.namespaces.push_scope(&start.attributes),
            XmlEvent::EndElement { .. } => self.pending_pop = true,
            XmlEvent::Text(_) => {}
        }
        Ok(Some(event))
    }

    fn namespaces(&self) -> &NamespaceStack {
        &self.namespaces
    }

    /// Index of the last replayed event
    fn position(&self) -> u64 {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::XmlReader;

    fn capture_inner(xml: &str) -> CapturedSubtree {
        let mut reader = XmlReader::from_str(xml);
        let first = reader.next_event().unwrap();
        assert!(matches!(first, Some(XmlEvent::StartElement(_))));
        CapturedSubtree::capture(&mut reader).unwrap()
    }

    #[test]
    fn test_capture_keeps_structure_and_scope() {
        let captured = capture_inner(
            r#"<data xmlns="urn:a" xmlns:x="urn:x"><x:item id="1">one</x:item> <item/></data>"#,
        );
        assert!(captured.namespaces.contains(&(Some("x".to_string()), "urn:x".to_string())));
        assert!(captured.namespaces.contains(&(None, "urn:a".to_string())));

        let elements: Vec<_> = captured.elements().collect();
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].qualified_name(), "x:item");
        assert_eq!(elements[0].namespace.as_deref(), Some("urn:x"));
        assert_eq!(elements[0].attributes, vec![XmlAttribute::new("id", "1")]);
        assert_eq!(elements[0].text(), "one");
        assert!(elements[1].matches(&QName::new("urn:a", "item")));
    }

    #[test]
    fn test_whitespace_only_is_empty() {
        assert!(capture_inner("<data>\n   \n</data>").is_empty());
        assert!(!capture_inner("<data>text</data>").is_empty());
    }

    #[test]
    fn test_replay_wrapped() {
        let captured = capture_inner(r#"<data xmlns="urn:a"><leaf>1</leaf></data>"#);
        let mut replay = CapturedEventSource::wrapped(&QName::new("urn:c", "cont"), &captured);
        let mut names = Vec::new();
        while let Some(event) = replay.next_event().unwrap() {
            if let XmlEvent::StartElement(start) = event {
                names.push((start.local_name, start.namespace));
            }
        }
        assert_eq!(
            names,
            vec![
                ("cont".to_string(), Some("urn:c".to_string())),
                ("leaf".to_string(), Some("urn:a".to_string())),
            ]
        );
    }

    #[test]
    fn test_replay_restores_bindings() {
        let captured = capture_inner(r#"<data xmlns:p="urn:p"><v>p:x</v></data>"#);
        let mut replay = CapturedEventSource::new(&captured);
        replay.next_event().unwrap();
        assert_eq!(replay.namespaces().resolve(Some("p")), Some("urn:p"));
    }

    #[test]
    fn test_unterminated_capture_fails() {
        let mut replay = CapturedEventSource::new(&CapturedSubtree::default());
        let err = CapturedSubtree::capture(&mut replay).unwrap_err();
        assert!(matches!(err, CodecError::MalformedStream { .. }));
    }
}
