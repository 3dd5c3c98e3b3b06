//! Streaming XML encoding of normalized trees.
//!
//! [`XmlParser`] pulls events from an [`EventSource`] and builds a
//! [`NormalizedNode`](crate::node::NormalizedNode); [`XmlTreeWriter`] walks a
//! tree and pushes events into a `quick-xml` writer. Both look up leaf codecs
//! in a shared [`CodecRegistry`](crate::codec::CodecRegistry).

mod anydata;
mod dom;
mod parser;
mod reader;
mod writer;

use crate::codec::NamespaceContext;
use crate::error::Result;

pub use anydata::AnydataNormalizer;
pub use dom::{CapturedElement, CapturedEventSource, CapturedSubtree, XmlContent};
pub use parser::XmlParser;
pub use reader::XmlReader;
pub use writer::{WriteOrdering, XmlTreeWriter};

pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// A raw attribute, name as written (possibly prefixed)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    pub name: String,
    pub value: String,
}

impl XmlAttribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// `Some(None)` for `xmlns`, `Some(Some(prefix))` for `xmlns:prefix`
    pub fn namespace_declaration(&self) -> Option<Option<&str>> {
        if self.name == "xmlns" {
            Some(None)
        } else {
            self.name.strip_prefix("xmlns:").map(Some)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartElement {
    pub prefix: Option<String>,
    pub local_name: String,
    /// Resolved namespace; `None` when no default namespace is in scope
    pub namespace: Option<String>,
    pub attributes: Vec<XmlAttribute>,
}

impl StartElement {
    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.local_name),
            None => self.local_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    StartElement(StartElement),
    EndElement { local_name: String },
    Text(String),
}

/// Pull-based token stream consumed by the parser
pub trait EventSource {
    /// Next event, or `None` once the document is exhausted
    fn next_event(&mut self) -> Result<Option<XmlEvent>>;

    /// Namespace bindings in scope at the last returned event. Bindings of an
    /// element stay visible until the event after its end tag.
    fn namespaces(&self) -> &NamespaceStack;

    /// Position for error reports
    fn position(&self) -> u64;
}

/// Nested scopes of namespace declarations
#[derive(Debug, Clone, Default)]
pub struct NamespaceStack {
    scopes: Vec<Vec<(Option<String>, String)>>,
}

impl NamespaceStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a scope holding the `xmlns` declarations among `attributes`
    pub fn push_scope(&mut self, attributes: &[XmlAttribute]) {
        let scope = attributes
            .iter()
            .filter_map(|attr| {
                attr.namespace_declaration()
                    .map(|prefix| (prefix.map(str::to_string), attr.value.clone()))
            })
            .collect();
        self.scopes.push(scope);
    }

    pub fn push_bindings(&mut self, bindings: Vec<(Option<String>, String)>) {
        self.scopes.push(bindings);
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    pub fn resolve(&self, prefix: Option<&str>) -> Option<&str> {
        if prefix == Some("xml") {
            return Some(XML_NAMESPACE);
        }
        self.scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.iter().rev())
            .find(|(p, _)| p.as_deref() == prefix)
            // xmlns="" undeclares the default namespace
            .and_then(|(_, ns)| (!ns.is_empty()).then_some(ns.as_str()))
    }

    /// Effective bindings, innermost declaration winning
    pub fn in_scope(&self) -> Vec<(Option<String>, String)> {
        let mut bindings: Vec<(Option<String>, String)> = Vec::new();
        for (prefix, namespace) in self.scopes.iter().rev().flat_map(|s| s.iter().rev()) {
            if bindings.iter().all(|(p, _)| p != prefix) {
                bindings.push((prefix.clone(), namespace.clone()));
            }
        }
        bindings.retain(|(_, ns)| !ns.is_empty());
        bindings.reverse();
        bindings
    }
}

impl NamespaceContext for NamespaceStack {
    fn namespace_for_prefix(&self, prefix: Option<&str>) -> Option<&str> {
        self.resolve(prefix)
    }
}

/// Split `prefix:local` into its parts
pub(crate) fn split_qualified(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}
