use std::io::Write;

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::{CodecRegistry, ModulePrefixes, PrefixResolver};
use crate::error::{CodecError, Result};
use crate::node::{
    AnydataNode, AnydataPayload, ChoiceNode, ContainerNode, NormalizedNode, PathArgument,
};
use crate::qname::QName;
use crate::schema::{
    CaseSchema, ChoiceSchema, DataNodeContainer, DataSchemaNode, ListSchema, SchemaContext,
    SchemaPath, TypeDefinition, direct_child, find_augmentation, resolve_child,
};
use crate::value::Value;

use super::XmlContent;

/// Order in which the children of a node are emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteOrdering {
    /// As stored in the tree
    #[default]
    Insertion,
    /// As declared in the schema, augmentations last
    Schema,
}

/// Writes normalized trees as XML.
///
/// Elements are written unprefixed; an `xmlns` declaration is emitted on the
/// root and wherever the namespace changes. List entries always start with
/// their key leaves.
#[derive(Clone, Copy)]
pub struct XmlTreeWriter<'a> {
    context: &'a SchemaContext,
    codecs: &'a CodecRegistry,
    ordering: WriteOrdering,
    indent: Option<usize>,
}

impl<'a> XmlTreeWriter<'a> {
    pub fn new(context: &'a SchemaContext, codecs: &'a CodecRegistry) -> Self {
        Self {
            context,
            codecs,
            ordering: WriteOrdering::Insertion,
            indent: None,
        }
    }

    pub fn with_ordering(mut self, ordering: WriteOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    /// Indent nested elements by `spaces`; zero disables indentation
    pub fn with_indent(mut self, spaces: usize) -> Self {
        self.indent = (spaces > 0).then_some(spaces);
        self
    }

    pub fn ordering(&self) -> WriteOrdering {
        self.ordering
    }

    /// Write `node`, an instance of `schema`, and hand back the sink
    pub fn write<W: Write>(&self, node: &NormalizedNode, schema: &DataSchemaNode, out: W) -> Result<W> {
        debug!(root = %schema.qname(), ordering = ?self.ordering, "writing tree");
        let mut sink = EventSink::new(out, self.indent);
        let path = SchemaPath::root().child(schema.qname());
        self.write_node(&mut sink, schema, node, &path, None)?;
        Ok(sink.into_inner())
    }

    pub fn write_to_string(&self, node: &NormalizedNode, schema: &DataSchemaNode) -> Result<String> {
        into_string(self.write(node, schema, Vec::new())?)
    }

    /// Write a datastore tree: `data` becomes the wrapper element and its
    /// children are top-level schema nodes
    pub fn write_data<W: Write>(&self, data: &ContainerNode, out: W) -> Result<W> {
        let wrapper = data.qname().ok_or_else(|| {
            CodecError::schema_mismatch(format!("Data root {} has no name", data.identifier))
        })?;
        let mut sink = EventSink::new(out, self.indent);
        let namespace = wrapper.namespace();
        let attributes = if namespace.is_empty() {
            Vec::new()
        } else {
            vec![xmlns(namespace)]
        };
        sink.start(wrapper.local_name(), &attributes)?;
        let children: Vec<&NormalizedNode> = data.children.iter().collect();
        self.write_nodes(&mut sink, self.context, children, &SchemaPath::root(), namespace)?;
        sink.end(wrapper.local_name())?;
        Ok(sink.into_inner())
    }

    pub fn write_data_to_string(&self, data: &ContainerNode) -> Result<String> {
        into_string(self.write_data(data, Vec::new())?)
    }

    /// Write `node` as described by `schema`; `parent_ns` is the default
    /// namespace in effect, `None` at the document root
    fn write_node<W: Write>(
        &self,
        sink: &mut EventSink<W>,
        schema: &DataSchemaNode,
        node: &NormalizedNode,
        path: &SchemaPath,
        parent_ns: Option<&str>,
    ) -> Result<()> {
        match (node, schema) {
            (NormalizedNode::Leaf(leaf), DataSchemaNode::Leaf(leaf_schema)) => {
                self.write_leaf(sink, &leaf.qname, &leaf.value, &leaf_schema.type_def, path, parent_ns)
            }
            (NormalizedNode::LeafSet(leaf_set), DataSchemaNode::LeafList(leaf_list)) => {
                for entry in &leaf_set.entries {
                    self.write_leaf(sink, &entry.qname, &entry.value, &leaf_list.type_def, path, parent_ns)?;
                }
                Ok(())
            }
            (NormalizedNode::Container(container), DataSchemaNode::Container(container_schema)) => {
                let qname = &container_schema.qname;
                sink.start(qname.local_name(), &element_attributes(qname, parent_ns))?;
                let children: Vec<&NormalizedNode> = container.children.iter().collect();
                self.write_nodes(sink, container_schema, children, path, qname.namespace())?;
                sink.end(qname.local_name())
            }
            (NormalizedNode::List(list), DataSchemaNode::List(list_schema)) => {
                for entry in &list.entries {
                    self.write_list_entry(sink, list_schema, entry, path, parent_ns)?;
                }
                Ok(())
            }
            (NormalizedNode::Anydata(anydata), DataSchemaNode::Anydata(anydata_schema)) => {
                self.write_anydata(sink, anydata, anydata_schema.content.as_deref(), path, parent_ns)
            }
            (NormalizedNode::Anydata(anydata), DataSchemaNode::Anyxml(_)) => {
                self.write_anydata(sink, anydata, None, path, parent_ns)
            }
            (node, schema) => Err(CodecError::schema_mismatch(format!(
                "Node {} of kind {} does not match schema node {} of kind {}",
                node.identifier(),
                node.kind_name(),
                schema.qname(),
                schema.kind_name()
            ))),
        }
    }

    /// Write the children of one data parent. Choice and augmentation nodes
    /// are flattened into the parent element.
    fn write_nodes<W: Write>(
        &self,
        sink: &mut EventSink<W>,
        parent: &dyn DataNodeContainer,
        nodes: Vec<&NormalizedNode>,
        path: &SchemaPath,
        namespace: &str,
    ) -> Result<()> {
        let nodes = match self.ordering {
            WriteOrdering::Insertion => nodes,
            WriteOrdering::Schema => schema_ordered(parent, nodes)?,
        };
        for node in nodes {
            self.write_child(sink, parent, node, path, namespace)?;
        }
        Ok(())
    }

    fn write_child<W: Write>(
        &self,
        sink: &mut EventSink<W>,
        parent: &dyn DataNodeContainer,
        node: &NormalizedNode,
        path: &SchemaPath,
        namespace: &str,
    ) -> Result<()> {
        match node {
            NormalizedNode::Choice(choice_node) => {
                let Some(DataSchemaNode::Choice(choice)) = direct_child(parent, &choice_node.qname) else {
                    return Err(not_defined(&choice_node.qname, parent));
                };
                match owning_case(choice, choice_node)? {
                    Some(case) => {
                        let children: Vec<&NormalizedNode> = choice_node.children.iter().collect();
                        self.write_nodes(sink, case, children, path, namespace)
                    }
                    None => Ok(()),
                }
            }
            NormalizedNode::Augmentation(augmentation) => {
                let schema = find_augmentation(parent, &augmentation.identifier).ok_or_else(|| {
                    CodecError::schema_mismatch(format!(
                        "{} is not defined in {}",
                        node.identifier(),
                        parent.describe()
                    ))
                })?;
                let children: Vec<&NormalizedNode> = augmentation.children.iter().collect();
                self.write_nodes(sink, schema, children, path, namespace)
            }
            node => {
                let qname = node.qname().ok_or_else(|| {
                    CodecError::schema_mismatch(format!("Node {} has no name", node.identifier()))
                })?;
                let schema = resolve_child(parent, qname.namespace(), qname.local_name())
                    .ok_or_else(|| not_defined(qname, parent))?
                    .node;
                self.write_node(sink, schema, node, &path.child(qname), Some(namespace))
            }
        }
    }

    fn write_list_entry<W: Write>(
        &self,
        sink: &mut EventSink<W>,
        schema: &ListSchema,
        entry: &ContainerNode,
        path: &SchemaPath,
        parent_ns: Option<&str>,
    ) -> Result<()> {
        let qname = &schema.qname;
        let namespace = qname.namespace();
        sink.start(qname.local_name(), &element_attributes(qname, parent_ns))?;

        for key in &schema.keys {
            let key_path = path.child(key);
            let Some(DataSchemaNode::Leaf(key_schema)) = direct_child(schema, key) else {
                return Err(not_defined(key, schema));
            };
            let value = entry.leaf_value(key).or_else(|| match &entry.identifier {
                PathArgument::NodeIdentifierWithPredicates(_, predicates) => predicates.get(key),
                _ => None,
            });
            let value = value.ok_or_else(|| {
                CodecError::schema_mismatch(format!(
                    "List entry {} is missing key leaf {}",
                    entry.identifier, key
                ))
            })?;
            self.write_leaf(sink, key, value, &key_schema.type_def, &key_path, Some(namespace))?;
        }

        let rest: Vec<&NormalizedNode> = entry
            .children
            .iter()
            .filter(|child| {
                !matches!(child, NormalizedNode::Leaf(leaf) if schema.keys.contains(&leaf.qname))
            })
            .collect();
        self.write_nodes(sink, schema, rest, path, namespace)?;
        sink.end(qname.local_name())
    }

    fn write_leaf<W: Write>(
        &self,
        sink: &mut EventSink<W>,
        qname: &QName,
        value: &Value,
        type_def: &TypeDefinition,
        path: &SchemaPath,
        parent_ns: Option<&str>,
    ) -> Result<()> {
        let codec = self.codecs.codec_for(path, type_def)?;
        let mut prefixes = DeclaringPrefixes::new(self.codecs.modules());
        let text = codec.serialize_with(value, &mut prefixes)?;

        let mut attributes = element_attributes(qname, parent_ns);
        attributes.extend(
            prefixes
                .declared
                .into_iter()
                .map(|(prefix, namespace)| (format!("xmlns:{}", prefix), namespace)),
        );
        sink.start(qname.local_name(), &attributes)?;
        if !text.is_empty() {
            sink.text(&text)?;
        }
        sink.end(qname.local_name())
    }

    fn write_anydata<W: Write>(
        &self,
        sink: &mut EventSink<W>,
        anydata: &AnydataNode,
        content_schema: Option<&DataSchemaNode>,
        path: &SchemaPath,
        parent_ns: Option<&str>,
    ) -> Result<()> {
        let qname = &anydata.qname;
        let namespace = qname.namespace();
        match &anydata.payload {
            AnydataPayload::Opaque(captured) => {
                let mut attributes = element_attributes(qname, parent_ns);
                for (prefix, bound) in &captured.namespaces {
                    if let Some(prefix) = prefix {
                        attributes.push((format!("xmlns:{}", prefix), bound.clone()));
                    }
                }
                sink.start(qname.local_name(), &attributes)?;
                splice(sink, &captured.content, Some(namespace))?;
                sink.end(qname.local_name())
            }
            AnydataPayload::Normalized(node) => {
                let content = content_schema.ok_or_else(|| {
                    CodecError::schema_mismatch(format!(
                        "Anydata {} holds normalized content but its schema declares no content schema",
                        qname
                    ))
                })?;
                let content_path = path.child(content.qname());
                sink.start(qname.local_name(), &element_attributes(qname, parent_ns))?;
                match (node.as_ref(), content) {
                    (NormalizedNode::Container(container), DataSchemaNode::Container(container_schema)) => {
                        let children: Vec<&NormalizedNode> = container.children.iter().collect();
                        self.write_nodes(sink, container_schema, children, &content_path, namespace)?;
                    }
                    (node, content) => {
                        self.write_node(sink, content, node, &content_path, Some(namespace))?;
                    }
                }
                sink.end(qname.local_name())
            }
        }
    }
}

/// Reorder `nodes` by the schema declaration order of `parent`, grouping
/// same-named entries together; augmentations follow the plain children
fn schema_ordered<'n>(
    parent: &dyn DataNodeContainer,
    nodes: Vec<&'n NormalizedNode>,
) -> Result<Vec<&'n NormalizedNode>> {
    let mut remaining: Vec<Option<&'n NormalizedNode>> = nodes.into_iter().map(Some).collect();
    let mut ordered = Vec::with_capacity(remaining.len());

    for schema_child in parent.children() {
        for slot in remaining.iter_mut() {
            if slot.is_some_and(|node| claims(schema_child, node)) {
                ordered.extend(slot.take());
            }
        }
    }
    for augmentation in parent.augmentations() {
        let identifier = augmentation.identifier();
        for slot in remaining.iter_mut() {
            let belongs = slot.is_some_and(|node| match node {
                NormalizedNode::Augmentation(aug) => aug.identifier == identifier,
                other => other.qname().is_some_and(|q| identifier.contains(q)),
            });
            if belongs {
                ordered.extend(slot.take());
            }
        }
    }

    if let Some(leftover) = remaining.into_iter().flatten().next() {
        return Err(CodecError::schema_mismatch(format!(
            "{} is not defined in {}",
            leftover.identifier(),
            parent.describe()
        )));
    }
    Ok(ordered)
}

/// True when `node` is written at the position of `schema_child`
fn claims(schema_child: &DataSchemaNode, node: &NormalizedNode) -> bool {
    let Some(qname) = node.qname() else {
        return false;
    };
    if qname == schema_child.qname() {
        return true;
    }
    match schema_child {
        DataSchemaNode::Choice(choice) => {
            !matches!(node, NormalizedNode::Choice(_)) && choice.case_of(qname).is_some()
        }
        _ => false,
    }
}

/// The single case the children of `node` belong to
fn owning_case<'s>(choice: &'s ChoiceSchema, node: &ChoiceNode) -> Result<Option<&'s CaseSchema>> {
    let mut selected: Option<&'s CaseSchema> = None;
    for child in &node.children {
        let case = match child {
            NormalizedNode::Augmentation(augmentation) => choice
                .cases
                .iter()
                .find(|case| find_augmentation(*case, &augmentation.identifier).is_some()),
            other => other.qname().and_then(|qname| {
                choice
                    .cases
                    .iter()
                    .find(|case| direct_child(*case, qname).is_some())
                    .or_else(|| choice.case_of(qname))
            }),
        }
        .ok_or_else(|| {
            CodecError::schema_mismatch(format!(
                "{} is not a member of any case of choice {}",
                child.identifier(),
                choice.qname
            ))
        })?;
        match selected {
            Some(previous) if previous.qname != case.qname => {
                return Err(CodecError::schema_mismatch(format!(
                    "Choice {} mixes children of case {} and case {}",
                    choice.qname, previous.qname, case.qname
                )));
            }
            Some(_) => {}
            None => selected = Some(case),
        }
    }
    Ok(selected)
}

/// Copy captured content verbatim, repairing the default namespace of
/// unprefixed elements where the writer's scope differs from the source's
fn splice<W: Write>(
    sink: &mut EventSink<W>,
    content: &[XmlContent],
    default_ns: Option<&str>,
) -> Result<()> {
    for item in content {
        match item {
            XmlContent::Text(text) => sink.text(text)?,
            XmlContent::Element(element) => {
                let mut attributes: Vec<(String, String)> = element
                    .attributes
                    .iter()
                    .map(|attr| (attr.name.clone(), attr.value.clone()))
                    .collect();
                let declared = element
                    .attributes
                    .iter()
                    .find(|attr| attr.name == "xmlns")
                    .map(|attr| attr.value.as_str());
                let inner_ns = match declared {
                    Some(value) => (!value.is_empty()).then_some(value),
                    None if element.prefix.is_none()
                        && element.namespace.as_deref() != default_ns =>
                    {
                        attributes.push((
                            "xmlns".to_string(),
                            element.namespace.clone().unwrap_or_default(),
                        ));
                        element.namespace.as_deref()
                    }
                    None => default_ns,
                };
                let name = element.qualified_name();
                sink.start(&name, &attributes)?;
                splice(sink, &element.children, inner_ns)?;
                sink.end(&name)?;
            }
        }
    }
    Ok(())
}

fn xmlns(namespace: &str) -> (String, String) {
    ("xmlns".to_string(), namespace.to_string())
}

/// Default namespace declaration for an element, when it changes
fn element_attributes(qname: &QName, parent_ns: Option<&str>) -> Vec<(String, String)> {
    if parent_ns == Some(qname.namespace()) {
        Vec::new()
    } else {
        vec![xmlns(qname.namespace())]
    }
}

fn not_defined(qname: &QName, parent: &(impl DataNodeContainer + ?Sized)) -> CodecError {
    CodecError::schema_mismatch(format!(
        "Schema for node {} does not exist in parent {}",
        qname,
        parent.describe()
    ))
}

fn into_string(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(write_error)
}

fn write_error(error: impl std::fmt::Display) -> CodecError {
    CodecError::Write(error.to_string())
}

/// Module prefixes used by a leaf value, declared on the leaf element
struct DeclaringPrefixes<'m> {
    modules: &'m ModulePrefixes,
    declared: Vec<(String, String)>,
}

impl<'m> DeclaringPrefixes<'m> {
    fn new(modules: &'m ModulePrefixes) -> Self {
        Self {
            modules,
            declared: Vec::new(),
        }
    }
}

impl PrefixResolver for DeclaringPrefixes<'_> {
    fn prefix_for(&mut self, namespace: &str) -> Result<String> {
        let prefix = self.modules.prefix_of(namespace).ok_or_else(|| {
            CodecError::invalid_argument(format!(
                "No module with namespace '{}' is known to the schema context",
                namespace
            ))
        })?;
        if !self.declared.iter().any(|(declared, _)| declared == prefix) {
            self.declared.push((prefix.to_string(), namespace.to_string()));
        }
        Ok(prefix.to_string())
    }
}

/// Thin wrapper over the `quick-xml` writer
struct EventSink<W: Write> {
    writer: Writer<W>,
}

impl<W: Write> EventSink<W> {
    fn new(out: W, indent: Option<usize>) -> Self {
        let writer = match indent {
            Some(spaces) => Writer::new_with_indent(out, b' ', spaces),
            None => Writer::new(out),
        };
        Self { writer }
    }

    fn start(&mut self, name: &str, attributes: &[(String, String)]) -> Result<()> {
        let mut start = BytesStart::new(name);
        for (key, value) in attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }
        self.writer
            .write_event(Event::Start(start))
            .map_err(write_error)
    }

    fn text(&mut self, text: &str) -> Result<()> {
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(write_error)
    }

    fn end(&mut self, name: &str) -> Result<()> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(write_error)
    }

    fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{ChoiceNode, KeyPredicates, LeafNode, ListNode};
    use crate::schema::{ContainerSchema, LeafSchema, Module};

    const NS: &str = "urn:test";
    const OTHER: &str = "urn:other";

    fn q(local: &str) -> QName {
        QName::new(NS, local)
    }

    fn leaf(qname: QName, type_def: TypeDefinition) -> DataSchemaNode {
        DataSchemaNode::Leaf(LeafSchema::new(qname, type_def))
    }

    fn context() -> SchemaContext {
        let entry = ListSchema::new(
            q("entry"),
            vec![q("id")],
            vec![leaf(q("label"), TypeDefinition::string()), leaf(q("id"), TypeDefinition::uint8())],
        );
        let mode = ChoiceSchema::new(
            q("mode"),
            vec![
                CaseSchema::new(q("fast"), vec![leaf(q("speed"), TypeDefinition::uint8())]),
                CaseSchema::new(q("slow"), vec![leaf(q("delay"), TypeDefinition::uint8())]),
            ],
        );
        let top = ContainerSchema::new(
            q("top"),
            vec![
                leaf(q("name"), TypeDefinition::string()),
                DataSchemaNode::List(entry),
                DataSchemaNode::Choice(mode),
                leaf(
                    q("kind"),
                    TypeDefinition::Identityref {
                        identities: vec![QName::new(OTHER, "widget")],
                    },
                ),
                leaf(QName::new(OTHER, "foreign"), TypeDefinition::Boolean),
            ],
        );
        SchemaContext::new(
            vec![Module::new("test", NS, "t"), Module::new("other", OTHER, "o")],
            vec![DataSchemaNode::Container(top)],
        )
    }

    fn top(children: Vec<NormalizedNode>) -> NormalizedNode {
        ContainerNode::new(PathArgument::NodeIdentifier(q("top")), children).into()
    }

    fn write(node: &NormalizedNode, ordering: WriteOrdering) -> Result<String> {
        let ctx = context();
        let codecs = CodecRegistry::new(&ctx);
        let schema = ctx.data_child(&q("top")).unwrap();
        XmlTreeWriter::new(&ctx, &codecs)
            .with_ordering(ordering)
            .write_to_string(node, schema)
    }

    #[test]
    fn test_namespaces_and_prefixed_values() {
        let node = top(vec![
            LeafNode::new(q("name"), "a<b").into(),
            LeafNode::new(q("kind"), Value::IdentityRef(QName::new(OTHER, "widget"))).into(),
            LeafNode::new(QName::new(OTHER, "foreign"), true).into(),
        ]);
        let xml = write(&node, WriteOrdering::Insertion).unwrap();
        assert_eq!(
            xml,
            concat!(
                r#"<top xmlns="urn:test"><name>a&lt;b</name>"#,
                r#"<kind xmlns:o="urn:other">o:widget</kind>"#,
                r#"<foreign xmlns="urn:other">true</foreign></top>"#
            )
        );
    }

    #[test]
    fn test_list_keys_come_first() {
        let entry = ContainerNode::new(
            PathArgument::NodeIdentifierWithPredicates(
                q("entry"),
                KeyPredicates::new().with(q("id"), Value::Uint8(7)),
            ),
            vec![
                LeafNode::new(q("label"), "x").into(),
                LeafNode::new(q("id"), Value::Uint8(7)).into(),
            ],
        );
        let list = ListNode::new(q("entry")).with_entry(entry).unwrap();
        let xml = write(&top(vec![list.into()]), WriteOrdering::Insertion).unwrap();
        assert_eq!(
            xml,
            r#"<top xmlns="urn:test"><entry><id>7</id><label>x</label></entry></top>"#
        );
    }

    #[test]
    fn test_choice_is_transparent_and_schema_ordered() {
        let node = top(vec![
            ChoiceNode::new(q("mode"), vec![LeafNode::new(q("speed"), Value::Uint8(3)).into()]).into(),
            LeafNode::new(q("name"), "n").into(),
        ]);
        assert_eq!(
            write(&node, WriteOrdering::Insertion).unwrap(),
            r#"<top xmlns="urn:test"><speed>3</speed><name>n</name></top>"#
        );
        assert_eq!(
            write(&node, WriteOrdering::Schema).unwrap(),
            r#"<top xmlns="urn:test"><name>n</name><speed>3</speed></top>"#
        );
    }

    #[test]
    fn test_mixed_case_choice_is_rejected() {
        let node = top(vec![
            ChoiceNode::new(
                q("mode"),
                vec![
                    LeafNode::new(q("speed"), Value::Uint8(3)).into(),
                    LeafNode::new(q("delay"), Value::Uint8(1)).into(),
                ],
            )
            .into(),
        ]);
        let err = write(&node, WriteOrdering::Schema).unwrap_err();
        assert!(err.to_string().contains("mixes children"), "{err}");
    }

    #[test]
    fn test_unknown_child_is_rejected() {
        let node = top(vec![LeafNode::new(q("missing"), "x").into()]);
        assert!(matches!(
            write(&node, WriteOrdering::Insertion),
            Err(CodecError::SchemaMismatch(_))
        ));
        assert!(matches!(
            write(&node, WriteOrdering::Schema),
            Err(CodecError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_value_errors_surface() {
        let node = top(vec![LeafNode::new(q("name"), Value::Uint8(1)).into()]);
        assert!(write(&node, WriteOrdering::Insertion).unwrap_err().is_value_error());
    }
}
