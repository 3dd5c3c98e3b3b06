use std::collections::HashSet;

use tracing::debug;

use crate::codec::CodecRegistry;
use crate::error::{CodecError, Result};
use crate::node::{
    AnydataNode, AugmentationNode, ChoiceNode, ContainerNode, KeyPredicates, LeafNode,
    LeafSetEntryNode, LeafSetNode, ListNode, NormalizedNode, PathArgument,
};
use crate::qname::QName;
use crate::schema::{
    AugmentationSchema, CaseSchema, ChoiceSchema, DataNodeContainer, DataSchemaNode, ListSchema,
    SchemaContext, SchemaPath, SchemaStep, TypeDefinition, resolve_child,
};
use crate::value::Value;

use super::{AnydataNormalizer, CapturedSubtree, EventSource, StartElement, XmlEvent, XmlReader};

/// Schema-directed XML parser producing normalized trees.
///
/// In strict mode an element with no matching schema node is an error; in
/// lenient mode it is skipped together with its subtree. Everything else,
/// including value validation, behaves the same in both modes.
#[derive(Clone, Copy)]
pub struct XmlParser<'a> {
    context: &'a SchemaContext,
    codecs: &'a CodecRegistry,
    strict: bool,
}

impl<'a> XmlParser<'a> {
    /// Strict parser
    pub fn new(context: &'a SchemaContext, codecs: &'a CodecRegistry) -> Self {
        Self {
            context,
            codecs,
            strict: true,
        }
    }

    /// Parser that skips unknown elements
    pub fn lenient(context: &'a SchemaContext, codecs: &'a CodecRegistry) -> Self {
        Self::new(context, codecs).with_strict(false)
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn context(&self) -> &'a SchemaContext {
        self.context
    }

    /// Parse a document whose root element is an instance of `root`
    pub fn parse_str(&self, xml: &str, root: &DataSchemaNode) -> Result<NormalizedNode> {
        self.parse(root, &mut XmlReader::from_str(xml))
    }

    pub fn parse(&self, root: &DataSchemaNode, source: &mut dyn EventSource) -> Result<NormalizedNode> {
        self.parse_at(root, &SchemaPath::root(), source)
    }

    /// Parse with `root` located at `base` in the schema tree
    pub(crate) fn parse_at(
        &self,
        root: &DataSchemaNode,
        base: &SchemaPath,
        source: &mut dyn EventSource,
    ) -> Result<NormalizedNode> {
        let start = first_element(source)?;
        let qname = root.qname();
        if start.namespace.as_deref() != Some(qname.namespace()) || start.local_name != qname.local_name()
        {
            return Err(CodecError::schema_mismatch(format!(
                "Root element {} in namespace {} does not match schema node {}",
                start.local_name,
                start.namespace.as_deref().unwrap_or(""),
                qname
            )));
        }

        let path = base.child(qname);
        let node = match (root, self.read_element(root, &path, source)?) {
            (_, Parsed::Node(node)) => node,
            (DataSchemaNode::List(list), Parsed::ListEntry(entry)) => {
                let mut node = ListNode::new(list.qname.clone());
                node.ordered_by_user = list.ordered_by_user;
                node.push_entry(entry)?;
                node.into()
            }
            (DataSchemaNode::LeafList(leaf_list), Parsed::LeafSetEntry(entry)) => {
                let mut node = LeafSetNode::new(leaf_list.qname.clone());
                node.ordered_by_user = leaf_list.ordered_by_user;
                node.entries.push(entry);
                node.into()
            }
            (_, _) => {
                return Err(CodecError::schema_mismatch(format!(
                    "Schema node {} cannot be a document root",
                    qname
                )));
            }
        };
        expect_end(source)?;
        Ok(node)
    }

    /// Parse a datastore document: the root element is a wrapper (such as
    /// `<data>` or `<config>`) whose children are top-level schema nodes
    pub fn parse_data(&self, source: &mut dyn EventSource) -> Result<ContainerNode> {
        let start = first_element(source)?;
        let wrapper = QName::new(
            start.namespace.as_deref().unwrap_or(""),
            start.local_name.as_str(),
        );
        let children = self.read_children(self.context, &SchemaPath::root(), source)?;
        expect_end(source)?;
        Ok(ContainerNode::new(PathArgument::NodeIdentifier(wrapper), children))
    }

    pub fn parse_data_str(&self, xml: &str) -> Result<ContainerNode> {
        self.parse_data(&mut XmlReader::from_str(xml))
    }

    /// Read the content of an element whose start tag was just consumed
    fn read_element(
        &self,
        schema: &DataSchemaNode,
        path: &SchemaPath,
        source: &mut dyn EventSource,
    ) -> Result<Parsed> {
        match schema {
            DataSchemaNode::Leaf(leaf) => {
                let value = self.read_value(&leaf.type_def, path, source)?;
                Ok(Parsed::Node(LeafNode::new(leaf.qname.clone(), value).into()))
            }
            DataSchemaNode::LeafList(leaf_list) => {
                let value = self.read_value(&leaf_list.type_def, path, source)?;
                Ok(Parsed::LeafSetEntry(LeafSetEntryNode::new(
                    leaf_list.qname.clone(),
                    value,
                )))
            }
            DataSchemaNode::Container(container) => {
                let children = self.read_children(container, path, source)?;
                Ok(Parsed::Node(
                    ContainerNode::new(PathArgument::NodeIdentifier(container.qname.clone()), children)
                        .into(),
                ))
            }
            DataSchemaNode::List(list) => Ok(Parsed::ListEntry(self.read_list_entry(list, path, source)?)),
            DataSchemaNode::Anydata(anydata) => {
                let captured = CapturedSubtree::capture(source)?;
                let node = match &anydata.content {
                    Some(content) => {
                        let normalized = AnydataNormalizer::with_parser(*self)
                            .normalize_at(&captured, content, path)?;
                        AnydataNode::normalized(anydata.qname.clone(), normalized)
                    }
                    None => AnydataNode::opaque(anydata.qname.clone(), captured),
                };
                Ok(Parsed::Node(node.into()))
            }
            DataSchemaNode::Anyxml(anyxml) => {
                let captured = CapturedSubtree::capture(source)?;
                Ok(Parsed::Node(AnydataNode::opaque(anyxml.qname.clone(), captured).into()))
            }
            DataSchemaNode::Choice(choice) => Err(CodecError::schema_mismatch(format!(
                "Choice {} has no element of its own",
                choice.qname
            ))),
        }
    }

    fn read_children<'s>(
        &self,
        parent: &'s dyn DataNodeContainer,
        path: &SchemaPath,
        source: &mut dyn EventSource,
    ) -> Result<Vec<NormalizedNode>> {
        let mut children = ChildrenBuilder::default();
        let mut singletons: HashSet<&'s QName> = HashSet::new();

        loop {
            let event = source.next_event()?.ok_or_else(|| {
                CodecError::malformed(source.position(), "unexpected end of document")
            })?;
            let start = match event {
                XmlEvent::EndElement { .. } => break,
                XmlEvent::Text(text) => {
                    let text = text.trim();
                    if !text.is_empty() {
                        return Err(CodecError::schema_mismatch(format!(
                            "Unexpected text \"{}\" in {}",
                            text,
                            parent.describe()
                        )));
                    }
                    continue;
                }
                XmlEvent::StartElement(start) => start,
            };

            let namespace = start.namespace.as_deref().unwrap_or("");
            let Some(child) = resolve_child(parent, namespace, &start.local_name) else {
                if self.strict {
                    return Err(CodecError::schema_mismatch(format!(
                        "Schema for node with name {} and namespace {} does not exist in parent {}",
                        start.local_name,
                        namespace,
                        parent.describe()
                    )));
                }
                debug!(
                    element = %start.local_name,
                    namespace = namespace,
                    parent = %parent.describe(),
                    "skipping element not present in schema"
                );
                skip_element(source)?;
                continue;
            };

            let qname = child.node.qname();
            if !child.node.is_multi_entry() && !singletons.insert(qname) {
                return Err(CodecError::schema_mismatch(format!(
                    "Duplicate element \"{}\" in namespace \"{}\" with parent \"{}\" in XML input",
                    qname.local_name(),
                    qname.namespace(),
                    parent.describe()
                )));
            }

            let parsed = self.read_element(child.node, &path.child(qname), source)?;
            children.place(&child.steps, child.node, parsed)?;
        }

        Ok(children.build())
    }

    fn read_list_entry(
        &self,
        list: &ListSchema,
        path: &SchemaPath,
        source: &mut dyn EventSource,
    ) -> Result<ContainerNode> {
        let children = self.read_children(list, path, source)?;
        if list.keys.is_empty() {
            return Ok(ContainerNode::new(
                PathArgument::NodeIdentifier(list.qname.clone()),
                children,
            ));
        }

        let mut predicates = KeyPredicates::new();
        for key in &list.keys {
            let value = children
                .iter()
                .filter_map(NormalizedNode::as_leaf)
                .find(|leaf| &leaf.qname == key)
                .map(|leaf| leaf.value.clone())
                .ok_or_else(|| {
                    CodecError::schema_mismatch(format!(
                        "List entry of {} is missing key leaf {}",
                        list.qname, key
                    ))
                })?;
            predicates.insert(key.clone(), value);
        }
        Ok(ContainerNode::new(
            PathArgument::NodeIdentifierWithPredicates(list.qname.clone(), predicates),
            children,
        ))
    }

    /// Text content of a leaf, decoded with the namespace bindings in scope
    fn read_value(
        &self,
        type_def: &TypeDefinition,
        path: &SchemaPath,
        source: &mut dyn EventSource,
    ) -> Result<Value> {
        let mut text = String::new();
        loop {
            match source.next_event()? {
                Some(XmlEvent::Text(chunk)) => text.push_str(&chunk),
                Some(XmlEvent::EndElement { .. }) => break,
                Some(XmlEvent::StartElement(start)) => {
                    return Err(CodecError::malformed(
                        source.position(),
                        format!(
                            "unexpected element <{}> inside text-only content",
                            start.qualified_name()
                        ),
                    ));
                }
                None => {
                    return Err(CodecError::malformed(
                        source.position(),
                        "unexpected end of document",
                    ));
                }
            }
        }
        let codec = self.codecs.codec_for(path, type_def)?;
        codec.deserialize_with(text.trim(), source.namespaces())
    }
}

/// Skip the subtree of an element whose start tag was just consumed
fn skip_element(source: &mut dyn EventSource) -> Result<()> {
    let mut depth = 1usize;
    while depth > 0 {
        match source.next_event()? {
            Some(XmlEvent::StartElement(_)) => depth += 1,
            Some(XmlEvent::EndElement { .. }) => depth -= 1,
            Some(XmlEvent::Text(_)) => {}
            None => {
                return Err(CodecError::malformed(
                    source.position(),
                    "unexpected end of document",
                ));
            }
        }
    }
    Ok(())
}

fn first_element(source: &mut dyn EventSource) -> Result<StartElement> {
    loop {
        match source.next_event()? {
            Some(XmlEvent::StartElement(start)) => return Ok(start),
            Some(XmlEvent::Text(text)) if text.trim().is_empty() => {}
            Some(_) => {
                return Err(CodecError::malformed(
                    source.position(),
                    "expected a root element",
                ));
            }
            None => {
                return Err(CodecError::malformed(
                    source.position(),
                    "document has no root element",
                ));
            }
        }
    }
}

fn expect_end(source: &mut dyn EventSource) -> Result<()> {
    loop {
        match source.next_event()? {
            None => return Ok(()),
            Some(XmlEvent::Text(text)) if text.trim().is_empty() => {}
            Some(_) => {
                return Err(CodecError::malformed(
                    source.position(),
                    "unexpected content after the root element",
                ));
            }
        }
    }
}

/// Result of reading one element
enum Parsed {
    Node(NormalizedNode),
    ListEntry(ContainerNode),
    LeafSetEntry(LeafSetEntryNode),
}

/// Collects the children of one data parent, grouping list and leaf-list
/// entries by name and routing choice and augmentation members into their
/// synthetic nodes
#[derive(Default)]
struct ChildrenBuilder<'s> {
    slots: Vec<Slot<'s>>,
}

enum Slot<'s> {
    Node(NormalizedNode),
    List(ListNode),
    LeafSet(LeafSetNode),
    Choice(ChoiceBuilder<'s>),
    Augmentation {
        schema: &'s AugmentationSchema,
        children: ChildrenBuilder<'s>,
    },
}

impl<'s> ChildrenBuilder<'s> {
    fn place(&mut self, steps: &[SchemaStep<'s>], schema: &'s DataSchemaNode, parsed: Parsed) -> Result<()> {
        match steps.split_first() {
            Some((&SchemaStep::Choice { choice, case }, rest)) => {
                for slot in &mut self.slots {
                    if let Slot::Choice(builder) = slot {
                        if builder.choice.qname == choice.qname {
                            return builder.place(case, rest, schema, parsed);
                        }
                    }
                }
                let mut builder = ChoiceBuilder {
                    choice,
                    state: CaseState::NoCaseYet,
                };
                builder.place(case, rest, schema, parsed)?;
                self.slots.push(Slot::Choice(builder));
                Ok(())
            }
            Some((&SchemaStep::Augmentation(augmentation), rest)) => {
                for slot in &mut self.slots {
                    if let Slot::Augmentation { schema: existing, children } = slot {
                        if std::ptr::eq(*existing, augmentation) {
                            return children.place(rest, schema, parsed);
                        }
                    }
                }
                let mut children = ChildrenBuilder::default();
                children.place(rest, schema, parsed)?;
                self.slots.push(Slot::Augmentation {
                    schema: augmentation,
                    children,
                });
                Ok(())
            }
            None => self.push(schema, parsed),
        }
    }

    fn push(&mut self, schema: &'s DataSchemaNode, parsed: Parsed) -> Result<()> {
        match parsed {
            Parsed::Node(node) => {
                self.slots.push(Slot::Node(node));
                Ok(())
            }
            Parsed::ListEntry(entry) => {
                for slot in &mut self.slots {
                    if let Slot::List(list) = slot {
                        if &list.qname == schema.qname() {
                            return list.push_entry(entry);
                        }
                    }
                }
                let mut list = ListNode::new(schema.qname().clone());
                list.ordered_by_user = matches!(schema, DataSchemaNode::List(s) if s.ordered_by_user);
                list.push_entry(entry)?;
                self.slots.push(Slot::List(list));
                Ok(())
            }
            Parsed::LeafSetEntry(entry) => {
                for slot in &mut self.slots {
                    if let Slot::LeafSet(leaf_set) = slot {
                        if &leaf_set.qname == schema.qname() {
                            leaf_set.entries.push(entry);
                            return Ok(());
                        }
                    }
                }
                let mut leaf_set = LeafSetNode::new(schema.qname().clone());
                leaf_set.ordered_by_user =
                    matches!(schema, DataSchemaNode::LeafList(s) if s.ordered_by_user);
                leaf_set.entries.push(entry);
                self.slots.push(Slot::LeafSet(leaf_set));
                Ok(())
            }
        }
    }

    fn build(self) -> Vec<NormalizedNode> {
        self.slots
            .into_iter()
            .filter_map(|slot| match slot {
                Slot::Node(node) => Some(node),
                Slot::List(list) => Some(list.into()),
                Slot::LeafSet(leaf_set) => Some(leaf_set.into()),
                Slot::Choice(builder) => builder.build().map(NormalizedNode::from),
                Slot::Augmentation { schema, children } => {
                    Some(AugmentationNode::new(schema.identifier(), children.build()).into())
                }
            })
            .collect()
    }
}

/// Choice whose case is fixed by the first child seen
struct ChoiceBuilder<'s> {
    choice: &'s ChoiceSchema,
    state: CaseState<'s>,
}

enum CaseState<'s> {
    NoCaseYet,
    InCase {
        case: &'s CaseSchema,
        children: ChildrenBuilder<'s>,
    },
}

impl<'s> ChoiceBuilder<'s> {
    fn place(
        &mut self,
        case: &'s CaseSchema,
        rest: &[SchemaStep<'s>],
        schema: &'s DataSchemaNode,
        parsed: Parsed,
    ) -> Result<()> {
        if let CaseState::NoCaseYet = self.state {
            self.state = CaseState::InCase {
                case,
                children: ChildrenBuilder::default(),
            };
        }
        match &mut self.state {
            CaseState::InCase {
                case: selected,
                children,
            } if selected.qname == case.qname => children.place(rest, schema, parsed),
            CaseState::InCase { case: selected, .. } => Err(CodecError::schema_mismatch(format!(
                "Element {} belongs to case {} but choice {} already holds children of case {}",
                schema.qname(),
                case.qname,
                self.choice.qname,
                selected.qname
            ))),
            CaseState::NoCaseYet => Ok(()),
        }
    }

    fn build(self) -> Option<ChoiceNode> {
        match self.state {
            CaseState::NoCaseYet => None,
            CaseState::InCase { children, .. } => {
                Some(ChoiceNode::new(self.choice.qname.clone(), children.build()))
            }
        }
    }
}
