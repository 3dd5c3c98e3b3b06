//! Normalized data tree.
//!
//! The tree is independent of any wire format. Children of a container keep
//! the order the parser (or the application) added them in; the writer can
//! re-derive schema order on its own.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::{CodecError, Result};
use crate::qname::QName;
use crate::schema::ChoiceSchema;
use crate::value::Value;
use crate::xml::CapturedSubtree;

/// Key leaf values of a list entry, in schema key order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KeyPredicates(Vec<(QName, Value)>);

impl KeyPredicates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: QName, value: impl Into<Value>) -> Self {
        self.insert(key, value.into());
        self
    }

    /// Insert or replace the value of `key`
    pub fn insert(&mut self, key: QName, value: Value) {
        match self.0.iter_mut().find(|(k, _)| k == &key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &QName) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(QName, Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(QName, Value)> for KeyPredicates {
    fn from_iter<T: IntoIterator<Item = (QName, Value)>>(iter: T) -> Self {
        let mut predicates = KeyPredicates::new();
        for (key, value) in iter {
            predicates.insert(key, value);
        }
        predicates
    }
}

/// One step in the data tree
#[derive(Debug, Clone, PartialEq)]
pub enum PathArgument {
    NodeIdentifier(QName),
    /// A list entry, identified by its key leaf values
    NodeIdentifierWithPredicates(QName, KeyPredicates),
    /// A leaf-list entry, identified by its value
    NodeWithValue(QName, Value),
    /// The synthetic node grouping an augmentation's children
    AugmentationIdentifier(BTreeSet<QName>),
}

impl PathArgument {
    /// Node name; augmentation identifiers have none
    pub fn node_type(&self) -> Option<&QName> {
        match self {
            PathArgument::NodeIdentifier(qname)
            | PathArgument::NodeIdentifierWithPredicates(qname, _)
            | PathArgument::NodeWithValue(qname, _) => Some(qname),
            PathArgument::AugmentationIdentifier(_) => None,
        }
    }
}

impl fmt::Display for PathArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathArgument::NodeIdentifier(qname) => write!(f, "{}", qname),
            PathArgument::NodeIdentifierWithPredicates(qname, keys) => {
                write!(f, "{}[", qname)?;
                for (i, (key, value)) in keys.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}={}", key, value)?;
                }
                f.write_str("]")
            }
            PathArgument::NodeWithValue(qname, value) => write!(f, "{}[{}]", qname, value),
            PathArgument::AugmentationIdentifier(names) => {
                f.write_str("AugmentationIdentifier{")?;
                for (i, name) in names.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", name)?;
                }
                f.write_str("}")
            }
        }
    }
}

/// A node of the normalized data tree
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedNode {
    Leaf(LeafNode),
    LeafSet(LeafSetNode),
    Container(ContainerNode),
    List(ListNode),
    Choice(ChoiceNode),
    Augmentation(AugmentationNode),
    Anydata(AnydataNode),
}

impl NormalizedNode {
    pub fn identifier(&self) -> PathArgument {
        match self {
            NormalizedNode::Leaf(node) => PathArgument::NodeIdentifier(node.qname.clone()),
            NormalizedNode::LeafSet(node) => PathArgument::NodeIdentifier(node.qname.clone()),
            NormalizedNode::Container(node) => node.identifier.clone(),
            NormalizedNode::List(node) => PathArgument::NodeIdentifier(node.qname.clone()),
            NormalizedNode::Choice(node) => PathArgument::NodeIdentifier(node.qname.clone()),
            NormalizedNode::Augmentation(node) => {
                PathArgument::AugmentationIdentifier(node.identifier.clone())
            }
            NormalizedNode::Anydata(node) => PathArgument::NodeIdentifier(node.qname.clone()),
        }
    }

    pub fn qname(&self) -> Option<&QName> {
        match self {
            NormalizedNode::Leaf(node) => Some(&node.qname),
            NormalizedNode::LeafSet(node) => Some(&node.qname),
            NormalizedNode::Container(node) => node.identifier.node_type(),
            NormalizedNode::List(node) => Some(&node.qname),
            NormalizedNode::Choice(node) => Some(&node.qname),
            NormalizedNode::Augmentation(_) => None,
            NormalizedNode::Anydata(node) => Some(&node.qname),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            NormalizedNode::Leaf(_) => "leaf",
            NormalizedNode::LeafSet(_) => "leaf-list",
            NormalizedNode::Container(_) => "container",
            NormalizedNode::List(_) => "list",
            NormalizedNode::Choice(_) => "choice",
            NormalizedNode::Augmentation(_) => "augmentation",
            NormalizedNode::Anydata(_) => "anydata",
        }
    }

    pub fn as_container(&self) -> Option<&ContainerNode> {
        match self {
            NormalizedNode::Container(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&LeafNode> {
        match self {
            NormalizedNode::Leaf(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListNode> {
        match self {
            NormalizedNode::List(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_leaf_set(&self) -> Option<&LeafSetNode> {
        match self {
            NormalizedNode::LeafSet(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_choice(&self) -> Option<&ChoiceNode> {
        match self {
            NormalizedNode::Choice(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_augmentation(&self) -> Option<&AugmentationNode> {
        match self {
            NormalizedNode::Augmentation(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_anydata(&self) -> Option<&AnydataNode> {
        match self {
            NormalizedNode::Anydata(node) => Some(node),
            _ => None,
        }
    }
}

macro_rules! node_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for NormalizedNode {
                fn from(node: $ty) -> Self {
                    NormalizedNode::$variant(node)
                }
            }
        )*
    };
}

node_from! {
    LeafNode => Leaf,
    LeafSetNode => LeafSet,
    ContainerNode => Container,
    ListNode => List,
    ChoiceNode => Choice,
    AugmentationNode => Augmentation,
    AnydataNode => Anydata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeafNode {
    pub qname: QName,
    pub value: Value,
}

impl LeafNode {
    pub fn new(qname: QName, value: impl Into<Value>) -> Self {
        Self {
            qname,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeafSetEntryNode {
    pub qname: QName,
    pub value: Value,
}

impl LeafSetEntryNode {
    pub fn new(qname: QName, value: impl Into<Value>) -> Self {
        Self {
            qname,
            value: value.into(),
        }
    }

    pub fn identifier(&self) -> PathArgument {
        PathArgument::NodeWithValue(self.qname.clone(), self.value.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeafSetNode {
    pub qname: QName,
    pub ordered_by_user: bool,
    pub entries: Vec<LeafSetEntryNode>,
}

impl LeafSetNode {
    pub fn new(qname: QName) -> Self {
        Self {
            qname,
            ordered_by_user: false,
            entries: Vec::new(),
        }
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.entries
            .push(LeafSetEntryNode::new(self.qname.clone(), value));
        self
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|entry| &entry.value)
    }
}

/// A container, or a list entry when the identifier carries predicates
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerNode {
    pub identifier: PathArgument,
    pub children: Vec<NormalizedNode>,
}

impl ContainerNode {
    pub fn new(identifier: PathArgument, children: Vec<NormalizedNode>) -> Self {
        Self {
            identifier,
            children,
        }
    }

    pub fn builder(identifier: PathArgument) -> ContainerBuilder {
        ContainerBuilder {
            node: ContainerNode::new(identifier, Vec::new()),
        }
    }

    pub fn qname(&self) -> Option<&QName> {
        self.identifier.node_type()
    }

    pub fn child(&self, identifier: &PathArgument) -> Option<&NormalizedNode> {
        self.children.iter().find(|c| &c.identifier() == identifier)
    }

    /// First direct child with the given name
    pub fn child_by_qname(&self, qname: &QName) -> Option<&NormalizedNode> {
        self.children.iter().find(|c| c.qname() == Some(qname))
    }

    /// Value of a direct leaf child
    pub fn leaf_value(&self, qname: &QName) -> Option<&Value> {
        self.child_by_qname(qname)
            .and_then(NormalizedNode::as_leaf)
            .map(|leaf| &leaf.value)
    }
}

/// Builds a container (or list entry) while enforcing sibling uniqueness
#[derive(Debug)]
pub struct ContainerBuilder {
    node: ContainerNode,
}

impl ContainerBuilder {
    pub fn add_child(&mut self, child: impl Into<NormalizedNode>) -> Result<&mut Self> {
        let child = child.into();
        let identifier = child.identifier();
        if self.node.child(&identifier).is_some() {
            return Err(CodecError::schema_mismatch(format!(
                "Duplicate child {} in {}",
                identifier, self.node.identifier
            )));
        }
        self.node.children.push(child);
        Ok(self)
    }

    pub fn with_child(mut self, child: impl Into<NormalizedNode>) -> Result<Self> {
        self.add_child(child)?;
        Ok(self)
    }

    pub fn build(self) -> ContainerNode {
        self.node
    }
}

/// Entries of a list, each a container keyed by its predicates
#[derive(Debug, Clone, PartialEq)]
pub struct ListNode {
    pub qname: QName,
    pub ordered_by_user: bool,
    pub entries: Vec<ContainerNode>,
}

impl ListNode {
    pub fn new(qname: QName) -> Self {
        Self {
            qname,
            ordered_by_user: false,
            entries: Vec::new(),
        }
    }

    /// Append an entry; keyed entries must be unique by their predicates
    pub fn push_entry(&mut self, entry: ContainerNode) -> Result<()> {
        if matches!(
            entry.identifier,
            PathArgument::NodeIdentifierWithPredicates(..)
        ) && self.entries.iter().any(|e| e.identifier == entry.identifier)
        {
            return Err(CodecError::schema_mismatch(format!(
                "Duplicate list entry {} in list {}",
                entry.identifier, self.qname
            )));
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn with_entry(mut self, entry: ContainerNode) -> Result<Self> {
        self.push_entry(entry)?;
        Ok(self)
    }

    pub fn entry(&self, predicates: &KeyPredicates) -> Option<&ContainerNode> {
        self.entries.iter().find(|entry| {
            matches!(&entry.identifier,
                PathArgument::NodeIdentifierWithPredicates(_, keys) if keys == predicates)
        })
    }
}

/// Children of exactly one case of a choice
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceNode {
    pub qname: QName,
    pub children: Vec<NormalizedNode>,
}

impl ChoiceNode {
    pub fn new(qname: QName, children: Vec<NormalizedNode>) -> Self {
        Self { qname, children }
    }

    /// Build a choice node, rejecting children drawn from more than one case
    pub fn for_schema(schema: &ChoiceSchema, children: Vec<NormalizedNode>) -> Result<Self> {
        let mut selected: Option<&QName> = None;
        for child in &children {
            let Some(qname) = child.qname() else {
                continue;
            };
            let case = schema.case_of(qname).ok_or_else(|| {
                CodecError::schema_mismatch(format!(
                    "Node {} is not a member of any case of choice {}",
                    qname, schema.qname
                ))
            })?;
            match selected {
                None => selected = Some(&case.qname),
                Some(previous) if previous != &case.qname => {
                    return Err(CodecError::schema_mismatch(format!(
                        "Choice {} mixes children of case {} and case {}",
                        schema.qname, previous, case.qname
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(Self::new(schema.qname.clone(), children))
    }

    pub fn child_by_qname(&self, qname: &QName) -> Option<&NormalizedNode> {
        self.children.iter().find(|c| c.qname() == Some(qname))
    }
}

/// Children contributed by one augmentation
#[derive(Debug, Clone, PartialEq)]
pub struct AugmentationNode {
    pub identifier: BTreeSet<QName>,
    pub children: Vec<NormalizedNode>,
}

impl AugmentationNode {
    pub fn new(identifier: BTreeSet<QName>, children: Vec<NormalizedNode>) -> Self {
        Self {
            identifier,
            children,
        }
    }

    pub fn child_by_qname(&self, qname: &QName) -> Option<&NormalizedNode> {
        self.children.iter().find(|c| c.qname() == Some(qname))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnydataPayload {
    /// Raw content exactly as captured from the input
    Opaque(CapturedSubtree),
    /// Content already normalized against a known schema
    Normalized(Box<NormalizedNode>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnydataNode {
    pub qname: QName,
    pub payload: AnydataPayload,
}

impl AnydataNode {
    pub fn opaque(qname: QName, captured: CapturedSubtree) -> Self {
        Self {
            qname,
            payload: AnydataPayload::Opaque(captured),
        }
    }

    pub fn normalized(qname: QName, node: NormalizedNode) -> Self {
        Self {
            qname,
            payload: AnydataPayload::Normalized(Box::new(node)),
        }
    }
}
