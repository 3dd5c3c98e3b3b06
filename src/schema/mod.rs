//! Read-only, already-resolved schema model and its query surface.
//!
//! The YANG compiler that produces these nodes lives elsewhere; this crate only
//! consumes them. A [`SchemaContext`] is normally loaded from a JSON or TOML
//! description with [`crate::schema_loader::SchemaLoader`], or assembled
//! directly in code.

mod types;

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::qname::QName;

pub use types::{
    Bit, EnumPair, Interval, LengthRestriction, PatternRestriction, RangeRestriction,
    TypeDefinition,
};

/// A YANG module: its namespace and preferred prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub namespace: String,
    pub prefix: String,
}

impl Module {
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            prefix: prefix.into(),
        }
    }
}

/// A schema node that appears in (or, for choices, shapes) the data tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DataSchemaNode {
    Container(ContainerSchema),
    List(ListSchema),
    Leaf(LeafSchema),
    LeafList(LeafListSchema),
    Choice(ChoiceSchema),
    Anydata(AnydataSchema),
    Anyxml(AnyxmlSchema),
}

impl DataSchemaNode {
    pub fn qname(&self) -> &QName {
        match self {
            DataSchemaNode::Container(node) => &node.qname,
            DataSchemaNode::List(node) => &node.qname,
            DataSchemaNode::Leaf(node) => &node.qname,
            DataSchemaNode::LeafList(node) => &node.qname,
            DataSchemaNode::Choice(node) => &node.qname,
            DataSchemaNode::Anydata(node) => &node.qname,
            DataSchemaNode::Anyxml(node) => &node.qname,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            DataSchemaNode::Container(_) => "container",
            DataSchemaNode::List(_) => "list",
            DataSchemaNode::Leaf(_) => "leaf",
            DataSchemaNode::LeafList(_) => "leaf-list",
            DataSchemaNode::Choice(_) => "choice",
            DataSchemaNode::Anydata(_) => "anydata",
            DataSchemaNode::Anyxml(_) => "anyxml",
        }
    }

    /// Lists and leaf-lists may legitimately repeat under one parent
    pub fn is_multi_entry(&self) -> bool {
        matches!(self, DataSchemaNode::List(_) | DataSchemaNode::LeafList(_))
    }

    /// The children this node exposes, when it is a container or a list
    pub fn as_data_container(&self) -> Option<&dyn DataNodeContainer> {
        match self {
            DataSchemaNode::Container(node) => Some(node),
            DataSchemaNode::List(node) => Some(node),
            _ => None,
        }
    }

    /// Type of a leaf or leaf-list
    pub fn type_definition(&self) -> Option<&TypeDefinition> {
        match self {
            DataSchemaNode::Leaf(node) => Some(&node.type_def),
            DataSchemaNode::LeafList(node) => Some(&node.type_def),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSchema {
    pub qname: QName,
    #[serde(default)]
    pub presence: bool,
    #[serde(default)]
    pub children: Vec<DataSchemaNode>,
    #[serde(default)]
    pub augmentations: Vec<AugmentationSchema>,
}

impl ContainerSchema {
    pub fn new(qname: QName, children: Vec<DataSchemaNode>) -> Self {
        Self {
            qname,
            presence: false,
            children,
            augmentations: Vec::new(),
        }
    }

    pub fn with_augmentation(mut self, augmentation: AugmentationSchema) -> Self {
        self.augmentations.push(augmentation);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListSchema {
    pub qname: QName,
    /// Key leaves in declaration order; empty for keyless lists
    #[serde(default)]
    pub keys: Vec<QName>,
    #[serde(default)]
    pub ordered_by_user: bool,
    #[serde(default)]
    pub children: Vec<DataSchemaNode>,
    #[serde(default)]
    pub augmentations: Vec<AugmentationSchema>,
}

impl ListSchema {
    pub fn new(qname: QName, keys: Vec<QName>, children: Vec<DataSchemaNode>) -> Self {
        Self {
            qname,
            keys,
            ordered_by_user: false,
            children,
            augmentations: Vec::new(),
        }
    }

    pub fn ordered_by_user(mut self) -> Self {
        self.ordered_by_user = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafSchema {
    pub qname: QName,
    #[serde(rename = "type")]
    pub type_def: TypeDefinition,
}

impl LeafSchema {
    pub fn new(qname: QName, type_def: TypeDefinition) -> Self {
        Self { qname, type_def }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafListSchema {
    pub qname: QName,
    #[serde(rename = "type")]
    pub type_def: TypeDefinition,
    #[serde(default)]
    pub ordered_by_user: bool,
}

impl LeafListSchema {
    pub fn new(qname: QName, type_def: TypeDefinition) -> Self {
        Self {
            qname,
            type_def,
            ordered_by_user: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceSchema {
    pub qname: QName,
    #[serde(default)]
    pub cases: Vec<CaseSchema>,
}

impl ChoiceSchema {
    pub fn new(qname: QName, cases: Vec<CaseSchema>) -> Self {
        Self { qname, cases }
    }

    /// The case whose subtree declares a data node named `child`
    pub fn case_of(&self, child: &QName) -> Option<&CaseSchema> {
        self.cases.iter().find(|case| {
            resolve_child(*case, child.namespace(), child.local_name()).is_some()
        })
    }

    pub fn case(&self, qname: &QName) -> Option<&CaseSchema> {
        self.cases.iter().find(|case| &case.qname == qname)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseSchema {
    pub qname: QName,
    #[serde(default)]
    pub children: Vec<DataSchemaNode>,
    #[serde(default)]
    pub augmentations: Vec<AugmentationSchema>,
}

impl CaseSchema {
    pub fn new(qname: QName, children: Vec<DataSchemaNode>) -> Self {
        Self {
            qname,
            children,
            augmentations: Vec::new(),
        }
    }
}

/// Nodes another module injects into a parent through `augment`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AugmentationSchema {
    /// Schema path of the augment target, informational only
    #[serde(default)]
    pub target: Option<String>,
    pub children: Vec<DataSchemaNode>,
}

impl AugmentationSchema {
    pub fn new(children: Vec<DataSchemaNode>) -> Self {
        Self {
            target: None,
            children,
        }
    }

    /// Names of the direct child nodes, the identity of the grouping node
    pub fn identifier(&self) -> BTreeSet<QName> {
        self.children.iter().map(|c| c.qname().clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnydataSchema {
    pub qname: QName,
    /// Schema the content is normalized against during parsing, if known
    #[serde(default)]
    pub content: Option<Box<DataSchemaNode>>,
}

impl AnydataSchema {
    pub fn new(qname: QName) -> Self {
        Self {
            qname,
            content: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnyxmlSchema {
    pub qname: QName,
}

/// A schema node with data children: containers, list entries, cases,
/// augmentations and the schema root
pub trait DataNodeContainer {
    fn children(&self) -> &[DataSchemaNode];

    fn augmentations(&self) -> &[AugmentationSchema] {
        &[]
    }

    /// Human-readable name used in error messages
    fn describe(&self) -> String;
}

impl DataNodeContainer for ContainerSchema {
    fn children(&self) -> &[DataSchemaNode] {
        &self.children
    }

    fn augmentations(&self) -> &[AugmentationSchema] {
        &self.augmentations
    }

    fn describe(&self) -> String {
        self.qname.to_string()
    }
}

impl DataNodeContainer for ListSchema {
    fn children(&self) -> &[DataSchemaNode] {
        &self.children
    }

    fn augmentations(&self) -> &[AugmentationSchema] {
        &self.augmentations
    }

    fn describe(&self) -> String {
        self.qname.to_string()
    }
}

impl DataNodeContainer for CaseSchema {
    fn children(&self) -> &[DataSchemaNode] {
        &self.children
    }

    fn augmentations(&self) -> &[AugmentationSchema] {
        &self.augmentations
    }

    fn describe(&self) -> String {
        self.qname.to_string()
    }
}

impl DataNodeContainer for AugmentationSchema {
    fn children(&self) -> &[DataSchemaNode] {
        &self.children
    }

    fn describe(&self) -> String {
        match &self.target {
            Some(target) => format!("augmentation of {}", target),
            None => "augmentation".to_string(),
        }
    }
}

/// One transparent schema level between a data parent and a data child
#[derive(Debug, Clone, Copy)]
pub enum SchemaStep<'s> {
    Choice {
        choice: &'s ChoiceSchema,
        case: &'s CaseSchema,
    },
    Augmentation(&'s AugmentationSchema),
}

/// Result of resolving an element name under a data parent
#[derive(Debug, Clone)]
pub struct ChildPath<'s> {
    /// Choice/case and augmentation levels crossed, outermost first
    pub steps: Vec<SchemaStep<'s>>,
    pub node: &'s DataSchemaNode,
}

/// Find the data node named `namespace`/`local_name` below `parent`, looking
/// through choices, cases and augmentations
pub fn resolve_child<'s>(
    parent: &'s (impl DataNodeContainer + ?Sized),
    namespace: &str,
    local_name: &str,
) -> Option<ChildPath<'s>> {
    resolve_in(parent.children(), parent.augmentations(), namespace, local_name)
}

fn resolve_in<'s>(
    children: &'s [DataSchemaNode],
    augmentations: &'s [AugmentationSchema],
    namespace: &str,
    local_name: &str,
) -> Option<ChildPath<'s>> {
    for child in children {
        match child {
            DataSchemaNode::Choice(choice) => {
                for case in &choice.cases {
                    if let Some(mut path) =
                        resolve_in(&case.children, &case.augmentations, namespace, local_name)
                    {
                        path.steps.insert(0, SchemaStep::Choice { choice, case });
                        return Some(path);
                    }
                }
            }
            node if node.qname().matches(namespace, local_name) => {
                return Some(ChildPath {
                    steps: Vec::new(),
                    node,
                });
            }
            _ => {}
        }
    }
    for augmentation in augmentations {
        if let Some(mut path) = resolve_in(&augmentation.children, &[], namespace, local_name) {
            path.steps.insert(0, SchemaStep::Augmentation(augmentation));
            return Some(path);
        }
    }
    None
}

/// Direct (non-transparent) child of `parent` named `qname`, including choices
pub fn direct_child<'s>(
    parent: &'s (impl DataNodeContainer + ?Sized),
    qname: &QName,
) -> Option<&'s DataSchemaNode> {
    parent.children().iter().find(|c| c.qname() == qname)
}

/// Augmentation of `parent` whose child names equal `identifier`
pub fn find_augmentation<'s>(
    parent: &'s (impl DataNodeContainer + ?Sized),
    identifier: &BTreeSet<QName>,
) -> Option<&'s AugmentationSchema> {
    parent
        .augmentations()
        .iter()
        .find(|aug| &aug.identifier() == identifier)
}

/// Interned data path of a schema node, used as a codec cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SchemaPath(String);

impl SchemaPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn child(&self, qname: &QName) -> Self {
        let mut path = String::with_capacity(self.0.len() + qname.local_name().len() + 2);
        path.push_str(&self.0);
        path.push('/');
        path.push_str(&qname.to_clark());
        Self(path)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SchemaPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("/")
        } else {
            f.write_str(&self.0)
        }
    }
}

/// All loaded modules plus their top-level data nodes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SchemaContext {
    #[serde(default)]
    pub modules: Vec<Module>,
    #[serde(default)]
    pub data: Vec<DataSchemaNode>,
    #[serde(default)]
    pub augmentations: Vec<AugmentationSchema>,
}

impl SchemaContext {
    pub fn new(modules: Vec<Module>, data: Vec<DataSchemaNode>) -> Self {
        Self {
            modules,
            data,
            augmentations: Vec::new(),
        }
    }

    pub fn find_module_by_namespace(&self, namespace: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.namespace == namespace)
    }

    pub fn find_module_by_prefix(&self, prefix: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.prefix == prefix)
    }

    /// Top-level data node by name
    pub fn data_child(&self, qname: &QName) -> Option<&DataSchemaNode> {
        resolve_child(self, qname.namespace(), qname.local_name()).map(|path| path.node)
    }

    pub fn resolve_child<'s>(
        &self,
        parent: &'s (impl DataNodeContainer + ?Sized),
        namespace: &str,
        local_name: &str,
    ) -> Option<ChildPath<'s>> {
        resolve_child(parent, namespace, local_name)
    }

    pub fn type_of<'s>(&self, node: &'s DataSchemaNode) -> Option<&'s TypeDefinition> {
        node.type_definition()
    }

    pub fn case_of<'s>(&self, choice: &'s ChoiceSchema, child: &QName) -> Option<&'s CaseSchema> {
        choice.case_of(child)
    }

    pub fn target_of<'s>(&self, leafref: &'s TypeDefinition) -> Option<&'s TypeDefinition> {
        leafref.leafref_target()
    }

    /// Descend from the top level through data nodes (choices and cases are
    /// looked through) following `path`
    pub fn find_data_node(&self, path: &[QName]) -> Option<&DataSchemaNode> {
        let (first, rest) = path.split_first()?;
        let mut node = self.data_child(first)?;
        for qname in rest {
            let parent = node.as_data_container()?;
            node = resolve_child(parent, qname.namespace(), qname.local_name())?.node;
        }
        Some(node)
    }
}

impl DataNodeContainer for SchemaContext {
    fn children(&self) -> &[DataSchemaNode] {
        &self.data
    }

    fn augmentations(&self) -> &[AugmentationSchema] {
        &self.augmentations
    }

    fn describe(&self) -> String {
        "schema root".to_string()
    }
}
