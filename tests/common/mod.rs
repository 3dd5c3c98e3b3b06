//! Shared fixtures for the integration tests.
//!
//! The sample schema mirrors a small YANG module `foo` with an augmenting
//! module `aug`:
//!
//! ```text
//! container top {
//!   leaf decimal64-leaf { type decimal64 { fraction-digits 2; range "10.0..100.0"; } }
//!   leaf bits-leaf      { type bits { bit bit0 .. bit40 } }
//!   leaf union-leaf     { type union { enumeration; union { int32; int64; } empty; } }
//!   leaf int-leaf       { type int32; }
//!   leaf kind           { type identityref { base thing; } }
//!   leaf-list tags      { type string; }
//!   list admin { key name; leaf name; }
//!   list user  { key name; leaf name; leaf level { type uint8; } }
//!   choice protocol { case tcp { leaf port; } case udp { leaf datagram-size; } }
//!   anydata payload;
//!   anydata settings;        // content normalized against container settings
//!   aug:extra              // augmentation from module aug
//! }
//! container policies {
//!   list policy { key name; leaf name; list rule { key name; leaf name; leaf priority; leaf action; } }
//! }
//! ```
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use yang_xml_codec::decimal::Decimal64;
use yang_xml_codec::qname::QName;
use yang_xml_codec::schema::{
    AnydataSchema, AugmentationSchema, CaseSchema, ChoiceSchema, ContainerSchema, DataSchemaNode,
    LeafListSchema, LeafSchema, ListSchema, Module, RangeRestriction, SchemaContext,
    TypeDefinition,
};

pub const NS: &str = "foo-namespace";
pub const AUG_NS: &str = "augment-namespace";

pub fn q(local: &str) -> QName {
    QName::new(NS, local)
}

pub fn aug(local: &str) -> QName {
    QName::new(AUG_NS, local)
}

fn leaf(local: &str, type_def: TypeDefinition) -> DataSchemaNode {
    DataSchemaNode::Leaf(LeafSchema::new(q(local), type_def))
}

pub fn decimal(text: &str) -> Decimal64 {
    text.parse().unwrap()
}

pub fn decimal64_type() -> TypeDefinition {
    TypeDefinition::Decimal64 {
        fraction_digits: 2,
        range: Some(RangeRestriction::single(decimal("10.0"), decimal("100.0"))),
    }
}

pub fn bits_type() -> TypeDefinition {
    TypeDefinition::bits((0..=40).map(|position| (format!("bit{}", position), position)))
}

pub fn union_type() -> TypeDefinition {
    TypeDefinition::union(vec![
        TypeDefinition::enumeration(["enum1", "enum2"]),
        TypeDefinition::union(vec![TypeDefinition::int32(), TypeDefinition::int64()]),
        TypeDefinition::Empty,
    ])
}

fn top() -> ContainerSchema {
    let admin = ListSchema::new(
        q("admin"),
        vec![q("name")],
        vec![leaf("name", TypeDefinition::string())],
    );
    let user = ListSchema::new(
        q("user"),
        vec![q("name")],
        vec![
            leaf("name", TypeDefinition::string()),
            leaf("level", TypeDefinition::uint8()),
        ],
    );
    let protocol = ChoiceSchema::new(
        q("protocol"),
        vec![
            CaseSchema::new(q("tcp"), vec![leaf("port", TypeDefinition::uint16())]),
            CaseSchema::new(q("udp"), vec![leaf("datagram-size", TypeDefinition::uint32())]),
        ],
    );
    let settings = AnydataSchema {
        qname: q("settings"),
        content: Some(Box::new(DataSchemaNode::Container(ContainerSchema::new(
            q("settings"),
            vec![leaf("level", TypeDefinition::uint8())],
        )))),
    };
    let identities = TypeDefinition::Identityref {
        identities: vec![q("widget"), aug("gadget")],
    };

    ContainerSchema::new(
        q("top"),
        vec![
            leaf("decimal64-leaf", decimal64_type()),
            leaf("bits-leaf", bits_type()),
            leaf("union-leaf", union_type()),
            leaf("int-leaf", TypeDefinition::int32()),
            leaf("kind", identities),
            DataSchemaNode::LeafList(LeafListSchema::new(q("tags"), TypeDefinition::string())),
            DataSchemaNode::List(admin),
            DataSchemaNode::List(user),
            DataSchemaNode::Choice(protocol),
            DataSchemaNode::Anydata(AnydataSchema::new(q("payload"))),
            DataSchemaNode::Anydata(settings),
        ],
    )
    .with_augmentation(AugmentationSchema::new(vec![DataSchemaNode::Leaf(
        LeafSchema::new(aug("extra"), TypeDefinition::Boolean),
    )]))
}

fn policies() -> ContainerSchema {
    let rule = ListSchema::new(
        q("rule"),
        vec![q("name")],
        vec![
            leaf("name", TypeDefinition::string()),
            leaf("priority", TypeDefinition::uint16()),
            leaf("action", TypeDefinition::enumeration(["permit", "deny"])),
        ],
    )
    .ordered_by_user();
    let policy = ListSchema::new(
        q("policy"),
        vec![q("name")],
        vec![leaf("name", TypeDefinition::string()), DataSchemaNode::List(rule)],
    );
    ContainerSchema::new(q("policies"), vec![DataSchemaNode::List(policy)])
}

pub fn sample_context() -> SchemaContext {
    SchemaContext::new(
        vec![Module::new("foo", NS, "foo"), Module::new("aug", AUG_NS, "aug")],
        vec![DataSchemaNode::Container(top()), DataSchemaNode::Container(policies())],
    )
}

/// Top-level schema node by local name
pub fn root<'a>(context: &'a SchemaContext, local: &str) -> &'a DataSchemaNode {
    context.data_child(&q(local)).unwrap()
}

/// `<top>` document with the given inner XML
pub fn top_doc(inner: &str) -> String {
    format!(r#"<top xmlns="{}">{}</top>"#, NS, inner)
}

/// Temporary workspace holding a schema file and documents for CLI and
/// engine tests
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write the sample schema as JSON and return its path
    pub fn write_schema(&self) -> PathBuf {
        let path = self.path().join("schema.json");
        std::fs::write(&path, serde_json::to_string_pretty(&sample_context()).unwrap()).unwrap();
        path
    }

    /// Write a document under `docs/` and return its path
    pub fn write_doc(&self, name: &str, content: &str) -> PathBuf {
        let docs = self.path().join("docs");
        std::fs::create_dir_all(&docs).unwrap();
        let path = docs.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    pub fn docs_dir(&self) -> PathBuf {
        self.path().join("docs")
    }
}
