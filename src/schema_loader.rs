//! Loading of resolved schema descriptions from JSON or TOML files.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::codec::Codec;
use crate::error::{SchemaLoadError, SchemaLoadResult};
use crate::qname::QName;
use crate::schema::{
    AugmentationSchema, DataNodeContainer, DataSchemaNode, ListSchema, SchemaContext,
};

/// Reads a [`SchemaContext`] from disk and checks it is internally consistent
pub struct SchemaLoader;

impl SchemaLoader {
    /// Load a schema description, choosing the format from the file extension
    pub fn load(path: &Path) -> SchemaLoadResult<SchemaContext> {
        let content = std::fs::read_to_string(path)?;

        let context: SchemaContext = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            Some(ext) => return Err(SchemaLoadError::UnsupportedFormat(ext.to_string())),
            None => Self::parse_untyped(&content)?,
        };

        Self::validate(&context).map_err(|details| SchemaLoadError::Invalid {
            path: path.to_path_buf(),
            details,
        })?;

        debug!(
            "Loaded schema {} with {} modules and {} top-level nodes",
            path.display(),
            context.modules.len(),
            context.data.len()
        );
        Ok(context)
    }

    /// Parse a JSON description held in memory
    pub fn from_json_str(content: &str) -> SchemaLoadResult<SchemaContext> {
        let context = serde_json::from_str(content)?;
        Self::validate_in_memory(context)
    }

    /// Parse a TOML description held in memory
    pub fn from_toml_str(content: &str) -> SchemaLoadResult<SchemaContext> {
        let context = toml::from_str(content)?;
        Self::validate_in_memory(context)
    }

    fn parse_untyped(content: &str) -> SchemaLoadResult<SchemaContext> {
        // JSON first: a JSON object is never valid TOML
        match serde_json::from_str(content) {
            Ok(context) => Ok(context),
            Err(_) => Ok(toml::from_str(content)?),
        }
    }

    fn validate_in_memory(context: SchemaContext) -> SchemaLoadResult<SchemaContext> {
        Self::validate(&context).map_err(|details| SchemaLoadError::Invalid {
            path: PathBuf::from("<memory>"),
            details,
        })?;
        Ok(context)
    }

    /// Structural checks the codec relies on
    pub fn validate(context: &SchemaContext) -> Result<(), String> {
        let mut namespaces = HashSet::new();
        let mut prefixes = HashSet::new();
        for module in &context.modules {
            if !namespaces.insert(module.namespace.as_str()) {
                return Err(format!(
                    "Namespace {} is declared by more than one module",
                    module.namespace
                ));
            }
            if !prefixes.insert(module.prefix.as_str()) {
                return Err(format!(
                    "Prefix {} is declared by more than one module",
                    module.prefix
                ));
            }
        }

        check_container(context)
    }
}

fn check_container(parent: &(impl DataNodeContainer + ?Sized)) -> Result<(), String> {
    let mut seen = HashSet::new();
    collect_names(parent.children(), parent.augmentations(), &mut seen, parent)?;
    for child in parent.children() {
        check_node(child)?;
    }
    for augmentation in parent.augmentations() {
        check_augmentation(augmentation)?;
    }
    Ok(())
}

fn check_augmentation(augmentation: &AugmentationSchema) -> Result<(), String> {
    if augmentation.children.is_empty() {
        return Err(format!("{} has no children", augmentation.describe()));
    }
    augmentation.children.iter().try_for_each(check_node)
}

fn check_node(node: &DataSchemaNode) -> Result<(), String> {
    match node {
        DataSchemaNode::Container(container) => check_container(container),
        DataSchemaNode::List(list) => {
            check_keys(list)?;
            check_container(list)
        }
        DataSchemaNode::Leaf(_) | DataSchemaNode::LeafList(_) => {
            let type_def = node.type_definition().ok_or_else(|| {
                format!("{} {} has no type", node.kind_name(), node.qname())
            })?;
            Codec::for_type(type_def)
                .map(|_| ())
                .map_err(|e| format!("Type of {} {}: {}", node.kind_name(), node.qname(), e))
        }
        DataSchemaNode::Choice(choice) => {
            for case in &choice.cases {
                check_container(case)?;
            }
            Ok(())
        }
        DataSchemaNode::Anydata(anydata) => match &anydata.content {
            Some(content) => check_node(content),
            None => Ok(()),
        },
        DataSchemaNode::Anyxml(_) => Ok(()),
    }
}

fn check_keys(list: &ListSchema) -> Result<(), String> {
    let mut seen = HashSet::new();
    for key in &list.keys {
        if !seen.insert(key) {
            return Err(format!("List {} declares key {} twice", list.qname, key));
        }
        match list.children.iter().find(|child| child.qname() == key) {
            Some(DataSchemaNode::Leaf(_)) => {}
            Some(other) => {
                return Err(format!(
                    "Key {} of list {} is a {}, not a leaf",
                    key,
                    list.qname,
                    other.kind_name()
                ));
            }
            None => {
                return Err(format!(
                    "Key {} of list {} is not a child leaf",
                    key, list.qname
                ));
            }
        }
    }
    Ok(())
}

/// Data node names visible under one parent must be unique once choices and
/// augmentations are looked through
fn collect_names<'s>(
    children: &'s [DataSchemaNode],
    augmentations: &'s [AugmentationSchema],
    seen: &mut HashSet<&'s QName>,
    parent: &(impl DataNodeContainer + ?Sized),
) -> Result<(), String> {
    for child in children {
        match child {
            DataSchemaNode::Choice(choice) => {
                for case in &choice.cases {
                    collect_names(&case.children, &case.augmentations, seen, parent)?;
                }
            }
            node => {
                if !seen.insert(node.qname()) {
                    return Err(format!(
                        "Node {} is defined more than once in {}",
                        node.qname(),
                        parent.describe()
                    ));
                }
            }
        }
    }
    for augmentation in augmentations {
        collect_names(&augmentation.children, &[], seen, parent)?;
    }
    Ok(())
}
