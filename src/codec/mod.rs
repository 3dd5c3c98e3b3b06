//! Per-type string codecs.
//!
//! A [`Codec`] converts between a [`Value`] and its lexical form for one
//! resolved [`TypeDefinition`]. Codecs are immutable and shared; the
//! [`CodecRegistry`] caches one per leaf.

mod bits;
mod decimal;
mod identity;
mod integer;
mod registry;
mod string;
mod union;

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

use crate::error::{CodecError, InvalidValue, Result};
use crate::schema::{RangeRestriction, SchemaContext, TypeDefinition};
use crate::value::Value;

use bits::BitsCodec;
use decimal::DecimalCodec;
use identity::{IdentityRefCodec, InstanceIdentifierCodec};
use integer::IntegerCodec;
use string::{BinaryCodec, EnumerationCodec, StringCodec};
use union::UnionCodec;

pub use integer::{IntegerKind, parse_integer_literal};
pub use registry::CodecRegistry;

/// Resolves XML prefixes to namespaces while decoding prefixed values
pub trait NamespaceContext {
    /// `None` asks for the default namespace
    fn namespace_for_prefix(&self, prefix: Option<&str>) -> Option<&str>;
}

/// Picks the prefix under which a namespace is written while encoding
/// prefixed values
pub trait PrefixResolver {
    fn prefix_for(&mut self, namespace: &str) -> Result<String>;
}

/// Prefix table built from the modules of a schema context
#[derive(Debug, Clone, Default)]
pub struct ModulePrefixes {
    by_namespace: HashMap<String, String>,
    by_prefix: HashMap<String, String>,
}

impl ModulePrefixes {
    pub fn from_context(context: &SchemaContext) -> Self {
        let mut prefixes = Self::default();
        for module in &context.modules {
            prefixes
                .by_namespace
                .insert(module.namespace.clone(), module.prefix.clone());
            prefixes
                .by_prefix
                .insert(module.prefix.clone(), module.namespace.clone());
        }
        prefixes
    }

    pub fn prefix_of(&self, namespace: &str) -> Option<&str> {
        self.by_namespace.get(namespace).map(String::as_str)
    }

    pub fn namespace_of(&self, prefix: &str) -> Option<&str> {
        self.by_prefix.get(prefix).map(String::as_str)
    }
}

impl NamespaceContext for ModulePrefixes {
    fn namespace_for_prefix(&self, prefix: Option<&str>) -> Option<&str> {
        prefix.and_then(|p| self.namespace_of(p))
    }
}

/// Writes module prefixes, failing for namespaces no module declares
struct SchemaPrefixes<'a>(&'a ModulePrefixes);

impl PrefixResolver for SchemaPrefixes<'_> {
    fn prefix_for(&mut self, namespace: &str) -> Result<String> {
        self.0.prefix_of(namespace).map(str::to_string).ok_or_else(|| {
            CodecError::invalid_argument(format!(
                "No module with namespace '{}' is known to the schema context",
                namespace
            ))
        })
    }
}

/// Bidirectional codec for one resolved type
#[derive(Debug, Clone)]
pub struct Codec {
    type_name: &'static str,
    kind: CodecKind,
    modules: Arc<ModulePrefixes>,
}

#[derive(Debug, Clone)]
enum CodecKind {
    Boolean,
    Empty,
    Binary(BinaryCodec),
    String(StringCodec),
    Bits(BitsCodec),
    Decimal64(DecimalCodec),
    Integer(IntegerCodec),
    Enumeration(EnumerationCodec),
    IdentityRef(IdentityRefCodec),
    InstanceIdentifier(InstanceIdentifierCodec),
    LeafRef(Box<Codec>),
    Union(UnionCodec),
}

impl Codec {
    /// Build the codec for `type_def`, compiling its restrictions
    pub fn new(type_def: &TypeDefinition, modules: Arc<ModulePrefixes>) -> Result<Self> {
        let kind = match type_def {
            TypeDefinition::Boolean => CodecKind::Boolean,
            TypeDefinition::Empty => CodecKind::Empty,
            TypeDefinition::Binary { length } => {
                CodecKind::Binary(BinaryCodec::new(length.clone()))
            }
            TypeDefinition::String { length, patterns } => {
                CodecKind::String(StringCodec::new(length.clone(), patterns)?)
            }
            TypeDefinition::Bits { bits } => CodecKind::Bits(BitsCodec::new(bits)?),
            TypeDefinition::Decimal64 {
                fraction_digits,
                range,
            } => CodecKind::Decimal64(DecimalCodec::new(*fraction_digits, range.clone())?),
            TypeDefinition::Int8 { range } => {
                CodecKind::Integer(IntegerCodec::signed(IntegerKind::Int8, range.as_ref()))
            }
            TypeDefinition::Int16 { range } => {
                CodecKind::Integer(IntegerCodec::signed(IntegerKind::Int16, range.as_ref()))
            }
            TypeDefinition::Int32 { range } => {
                CodecKind::Integer(IntegerCodec::signed(IntegerKind::Int32, range.as_ref()))
            }
            TypeDefinition::Int64 { range } => {
                CodecKind::Integer(IntegerCodec::signed(IntegerKind::Int64, range.as_ref()))
            }
            TypeDefinition::Uint8 { range } => {
                CodecKind::Integer(IntegerCodec::unsigned(IntegerKind::Uint8, range.as_ref()))
            }
            TypeDefinition::Uint16 { range } => {
                CodecKind::Integer(IntegerCodec::unsigned(IntegerKind::Uint16, range.as_ref()))
            }
            TypeDefinition::Uint32 { range } => {
                CodecKind::Integer(IntegerCodec::unsigned(IntegerKind::Uint32, range.as_ref()))
            }
            TypeDefinition::Uint64 { range } => {
                CodecKind::Integer(IntegerCodec::unsigned(IntegerKind::Uint64, range.as_ref()))
            }
            TypeDefinition::Enumeration { enums } => {
                CodecKind::Enumeration(EnumerationCodec::new(enums.clone()))
            }
            TypeDefinition::Identityref { identities } => {
                CodecKind::IdentityRef(IdentityRefCodec::new(identities.clone()))
            }
            TypeDefinition::InstanceIdentifier { .. } => {
                CodecKind::InstanceIdentifier(InstanceIdentifierCodec)
            }
            TypeDefinition::Leafref { .. } => {
                let target = type_def.leafref_target().ok_or_else(|| {
                    CodecError::invalid_argument("Leafref has no resolved target type")
                })?;
                CodecKind::LeafRef(Box::new(Codec::new(target, Arc::clone(&modules))?))
            }
            TypeDefinition::Union { members } => {
                let members = members
                    .iter()
                    .map(|member| Codec::new(member, Arc::clone(&modules)))
                    .collect::<Result<Vec<_>>>()?;
                CodecKind::Union(UnionCodec::new(members))
            }
        };
        Ok(Self {
            type_name: type_def.kind_name(),
            kind,
            modules,
        })
    }

    /// Codec for a type whose values never carry prefixes
    pub fn for_type(type_def: &TypeDefinition) -> Result<Self> {
        Self::new(type_def, Arc::new(ModulePrefixes::default()))
    }

    /// YANG name of the type this codec handles
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Encode using the schema's module prefixes for prefixed values
    pub fn serialize(&self, value: &Value) -> Result<String> {
        let modules = Arc::clone(&self.modules);
        self.serialize_with(value, &mut SchemaPrefixes(&modules))
    }

    /// Decode using the schema's module prefixes for prefixed values
    pub fn deserialize(&self, text: &str) -> Result<Value> {
        let modules = Arc::clone(&self.modules);
        self.deserialize_with(text, modules.as_ref())
    }

    pub fn serialize_with(&self, value: &Value, prefixes: &mut dyn PrefixResolver) -> Result<String> {
        match &self.kind {
            CodecKind::Boolean => match value.untagged() {
                Value::Boolean(true) => Ok("true".to_string()),
                Value::Boolean(false) => Ok("false".to_string()),
                other => Err(mismatch("boolean", other)),
            },
            CodecKind::Empty => match value.untagged() {
                Value::Empty => Ok(String::new()),
                other => Err(mismatch("empty", other)),
            },
            CodecKind::Binary(codec) => codec.serialize(value.untagged()),
            CodecKind::String(codec) => codec.serialize(value.untagged()),
            CodecKind::Bits(codec) => codec.serialize(value.untagged()),
            CodecKind::Decimal64(codec) => codec.serialize(value.untagged()),
            CodecKind::Integer(codec) => codec.serialize(value.untagged()),
            CodecKind::Enumeration(codec) => codec.serialize(value.untagged()),
            CodecKind::IdentityRef(codec) => codec.serialize(value.untagged(), prefixes),
            CodecKind::InstanceIdentifier(codec) => codec.serialize(value.untagged(), prefixes),
            CodecKind::LeafRef(target) => target.serialize_with(value, prefixes),
            CodecKind::Union(codec) => codec.serialize(value, prefixes),
        }
    }

    pub fn deserialize_with(&self, text: &str, namespaces: &dyn NamespaceContext) -> Result<Value> {
        match &self.kind {
            CodecKind::Boolean => match text {
                "true" => Ok(Value::Boolean(true)),
                "false" => Ok(Value::Boolean(false)),
                _ => Err(CodecError::invalid_argument(format!(
                    "Invalid value '{}' for boolean type. Allowed values are true and false",
                    text
                ))),
            },
            CodecKind::Empty => {
                if text.is_empty() {
                    Ok(Value::Empty)
                } else {
                    Err(CodecError::invalid_argument(format!(
                        "Invalid value '{}' for empty type. The value must be empty",
                        text
                    )))
                }
            }
            CodecKind::Binary(codec) => codec.deserialize(text),
            CodecKind::String(codec) => codec.deserialize(text),
            CodecKind::Bits(codec) => codec.deserialize(text),
            CodecKind::Decimal64(codec) => codec.deserialize(text),
            CodecKind::Integer(codec) => codec.deserialize(text),
            CodecKind::Enumeration(codec) => codec.deserialize(text),
            CodecKind::IdentityRef(codec) => codec.deserialize(text, namespaces),
            CodecKind::InstanceIdentifier(codec) => codec.deserialize(text, namespaces),
            CodecKind::LeafRef(target) => target.deserialize_with(text, namespaces),
            CodecKind::Union(codec) => codec.deserialize(text, namespaces),
        }
    }
}

/// Error for a value of the wrong runtime kind handed to a serializer
fn mismatch(expected: &str, value: &Value) -> CodecError {
    CodecError::invalid_argument(format!(
        "Cannot serialize {} value '{}' as {}",
        value.kind_name(),
        value,
        expected
    ))
}

/// Structured invalid-value error for a range or length violation
fn range_violation<T: Display>(
    shown: &str,
    restriction: &RangeRestriction<T>,
    noun: &str,
) -> CodecError {
    InvalidValue::new(format!(
        "Value '{}' is not in required {} {}",
        shown, noun, restriction
    ))
    .with_declared(
        restriction.error_app_tag.as_deref(),
        restriction.error_message.as_deref(),
    )
    .into()
}
