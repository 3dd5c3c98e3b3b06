//! Decoded leaf values.

use std::collections::BTreeSet;
use std::fmt;

use crate::decimal::Decimal64;
use crate::node::PathArgument;
use crate::qname::QName;

/// Runtime value of a leaf or leaf-list entry
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Empty,
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Decimal64(Decimal64),
    Binary(Vec<u8>),
    String(String),
    /// Names of the set bits
    Bits(BTreeSet<String>),
    Enumeration(String),
    IdentityRef(QName),
    InstanceIdentifier(InstanceIdentifier),
    /// A value decoded by one member of a union type
    Union(UnionValue),
}

impl Value {
    pub fn string(value: impl Into<String>) -> Self {
        Value::String(value.into())
    }

    pub fn bits<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::Bits(names.into_iter().map(Into::into).collect())
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "boolean",
            Value::Empty => "empty",
            Value::Int8(_) => "int8",
            Value::Int16(_) => "int16",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Uint8(_) => "uint8",
            Value::Uint16(_) => "uint16",
            Value::Uint32(_) => "uint32",
            Value::Uint64(_) => "uint64",
            Value::Decimal64(_) => "decimal64",
            Value::Binary(_) => "binary",
            Value::String(_) => "string",
            Value::Bits(_) => "bits",
            Value::Enumeration(_) => "enumeration",
            Value::IdentityRef(_) => "identityref",
            Value::InstanceIdentifier(_) => "instance-identifier",
            Value::Union(_) => "union",
        }
    }

    /// Integer payload widened to `i128`, for any fixed-width integer variant
    pub fn as_integer(&self) -> Option<i128> {
        match *self {
            Value::Int8(v) => Some(v.into()),
            Value::Int16(v) => Some(v.into()),
            Value::Int32(v) => Some(v.into()),
            Value::Int64(v) => Some(v.into()),
            Value::Uint8(v) => Some(v.into()),
            Value::Uint16(v) => Some(v.into()),
            Value::Uint32(v) => Some(v.into()),
            Value::Uint64(v) => Some(v.into()),
            _ => None,
        }
    }

    /// The value with any union tagging removed
    pub fn untagged(&self) -> &Value {
        match self {
            Value::Union(union) => union.value.untagged(),
            other => other,
        }
    }
}

/// Display gives a type-independent lexical form, used in predicates and
/// error messages
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Empty => Ok(()),
            Value::Int8(v) => write!(f, "{}", v),
            Value::Int16(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Uint8(v) => write!(f, "{}", v),
            Value::Uint16(v) => write!(f, "{}", v),
            Value::Uint32(v) => write!(f, "{}", v),
            Value::Uint64(v) => write!(f, "{}", v),
            Value::Decimal64(v) => write!(f, "{}", v),
            Value::Binary(bytes) => write!(f, "<{} bytes>", bytes.len()),
            Value::String(v) | Value::Enumeration(v) => f.write_str(v),
            Value::Bits(names) => {
                for (i, name) in names.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    f.write_str(name)?;
                }
                Ok(())
            }
            Value::IdentityRef(qname) => write!(f, "{}", qname),
            Value::InstanceIdentifier(id) => write!(f, "{}", id),
            Value::Union(union) => write!(f, "{}", union.value),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

value_from! {
    bool => Boolean,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => Uint8,
    u16 => Uint16,
    u32 => Uint32,
    u64 => Uint64,
    Decimal64 => Decimal64,
    Vec<u8> => Binary,
    String => String,
    QName => IdentityRef,
    InstanceIdentifier => InstanceIdentifier,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

/// Union member index plus the member's decoded value
#[derive(Debug, Clone, PartialEq)]
pub struct UnionValue {
    pub member: usize,
    pub value: Box<Value>,
}

impl UnionValue {
    pub fn new(member: usize, value: Value) -> Self {
        Self {
            member,
            value: Box::new(value),
        }
    }
}

/// Structured `instance-identifier` value
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InstanceIdentifier {
    steps: Vec<PathArgument>,
}

impl InstanceIdentifier {
    pub fn new(steps: Vec<PathArgument>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[PathArgument] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl fmt::Display for InstanceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            write!(f, "/{}", step)?;
        }
        Ok(())
    }
}
