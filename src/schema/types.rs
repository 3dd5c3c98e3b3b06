//! Resolved YANG type definitions.
//!
//! A [`TypeDefinition`] is the fully derived type of a leaf or leaf-list: the
//! typedef chain is already flattened and every restriction is attached to the
//! variant it applies to. Leafref targets and identityref identity sets are
//! resolved by the schema component before they reach this crate.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::decimal::Decimal64;
use crate::qname::QName;

/// Closed interval `[min..max]` of a range or length restriction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval<T> {
    pub min: T,
    pub max: T,
}

impl<T> Interval<T> {
    pub fn new(min: T, max: T) -> Self {
        Self { min, max }
    }
}

impl<T: PartialOrd> Interval<T> {
    pub fn contains(&self, value: &T) -> bool {
        &self.min <= value && value <= &self.max
    }
}

impl<T: fmt::Display> fmt::Display for Interval<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}..{}]", self.min, self.max)
    }
}

/// A `range` or `length` statement: a union of intervals plus the optional
/// `error-message` / `error-app-tag` substatements
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RangeRestriction<T> {
    pub intervals: Vec<Interval<T>>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub error_app_tag: Option<String>,
}

impl<T> RangeRestriction<T> {
    pub fn new(intervals: Vec<Interval<T>>) -> Self {
        Self {
            intervals,
            error_message: None,
            error_app_tag: None,
        }
    }

    pub fn single(min: T, max: T) -> Self {
        Self::new(vec![Interval::new(min, max)])
    }

    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_error_app_tag(mut self, tag: impl Into<String>) -> Self {
        self.error_app_tag = Some(tag.into());
        self
    }
}

impl<T: PartialOrd> RangeRestriction<T> {
    pub fn contains(&self, value: &T) -> bool {
        self.intervals.iter().any(|interval| interval.contains(value))
    }
}

impl<T: fmt::Display> fmt::Display for RangeRestriction<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, interval) in self.intervals.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", interval)?;
        }
        f.write_str("]")
    }
}

/// Length restriction on strings (characters) and binaries (octets)
pub type LengthRestriction = RangeRestriction<u64>;

/// A `pattern` statement
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatternRestriction {
    pub regex: String,
    #[serde(default)]
    pub invert_match: bool,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub error_app_tag: Option<String>,
}

impl PatternRestriction {
    pub fn new(regex: impl Into<String>) -> Self {
        Self {
            regex: regex.into(),
            invert_match: false,
            error_message: None,
            error_app_tag: None,
        }
    }

    pub fn inverted(mut self) -> Self {
        self.invert_match = true;
        self
    }
}

/// A named bit with its declared position
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bit {
    pub name: String,
    pub position: u32,
}

impl Bit {
    pub fn new(name: impl Into<String>, position: u32) -> Self {
        Self {
            name: name.into(),
            position,
        }
    }
}

/// An enum name with its assigned value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnumPair {
    pub name: String,
    pub value: i32,
}

impl EnumPair {
    pub fn new(name: impl Into<String>, value: i32) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Fully resolved type of a leaf or leaf-list
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "base", rename_all = "kebab-case")]
pub enum TypeDefinition {
    Boolean,
    Empty,
    Binary {
        #[serde(default)]
        length: Option<LengthRestriction>,
    },
    String {
        #[serde(default)]
        length: Option<LengthRestriction>,
        #[serde(default)]
        patterns: Vec<PatternRestriction>,
    },
    Bits {
        bits: Vec<Bit>,
    },
    Decimal64 {
        fraction_digits: u8,
        #[serde(default)]
        range: Option<RangeRestriction<Decimal64>>,
    },
    Int8 {
        #[serde(default)]
        range: Option<RangeRestriction<i64>>,
    },
    Int16 {
        #[serde(default)]
        range: Option<RangeRestriction<i64>>,
    },
    Int32 {
        #[serde(default)]
        range: Option<RangeRestriction<i64>>,
    },
    Int64 {
        #[serde(default)]
        range: Option<RangeRestriction<i64>>,
    },
    Uint8 {
        #[serde(default)]
        range: Option<RangeRestriction<u64>>,
    },
    Uint16 {
        #[serde(default)]
        range: Option<RangeRestriction<u64>>,
    },
    Uint32 {
        #[serde(default)]
        range: Option<RangeRestriction<u64>>,
    },
    Uint64 {
        #[serde(default)]
        range: Option<RangeRestriction<u64>>,
    },
    Enumeration {
        enums: Vec<EnumPair>,
    },
    /// `identities` lists every identity the reference may name, i.e. the
    /// identities derived from the declared bases
    Identityref {
        identities: Vec<QName>,
    },
    InstanceIdentifier {
        #[serde(default = "default_require_instance")]
        require_instance: bool,
    },
    Leafref {
        path: String,
        target: Box<TypeDefinition>,
    },
    Union {
        members: Vec<TypeDefinition>,
    },
}

fn default_require_instance() -> bool {
    true
}

impl TypeDefinition {
    pub fn string() -> Self {
        TypeDefinition::String {
            length: None,
            patterns: Vec::new(),
        }
    }

    pub fn binary() -> Self {
        TypeDefinition::Binary { length: None }
    }

    pub fn int8() -> Self {
        TypeDefinition::Int8 { range: None }
    }

    pub fn int16() -> Self {
        TypeDefinition::Int16 { range: None }
    }

    pub fn int32() -> Self {
        TypeDefinition::Int32 { range: None }
    }

    pub fn int64() -> Self {
        TypeDefinition::Int64 { range: None }
    }

    pub fn uint8() -> Self {
        TypeDefinition::Uint8 { range: None }
    }

    pub fn uint16() -> Self {
        TypeDefinition::Uint16 { range: None }
    }

    pub fn uint32() -> Self {
        TypeDefinition::Uint32 { range: None }
    }

    pub fn uint64() -> Self {
        TypeDefinition::Uint64 { range: None }
    }

    pub fn decimal64(fraction_digits: u8) -> Self {
        TypeDefinition::Decimal64 {
            fraction_digits,
            range: None,
        }
    }

    pub fn enumeration<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TypeDefinition::Enumeration {
            enums: names
                .into_iter()
                .enumerate()
                .map(|(i, name)| EnumPair::new(name, i as i32))
                .collect(),
        }
    }

    pub fn bits<I, S>(bits: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        TypeDefinition::Bits {
            bits: bits
                .into_iter()
                .map(|(name, position)| Bit::new(name, position))
                .collect(),
        }
    }

    pub fn union(members: Vec<TypeDefinition>) -> Self {
        TypeDefinition::Union { members }
    }

    pub fn leafref(path: impl Into<String>, target: TypeDefinition) -> Self {
        TypeDefinition::Leafref {
            path: path.into(),
            target: Box::new(target),
        }
    }

    /// YANG built-in type name of this definition's base type
    pub fn kind_name(&self) -> &'static str {
        match self {
            TypeDefinition::Boolean => "boolean",
            TypeDefinition::Empty => "empty",
            TypeDefinition::Binary { .. } => "binary",
            TypeDefinition::String { .. } => "string",
            TypeDefinition::Bits { .. } => "bits",
            TypeDefinition::Decimal64 { .. } => "decimal64",
            TypeDefinition::Int8 { .. } => "int8",
            TypeDefinition::Int16 { .. } => "int16",
            TypeDefinition::Int32 { .. } => "int32",
            TypeDefinition::Int64 { .. } => "int64",
            TypeDefinition::Uint8 { .. } => "uint8",
            TypeDefinition::Uint16 { .. } => "uint16",
            TypeDefinition::Uint32 { .. } => "uint32",
            TypeDefinition::Uint64 { .. } => "uint64",
            TypeDefinition::Enumeration { .. } => "enumeration",
            TypeDefinition::Identityref { .. } => "identityref",
            TypeDefinition::InstanceIdentifier { .. } => "instance-identifier",
            TypeDefinition::Leafref { .. } => "leafref",
            TypeDefinition::Union { .. } => "union",
        }
    }

    /// Dereferenced target of a leafref, following chained leafrefs
    pub fn leafref_target(&self) -> Option<&TypeDefinition> {
        match self {
            TypeDefinition::Leafref { target, .. } => match target.leafref_target() {
                Some(inner) => Some(inner),
                None => Some(target),
            },
            _ => None,
        }
    }
}

impl fmt::Display for TypeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_display_matches_netconf_wording() {
        let range = RangeRestriction::single(
            "10.0".parse::<Decimal64>().unwrap(),
            "100.0".parse::<Decimal64>().unwrap(),
        );
        assert_eq!(range.to_string(), "[[10.0..100.0]]");

        let ints = RangeRestriction::new(vec![Interval::new(1i64, 5), Interval::new(10, 20)]);
        assert_eq!(ints.to_string(), "[[1..5], [10..20]]");
        assert!(ints.contains(&3));
        assert!(!ints.contains(&7));
        assert!(ints.contains(&20));
    }

    #[test]
    fn test_chained_leafref_target() {
        let chained = TypeDefinition::leafref(
            "../a",
            TypeDefinition::leafref("../b", TypeDefinition::int32()),
        );
        assert_eq!(chained.leafref_target(), Some(&TypeDefinition::int32()));
        assert_eq!(TypeDefinition::Boolean.leafref_target(), None);
    }

    #[test]
    fn test_deserialize_tagged_type() {
        let json = r#"{
            "base": "union",
            "members": [
                {"base": "enumeration", "enums": [{"name": "enum1", "value": 0}]},
                {"base": "int32", "range": {"intervals": [{"min": 1, "max": 10}]}},
                {"base": "empty"}
            ]
        }"#;
        let parsed: TypeDefinition = serde_json::from_str(json).unwrap();
        let TypeDefinition::Union { members } = &parsed else {
            panic!("expected union, got {parsed:?}");
        };
        assert_eq!(members.len(), 3);
        assert_eq!(members[1].kind_name(), "int32");
        assert_eq!(members[2], TypeDefinition::Empty);
    }

    #[test]
    fn test_enumeration_helper_assigns_values() {
        let TypeDefinition::Enumeration { enums } = TypeDefinition::enumeration(["a", "b"]) else {
            unreachable!()
        };
        assert_eq!(enums, vec![EnumPair::new("a", 0), EnumPair::new("b", 1)]);
    }
}
