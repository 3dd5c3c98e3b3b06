use tracing::trace;

use crate::error::{CodecError, Result};
use crate::value::{UnionValue, Value};

use super::{Codec, NamespaceContext, PrefixResolver};

#[derive(Debug, Clone)]
pub(super) struct UnionCodec {
    members: Vec<Codec>,
}

impl UnionCodec {
    pub(super) fn new(members: Vec<Codec>) -> Self {
        Self { members }
    }

    /// A tagged value goes to its own member; an untagged one to the first
    /// member that accepts it
    pub(super) fn serialize(&self, value: &Value, prefixes: &mut dyn PrefixResolver) -> Result<String> {
        if let Value::Union(tagged) = value {
            let member = self.members.get(tagged.member).ok_or_else(|| {
                CodecError::invalid_argument(format!(
                    "Union member index {} is out of range, the union has {} members",
                    tagged.member,
                    self.members.len()
                ))
            })?;
            return member.serialize_with(&tagged.value, prefixes);
        }
        for member in &self.members {
            if let Ok(text) = member.serialize_with(value, prefixes) {
                return Ok(text);
            }
        }
        Err(CodecError::invalid_argument(format!(
            "Value '{}' of kind {} does not match any member of union [{}]",
            value,
            value.kind_name(),
            self.member_names()
        )))
    }

    /// First member in declaration order that decodes the text wins
    pub(super) fn deserialize(&self, text: &str, namespaces: &dyn NamespaceContext) -> Result<Value> {
        for (index, member) in self.members.iter().enumerate() {
            match member.deserialize_with(text, namespaces) {
                Ok(value) => return Ok(Value::Union(UnionValue::new(index, value))),
                Err(err) => trace!(
                    member = member.type_name(),
                    error = %err,
                    "union member rejected value"
                ),
            }
        }
        Err(CodecError::invalid_argument(format!(
            "Value '{}' does not match any member of union [{}]",
            text,
            self.member_names()
        )))
    }

    fn member_names(&self) -> String {
        self.members
            .iter()
            .map(Codec::type_name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use crate::codec::Codec;
    use crate::schema::TypeDefinition;
    use crate::value::{UnionValue, Value};

    fn nested_union() -> Codec {
        Codec::for_type(&TypeDefinition::union(vec![
            TypeDefinition::enumeration(["enum1", "enum2"]),
            TypeDefinition::union(vec![TypeDefinition::int32(), TypeDefinition::int64()]),
            TypeDefinition::Empty,
        ]))
        .unwrap()
    }

    #[test]
    fn test_first_matching_member_wins() {
        let codec = nested_union();
        assert_eq!(
            codec.deserialize("enum1").unwrap().untagged(),
            &Value::Enumeration("enum1".to_string())
        );
        assert_eq!(codec.deserialize("123").unwrap().untagged(), &Value::Int32(123));
        assert_eq!(
            codec.deserialize("41234567890").unwrap().untagged(),
            &Value::Int64(41234567890)
        );
        assert_eq!(codec.deserialize("").unwrap().untagged(), &Value::Empty);
    }

    #[test]
    fn test_member_tags() {
        let codec = nested_union();
        assert_eq!(
            codec.deserialize("41234567890").unwrap(),
            Value::Union(UnionValue::new(
                1,
                Value::Union(UnionValue::new(1, Value::Int64(41234567890)))
            ))
        );
        assert_eq!(
            codec.deserialize("").unwrap(),
            Value::Union(UnionValue::new(2, Value::Empty))
        );
    }

    #[test]
    fn test_exhaustion_names_members() {
        let err = nested_union().deserialize("true").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("'true'"), "{message}");
        assert!(message.contains("enumeration, union, empty"), "{message}");
    }

    #[test]
    fn test_serialize_tagged_and_untagged() {
        let codec = nested_union();
        let tagged = codec.deserialize("0x10").unwrap();
        assert_eq!(codec.serialize(&tagged).unwrap(), "16");
        assert_eq!(codec.serialize(&Value::Int64(41234567890)).unwrap(), "41234567890");
        assert_eq!(codec.serialize(&Value::Empty).unwrap(), "");
        assert!(codec.serialize(&Value::Boolean(true)).is_err());
        assert!(
            codec
                .serialize(&Value::Union(UnionValue::new(7, Value::Empty)))
                .is_err()
        );
    }
}
