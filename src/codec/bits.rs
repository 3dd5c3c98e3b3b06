use std::collections::{BTreeSet, HashSet};

use crate::error::{CodecError, Result};
use crate::schema::Bit;
use crate::value::Value;

use super::mismatch;

#[derive(Debug, Clone)]
pub(super) struct BitsCodec {
    /// Declared bits, ascending by position
    bits: Vec<Bit>,
}

impl BitsCodec {
    pub(super) fn new(bits: &[Bit]) -> Result<Self> {
        let mut names = HashSet::new();
        let mut positions = HashSet::new();
        for bit in bits {
            if !names.insert(bit.name.as_str()) {
                return Err(CodecError::invalid_argument(format!(
                    "Bit '{}' is declared more than once",
                    bit.name
                )));
            }
            if !positions.insert(bit.position) {
                return Err(CodecError::invalid_argument(format!(
                    "Bit position {} is assigned to more than one bit",
                    bit.position
                )));
            }
        }
        let mut bits = bits.to_vec();
        bits.sort_by_key(|bit| bit.position);
        Ok(Self { bits })
    }

    pub(super) fn serialize(&self, value: &Value) -> Result<String> {
        let Value::Bits(set) = value else {
            return Err(mismatch("bits", value));
        };
        if let Some(unknown) = set.iter().find(|name| !self.is_declared(name)) {
            return Err(self.unknown(unknown));
        }
        let names: Vec<&str> = self
            .bits
            .iter()
            .filter(|bit| set.contains(&bit.name))
            .map(|bit| bit.name.as_str())
            .collect();
        Ok(names.join(" "))
    }

    pub(super) fn deserialize(&self, text: &str) -> Result<Value> {
        let mut set = BTreeSet::new();
        for name in text.split_whitespace() {
            if !self.is_declared(name) {
                return Err(self.unknown(name));
            }
            set.insert(name.to_string());
        }
        Ok(Value::Bits(set))
    }

    fn is_declared(&self, name: &str) -> bool {
        self.bits.iter().any(|bit| bit.name == name)
    }

    fn unknown(&self, name: &str) -> CodecError {
        let allowed: Vec<&str> = self.bits.iter().map(|bit| bit.name.as_str()).collect();
        CodecError::invalid_argument(format!(
            "Invalid value \"{}\" for bits type. Allowed values are: [{}]",
            name,
            allowed.join(", ")
        ))
    }
}
