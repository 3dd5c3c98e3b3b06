use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;

use crate::error::{CodecError, InvalidValue, Result};
use crate::schema::{EnumPair, LengthRestriction, PatternRestriction};
use crate::value::Value;

use super::{mismatch, range_violation};

#[derive(Debug, Clone)]
struct CompiledPattern {
    restriction: PatternRestriction,
    regex: Regex,
}

impl CompiledPattern {
    fn compile(restriction: &PatternRestriction) -> Result<Self> {
        // YANG patterns match the whole value
        let anchored = format!("^(?:{})$", restriction.regex);
        let regex = Regex::new(&anchored).map_err(|e| {
            CodecError::invalid_argument(format!(
                "Pattern '{}' is not a valid regular expression: {}",
                restriction.regex, e
            ))
        })?;
        Ok(Self {
            restriction: restriction.clone(),
            regex,
        })
    }

    fn check(&self, text: &str) -> Result<()> {
        if self.regex.is_match(text) != self.restriction.invert_match {
            return Ok(());
        }
        let message = if self.restriction.invert_match {
            format!(
                "Value '{}' matches inverted regular expression '{}'",
                text, self.restriction.regex
            )
        } else {
            format!(
                "Value '{}' does not match regular expression '{}'",
                text, self.restriction.regex
            )
        };
        Err(InvalidValue::new(message)
            .with_declared(
                self.restriction.error_app_tag.as_deref(),
                self.restriction.error_message.as_deref(),
            )
            .into())
    }
}

#[derive(Debug, Clone)]
pub(super) struct StringCodec {
    length: Option<LengthRestriction>,
    patterns: Vec<CompiledPattern>,
}

impl StringCodec {
    pub(super) fn new(
        length: Option<LengthRestriction>,
        patterns: &[PatternRestriction],
    ) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(CompiledPattern::compile)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { length, patterns })
    }

    pub(super) fn serialize(&self, value: &Value) -> Result<String> {
        let Value::String(text) = value else {
            return Err(mismatch("string", value));
        };
        self.validate(text)?;
        Ok(text.clone())
    }

    pub(super) fn deserialize(&self, text: &str) -> Result<Value> {
        self.validate(text)?;
        Ok(Value::String(text.to_string()))
    }

    fn validate(&self, text: &str) -> Result<()> {
        if let Some(length) = &self.length {
            let chars = text.chars().count() as u64;
            if !length.contains(&chars) {
                return Err(range_violation(text, length, "lengths"));
            }
        }
        self.patterns.iter().try_for_each(|pattern| pattern.check(text))
    }
}

#[derive(Debug, Clone)]
pub(super) struct BinaryCodec {
    length: Option<LengthRestriction>,
}

impl BinaryCodec {
    pub(super) fn new(length: Option<LengthRestriction>) -> Self {
        Self { length }
    }

    pub(super) fn serialize(&self, value: &Value) -> Result<String> {
        let Value::Binary(bytes) = value else {
            return Err(mismatch("binary", value));
        };
        let text = STANDARD.encode(bytes);
        self.check(bytes, &text)?;
        Ok(text)
    }

    pub(super) fn deserialize(&self, text: &str) -> Result<Value> {
        // Line-wrapped base64 is common in XML documents
        let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let bytes = STANDARD.decode(compact.as_bytes()).map_err(|e| {
            CodecError::invalid_argument(format!("Value '{}' is not valid base64: {}", text, e))
        })?;
        self.check(&bytes, text)?;
        Ok(Value::Binary(bytes))
    }

    fn check(&self, bytes: &[u8], shown: &str) -> Result<()> {
        match &self.length {
            Some(length) if !length.contains(&(bytes.len() as u64)) => {
                Err(range_violation(shown, length, "lengths"))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
pub(super) struct EnumerationCodec {
    enums: Vec<EnumPair>,
}

impl EnumerationCodec {
    pub(super) fn new(enums: Vec<EnumPair>) -> Self {
        Self { enums }
    }

    pub(super) fn serialize(&self, value: &Value) -> Result<String> {
        let Value::Enumeration(name) = value else {
            return Err(mismatch("enumeration", value));
        };
        self.lookup(name)?;
        Ok(name.clone())
    }

    pub(super) fn deserialize(&self, text: &str) -> Result<Value> {
        let pair = self.lookup(text)?;
        Ok(Value::Enumeration(pair.name.clone()))
    }

    fn lookup(&self, name: &str) -> Result<&EnumPair> {
        self.enums.iter().find(|pair| pair.name == name).ok_or_else(|| {
            let allowed: Vec<&str> = self.enums.iter().map(|pair| pair.name.as_str()).collect();
            CodecError::invalid_argument(format!(
                "Invalid value \"{}\" for enum type. Allowed values are: [{}]",
                name,
                allowed.join(", ")
            ))
        })
    }
}
