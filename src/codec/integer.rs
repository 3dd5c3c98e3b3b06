use crate::error::{CodecError, Result};
use crate::schema::{Interval, RangeRestriction};
use crate::value::Value;

use super::{mismatch, range_violation};

/// Fixed-width YANG integer types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegerKind {
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
}

impl IntegerKind {
    pub fn name(self) -> &'static str {
        match self {
            IntegerKind::Int8 => "int8",
            IntegerKind::Int16 => "int16",
            IntegerKind::Int32 => "int32",
            IntegerKind::Int64 => "int64",
            IntegerKind::Uint8 => "uint8",
            IntegerKind::Uint16 => "uint16",
            IntegerKind::Uint32 => "uint32",
            IntegerKind::Uint64 => "uint64",
        }
    }

    /// Inclusive value bounds of the type
    pub fn bounds(self) -> (i128, i128) {
        match self {
            IntegerKind::Int8 => (i8::MIN.into(), i8::MAX.into()),
            IntegerKind::Int16 => (i16::MIN.into(), i16::MAX.into()),
            IntegerKind::Int32 => (i32::MIN.into(), i32::MAX.into()),
            IntegerKind::Int64 => (i64::MIN.into(), i64::MAX.into()),
            IntegerKind::Uint8 => (0, u8::MAX.into()),
            IntegerKind::Uint16 => (0, u16::MAX.into()),
            IntegerKind::Uint32 => (0, u32::MAX.into()),
            IntegerKind::Uint64 => (0, u64::MAX.into()),
        }
    }

    /// Narrow a value already checked against [`IntegerKind::bounds`]
    fn to_value(self, value: i128) -> Value {
        match self {
            IntegerKind::Int8 => Value::Int8(value as i8),
            IntegerKind::Int16 => Value::Int16(value as i16),
            IntegerKind::Int32 => Value::Int32(value as i32),
            IntegerKind::Int64 => Value::Int64(value as i64),
            IntegerKind::Uint8 => Value::Uint8(value as u8),
            IntegerKind::Uint16 => Value::Uint16(value as u16),
            IntegerKind::Uint32 => Value::Uint32(value as u32),
            IntegerKind::Uint64 => Value::Uint64(value as u64),
        }
    }
}

/// Parse a YANG integer literal: optional sign, then decimal digits,
/// `0x`/`0X` followed by hex digits, or a leading `0` followed by octal digits.
pub fn parse_integer_literal(text: &str) -> Result<i128> {
    if text.is_empty() {
        return Err(CodecError::invalid_argument(
            "Empty string is not a valid integer representation",
        ));
    }
    let (negative, body) = match text.as_bytes()[0] {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    let (radix, digits) = if let Some(hex) = body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"))
    {
        (16, hex)
    } else if body.len() > 1 && body.starts_with('0') {
        (8, &body[1..])
    } else {
        (10, body)
    };

    // from_str_radix tolerates a sign of its own, so check digits explicitly
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(CodecError::invalid_argument(format!(
            "Value '{}' is not a valid integer in radix {}",
            text, radix
        )));
    }
    let too_large = || {
        CodecError::invalid_argument(format!("Value '{}' is too large for any integer type", text))
    };
    let magnitude = u128::from_str_radix(digits, radix).map_err(|_| too_large())?;
    let magnitude = i128::try_from(magnitude).map_err(|_| too_large())?;
    Ok(if negative { -magnitude } else { magnitude })
}

#[derive(Debug, Clone)]
pub(super) struct IntegerCodec {
    kind: IntegerKind,
    range: Option<RangeRestriction<i128>>,
}

impl IntegerCodec {
    pub(super) fn signed(kind: IntegerKind, range: Option<&RangeRestriction<i64>>) -> Self {
        Self {
            kind,
            range: range.map(|r| widen(r, i128::from)),
        }
    }

    pub(super) fn unsigned(kind: IntegerKind, range: Option<&RangeRestriction<u64>>) -> Self {
        Self {
            kind,
            range: range.map(|r| widen(r, i128::from)),
        }
    }

    pub(super) fn serialize(&self, value: &Value) -> Result<String> {
        let number = value
            .as_integer()
            .ok_or_else(|| mismatch(self.kind.name(), value))?;
        let text = number.to_string();
        self.check(number, &text)?;
        Ok(text)
    }

    pub(super) fn deserialize(&self, text: &str) -> Result<Value> {
        let number = parse_integer_literal(text)?;
        self.check(number, text)?;
        Ok(self.kind.to_value(number))
    }

    fn check(&self, number: i128, shown: &str) -> Result<()> {
        let (min, max) = self.kind.bounds();
        if number < min || number > max {
            return Err(CodecError::invalid_argument(format!(
                "Value '{}' is out of range for {}, which accepts [{}..{}]",
                shown,
                self.kind.name(),
                min,
                max
            )));
        }
        match &self.range {
            Some(range) if !range.contains(&number) => Err(range_violation(shown, range, "ranges")),
            _ => Ok(()),
        }
    }
}

fn widen<T: Copy>(range: &RangeRestriction<T>, f: impl Fn(T) -> i128) -> RangeRestriction<i128> {
    RangeRestriction {
        intervals: range
            .intervals
            .iter()
            .map(|interval| Interval::new(f(interval.min), f(interval.max)))
            .collect(),
        error_message: range.error_message.clone(),
        error_app_tag: range.error_app_tag.clone(),
    }
}
