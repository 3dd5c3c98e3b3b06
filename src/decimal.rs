//! Fixed-point decimal values of the YANG `decimal64` type.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, Result};

/// A `decimal64` value: a signed 64-bit unscaled integer and a scale of
/// 1..=18 fraction digits.
///
/// Equality, ordering and hashing are numeric, so `20.0` at scale 1 equals
/// `20.00` at scale 2.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Decimal64 {
    unscaled: i64,
    scale: u8,
}

impl Decimal64 {
    pub const MIN_SCALE: u8 = 1;
    pub const MAX_SCALE: u8 = 18;

    pub fn new(unscaled: i64, scale: u8) -> Result<Self> {
        check_scale(scale)?;
        Ok(Self { unscaled, scale })
    }

    pub fn unscaled_value(&self) -> i64 {
        self.unscaled
    }

    pub fn scale(&self) -> u8 {
        self.scale
    }

    pub fn is_zero(&self) -> bool {
        self.unscaled == 0
    }

    /// Parse decimal text at exactly `fraction_digits` scale.
    ///
    /// Trailing fractional zeros are insignificant. Text needing more
    /// significant fraction digits than declared, or whose value does not fit
    /// the 64-bit unscaled range, is rejected.
    pub fn parse_with_scale(text: &str, fraction_digits: u8) -> Result<Self> {
        check_scale(fraction_digits)?;
        let literal = Literal::parse(text)?;
        if literal.fraction.len() > fraction_digits as usize {
            return Err(CodecError::invalid_argument(format!(
                "Value '{}' requires rounding to fit fraction-digits {}",
                text, fraction_digits
            )));
        }

        let overflow = || {
            CodecError::invalid_argument(format!(
                "Value '{}' is out of range for decimal64 with fraction-digits {}",
                text, fraction_digits
            ))
        };
        // 19 significant integer digits already exceed any representable value
        if literal.integer.len() > 19 {
            return Err(overflow());
        }
        let mut magnitude: i128 = 0;
        for digit in literal.integer.bytes().chain(literal.fraction.bytes()) {
            magnitude = magnitude * 10 + i128::from(digit - b'0');
        }
        magnitude *= pow10(fraction_digits as usize - literal.fraction.len());
        let value = if literal.negative {
            -magnitude
        } else {
            magnitude
        };
        let unscaled = i64::try_from(value).map_err(|_| overflow())?;
        Ok(Self {
            unscaled,
            scale: fraction_digits,
        })
    }

    /// The same number at a different scale, if it is exactly representable
    pub fn rescale(&self, scale: u8) -> Result<Self> {
        check_scale(scale)?;
        let value = i128::from(self.unscaled);
        let rescaled = if scale >= self.scale {
            value * pow10((scale - self.scale) as usize)
        } else {
            let divisor = pow10((self.scale - scale) as usize);
            if value % divisor != 0 {
                return Err(CodecError::invalid_argument(format!(
                    "Value '{}' requires rounding to fit fraction-digits {}",
                    self, scale
                )));
            }
            value / divisor
        };
        let unscaled = i64::try_from(rescaled).map_err(|_| {
            CodecError::invalid_argument(format!(
                "Value '{}' is out of range for decimal64 with fraction-digits {}",
                self, scale
            ))
        })?;
        Ok(Self { unscaled, scale })
    }

    /// Canonical text: minimal fraction digits, but at least one digit on
    /// either side of the point
    pub fn to_canonical_string(&self) -> String {
        let factor = pow10(self.scale as usize);
        let value = i128::from(self.unscaled);
        let magnitude = value.abs();
        let integer = magnitude / factor;
        let fraction = magnitude % factor;

        let mut out = String::with_capacity(24);
        if value < 0 {
            out.push('-');
        }
        out.push_str(&integer.to_string());
        out.push('.');
        if fraction == 0 {
            out.push('0');
        } else {
            let digits = format!("{:0width$}", fraction, width = self.scale as usize);
            out.push_str(digits.trim_end_matches('0'));
        }
        out
    }

    /// Value at its smallest scale, used for numeric hashing
    fn normalized(&self) -> (i64, u8) {
        let mut unscaled = self.unscaled;
        let mut scale = self.scale;
        while scale > Self::MIN_SCALE && unscaled % 10 == 0 {
            unscaled /= 10;
            scale -= 1;
        }
        (unscaled, scale)
    }

    fn widened(&self, scale: u8) -> i128 {
        i128::from(self.unscaled) * pow10((scale - self.scale) as usize)
    }
}

impl PartialEq for Decimal64 {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Decimal64 {}

impl PartialOrd for Decimal64 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decimal64 {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.scale == other.scale {
            return self.unscaled.cmp(&other.unscaled);
        }
        let scale = self.scale.max(other.scale);
        self.widened(scale).cmp(&other.widened(scale))
    }
}

impl Hash for Decimal64 {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized().hash(state);
    }
}

impl fmt::Display for Decimal64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_canonical_string())
    }
}

/// Parses at the smallest scale that holds every significant digit
impl FromStr for Decimal64 {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        let literal = Literal::parse(s)?;
        let digits = literal.fraction.len().max(Self::MIN_SCALE as usize);
        if digits > Self::MAX_SCALE as usize {
            return Err(CodecError::invalid_argument(format!(
                "Value '{}' has more than {} fraction digits",
                s,
                Self::MAX_SCALE
            )));
        }
        Self::parse_with_scale(s, digits as u8)
    }
}

impl TryFrom<String> for Decimal64 {
    type Error = CodecError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Decimal64> for String {
    fn from(value: Decimal64) -> Self {
        value.to_canonical_string()
    }
}

/// Lexical pieces of a decimal literal, fraction trailing zeros and integer
/// leading zeros already dropped
struct Literal<'a> {
    negative: bool,
    integer: &'a str,
    fraction: &'a str,
}

impl<'a> Literal<'a> {
    fn parse(text: &'a str) -> Result<Self> {
        if text.is_empty() {
            return Err(CodecError::invalid_argument(
                "Empty string is not a valid decimal64 representation",
            ));
        }
        let (negative, body) = match text.as_bytes()[0] {
            b'-' => (true, &text[1..]),
            b'+' => (false, &text[1..]),
            _ => (false, text),
        };
        let (integer, fraction) = match body.split_once('.') {
            Some((integer, fraction)) => {
                if fraction.is_empty() {
                    return Err(CodecError::invalid_argument(format!(
                        "Value '{}' is missing fraction digits after the decimal point",
                        text
                    )));
                }
                (integer, fraction)
            }
            None => (body, ""),
        };
        if integer.is_empty() {
            return Err(CodecError::invalid_argument(format!(
                "Value '{}' is missing integer digits",
                text
            )));
        }
        let offset = text.len() - body.len();
        if let Some(pos) = body.bytes().position(|b| b != b'.' && !b.is_ascii_digit()) {
            return Err(CodecError::invalid_argument(format!(
                "Value '{}' has an illegal character at offset {}",
                text,
                offset + pos
            )));
        }

        let integer = integer.trim_start_matches('0');
        Ok(Self {
            negative,
            integer,
            fraction: fraction.trim_end_matches('0'),
        })
    }
}

fn check_scale(scale: u8) -> Result<()> {
    if (Decimal64::MIN_SCALE..=Decimal64::MAX_SCALE).contains(&scale) {
        Ok(())
    } else {
        Err(CodecError::invalid_argument(format!(
            "Fraction digits {} is outside of the allowed range 1..=18",
            scale
        )))
    }
}

fn pow10(exp: usize) -> i128 {
    10i128.pow(exp as u32)
}
