use crate::decimal::Decimal64;
use crate::error::{CodecError, Result};
use crate::schema::RangeRestriction;
use crate::value::Value;

use super::{mismatch, range_violation};

#[derive(Debug, Clone)]
pub(super) struct DecimalCodec {
    fraction_digits: u8,
    range: Option<RangeRestriction<Decimal64>>,
}

impl DecimalCodec {
    pub(super) fn new(
        fraction_digits: u8,
        range: Option<RangeRestriction<Decimal64>>,
    ) -> Result<Self> {
        if !(Decimal64::MIN_SCALE..=Decimal64::MAX_SCALE).contains(&fraction_digits) {
            return Err(CodecError::invalid_argument(format!(
                "decimal64 fraction-digits must be within 1..=18, got {}",
                fraction_digits
            )));
        }
        Ok(Self {
            fraction_digits,
            range,
        })
    }

    pub(super) fn serialize(&self, value: &Value) -> Result<String> {
        let Value::Decimal64(decimal) = value else {
            return Err(mismatch("decimal64", value));
        };
        let scaled = decimal.rescale(self.fraction_digits)?;
        let text = scaled.to_canonical_string();
        self.check(&scaled, &text)?;
        Ok(text)
    }

    pub(super) fn deserialize(&self, text: &str) -> Result<Value> {
        let decimal = Decimal64::parse_with_scale(text, self.fraction_digits)?;
        self.check(&decimal, text)?;
        Ok(Value::Decimal64(decimal))
    }

    fn check(&self, decimal: &Decimal64, shown: &str) -> Result<()> {
        match &self.range {
            Some(range) if !range.contains(decimal) => Err(range_violation(shown, range, "ranges")),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorSeverity, ErrorType};

    fn ranged() -> DecimalCodec {
        let range = RangeRestriction::single(
            "10.0".parse::<Decimal64>().unwrap(),
            "100.0".parse::<Decimal64>().unwrap(),
        );
        DecimalCodec::new(2, Some(range)).unwrap()
    }

    #[test]
    fn test_equivalent_texts_share_canonical_form() {
        let codec = DecimalCodec::new(2, None).unwrap();
        let values: Vec<Value> = ["20.0", "20.00", "20.000"]
            .iter()
            .map(|text| codec.deserialize(text).unwrap())
            .collect();
        assert!(values.windows(2).all(|w| w[0] == w[1]));
        let Value::Decimal64(decimal) = &values[2] else {
            panic!("expected decimal64");
        };
        assert_eq!(decimal.scale(), 2);
        assert_eq!(decimal.unscaled_value(), 2000);
        for value in &values {
            assert_eq!(codec.serialize(value).unwrap(), "20.0");
        }
    }

    #[test]
    fn test_rounding_rejected() {
        assert!(ranged().deserialize("100.001").is_err());
    }

    #[test]
    fn test_range_violation_message() {
        let err = ranged().deserialize("9.99").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Value '9.99' is not in required ranges [[10.0..100.0]]"
        );
        let payload = err.invalid_value().unwrap();
        assert_eq!(payload.severity, ErrorSeverity::Error);
        assert_eq!(payload.error_type, ErrorType::Application);
        assert_eq!(payload.error_tag, "invalid-value");
    }

    #[test]
    fn test_serialize_rescales_to_declared_digits() {
        let codec = DecimalCodec::new(2, None).unwrap();
        let coarse = Value::Decimal64(Decimal64::new(205, 1).unwrap());
        assert_eq!(codec.serialize(&coarse).unwrap(), "20.5");
        let fine = Value::Decimal64(Decimal64::new(20501, 3).unwrap());
        assert!(codec.serialize(&fine).is_err());
    }

    #[test]
    fn test_invalid_fraction_digits() {
        assert!(DecimalCodec::new(0, None).is_err());
        assert!(DecimalCodec::new(19, None).is_err());
    }
}
