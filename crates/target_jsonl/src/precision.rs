//! Decimal precision for numeric schema nodes.
//!
//! Taps declare decimal precision through `multipleOf` (`0.01` means two decimal places). The
//! declared value is kept as is; normalizing only respells it canonically (`0.010`, `1E-2` and
//! `10e-3` all become `0.01`). Records are checked against it with exact decimal arithmetic at
//! the precision the schema declares, never in binary floating point, so `0.29` is a multiple
//! of `0.01` and `0.03` is not a multiple of `0.05`.

use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};

/// Finest `multipleOf` a schema may declare, in decimal places.
pub const MAX_SCALE: u32 = 28;

/// Keywords whose values are instance data rather than subschemas.
const LITERAL_KEYWORDS: &[&str] = &["enum", "const", "default", "examples"];

/// Trailing zeros beyond this count cannot change divisibility by a modulus below `2^96`.
const MAX_PADDING: i64 = 96;

/// Respells every `multipleOf` in `schema` in canonical decimal form without changing its value.
///
/// Idempotent: normalizing an already normalized schema leaves it unchanged.
pub fn normalize(schema: &mut Value) {
    match schema {
        Value::Object(node) => {
            canonicalize_multiple_of(node);
            for (key, child) in node.iter_mut() {
                if !LITERAL_KEYWORDS.contains(&key.as_str()) {
                    normalize(child);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(normalize),
        _ => {}
    }
}

fn canonicalize_multiple_of(node: &mut Map<String, Value>) {
    let Some(Value::Number(step)) = node.get("multipleOf") else {
        return;
    };
    let Some(canonical) = decimal(step).and_then(|step| step.normalize().to_string().parse().ok())
    else {
        return;
    };
    node.insert("multipleOf".to_string(), Value::Number(canonical));
}

/// The exact decimal value of a JSON number, or `None` when it does not fit a [`Decimal`].
pub fn decimal(number: &Number) -> Option<Decimal> {
    DecimalText::parse(&number.to_string())?.to_decimal()
}

/// Whether `value` is an exact multiple of `step`.
///
/// Numbers too large or too long for a [`Decimal`] are checked digit by digit.
pub fn is_multiple_of(value: &Number, step: Decimal) -> bool {
    if let Some(rem) = decimal(value).and_then(|value| value.checked_rem(step)) {
        return rem.is_zero();
    }
    DecimalText::parse(&value.to_string()).is_some_and(|value| value.is_multiple_of(step))
}

/// A JSON number's text as `digits * 10^-scale`, without leading or trailing zeros.
#[derive(Debug, PartialEq, Eq)]
struct DecimalText {
    negative: bool,
    digits: String,
    scale: i64,
}

impl DecimalText {
    fn parse(text: &str) -> Option<Self> {
        let (negative, text) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let (mantissa, exponent) = match text.split_once(['e', 'E']) {
            Some((mantissa, exponent)) => (mantissa, exponent.parse::<i64>().ok()?),
            None => (text, 0),
        };
        let (integer, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        if !integer.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
            return None;
        }

        let all_digits = format!("{integer}{fraction}");
        let significant = all_digits.trim_start_matches('0');
        let digits = significant.trim_end_matches('0');
        let trimmed = i64::try_from(significant.len() - digits.len()).ok()?;
        let fraction_len = i64::try_from(fraction.len()).ok()?;
        Some(Self {
            negative,
            digits: digits.to_string(),
            scale: fraction_len - exponent - trimmed,
        })
    }

    fn to_decimal(&self) -> Option<Decimal> {
        if self.digits.is_empty() {
            return Some(Decimal::ZERO);
        }
        let (digits, scale) = if self.scale < 0 {
            let zeros = usize::try_from(-self.scale).ok().filter(|zeros| *zeros <= 29)?;
            (format!("{}{}", self.digits, "0".repeat(zeros)), 0)
        } else {
            (self.digits.clone(), u32::try_from(self.scale).ok()?)
        };
        let mantissa: i128 = digits.parse().ok()?;
        let mantissa = if self.negative { -mantissa } else { mantissa };
        Decimal::try_from_i128_with_scale(mantissa, scale).ok()
    }

    /// Long division of the digits, padded to the step's scale, by the step's mantissa.
    fn is_multiple_of(&self, step: Decimal) -> bool {
        if self.digits.is_empty() {
            return true;
        }
        let step = step.normalize();
        let step_scale = i64::from(step.scale());
        if self.scale > step_scale {
            return false;
        }
        let modulus = step.mantissa().unsigned_abs();
        if modulus == 0 {
            return false;
        }

        let padding = (step_scale - self.scale).min(MAX_PADDING);
        let zeros = std::iter::repeat(0).take(usize::try_from(padding).unwrap_or(0));
        let digits = self.digits.bytes().map(|b| u128::from(b - b'0'));
        let rem = digits
            .chain(zeros)
            .fold(0u128, |rem, digit| (rem * 10 + digit) % modulus);
        rem == 0
    }
}
