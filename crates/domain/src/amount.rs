//! Exact fixed-point handling for ledger amounts.
//!
//! Raw ledger units are integers on the order of 10^29 and above, far beyond
//! what an `f64` can represent exactly. The whole supply fits in a `u128`, so
//! every amount stays an integer and is only rendered as a decimal at the
//! edges.

use std::fmt;

use thiserror::Error;

/// Number of decimal places between one raw unit and one NANO.
pub const NANO_DECIMALS: u32 = 30;

/// A non-negative amount in raw ledger units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RawAmount(u128);

impl RawAmount {
    pub const ZERO: RawAmount = RawAmount(0);

    pub const fn new(raw: u128) -> Self {
        Self(raw)
    }

    /// Parses the stringified integer the node sends on the wire.
    pub fn parse(value: &str) -> Result<Self, AmountError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(AmountError::Empty);
        }
        let mut raw: u128 = 0;
        for ch in trimmed.chars() {
            let digit = ch.to_digit(10).ok_or(AmountError::InvalidDigit(ch))?;
            raw = raw
                .checked_mul(10)
                .and_then(|acc| acc.checked_add(u128::from(digit)))
                .ok_or(AmountError::Overflow)?;
        }
        Ok(Self(raw))
    }

    /// Parses a whole-NANO decimal such as `"0.0000001"`.
    pub fn from_nano_str(value: &str) -> Result<Self, AmountError> {
        parse_units(value, NANO_DECIMALS)
    }

    pub const fn get(self) -> u128 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn saturating_add(self, other: RawAmount) -> RawAmount {
        RawAmount(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: RawAmount) -> RawAmount {
        RawAmount(self.0.saturating_sub(other.0))
    }

    pub fn to_nano_string(self) -> String {
        format_units(self.0, NANO_DECIMALS)
    }
}

impl fmt::Display for RawAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_nano_string())
    }
}

/// Renders `raw / 10^decimals` positionally, without exponent notation and
/// without trailing fractional zeros.
pub fn format_units(raw: u128, decimals: u32) -> String {
    if decimals == 0 {
        return raw.to_string();
    }
    let digits = raw.to_string();
    let width = decimals as usize;
    let (whole, fraction) = if digits.len() > width {
        let split = digits.len() - width;
        (digits[..split].to_string(), digits[split..].to_string())
    } else {
        ("0".to_string(), format!("{digits:0>width$}"))
    };
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole
    } else {
        format!("{whole}.{fraction}")
    }
}

/// Inverse of [`format_units`] for operator-supplied decimals.
pub fn parse_units(value: &str, decimals: u32) -> Result<RawAmount, AmountError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AmountError::Empty);
    }
    let (whole, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));
    if fraction.len() > decimals as usize {
        return Err(AmountError::TooManyDecimals { max: decimals });
    }
    let whole = if whole.is_empty() { "0" } else { whole };
    let padded = format!("{whole}{fraction:0<width$}", width = decimals as usize);
    RawAmount::parse(&padded)
}

/// Returns `true` when `amount` is positive and reaches `min`.
pub fn is_above_threshold(amount: RawAmount, min: RawAmount) -> bool {
    !amount.is_zero() && amount >= min
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("invalid character `{0}` in amount")]
    InvalidDigit(char),
    #[error("amount has more than {max} decimal places")]
    TooManyDecimals { max: u32 },
    #[error("amount does not fit in 128 bits")]
    Overflow,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_NANO: u128 = 1_000_000_000_000_000_000_000_000_000_000;

    #[test]
    fn formats_whole_amounts_without_a_dot() {
        assert_eq!(RawAmount::new(2 * ONE_NANO).to_nano_string(), "2");
        assert_eq!(RawAmount::ZERO.to_nano_string(), "0");
    }

    #[test]
    fn formats_fractions_exactly() {
        assert_eq!(
            RawAmount::new(1).to_nano_string(),
            "0.000000000000000000000000000001"
        );
        assert_eq!(
            RawAmount::new(123_456_789_000_000_000_000_000_000_000_000).to_nano_string(),
            "123.456789"
        );
        assert_eq!(format_units(1_050, 3), "1.05");
        assert_eq!(format_units(42, 0), "42");
    }

    #[test]
    fn keeps_precision_past_f64() {
        let raw = RawAmount::parse("123456789012345678901234567890123").unwrap();
        assert_eq!(raw.to_nano_string(), "123.456789012345678901234567890123");
    }

    #[test]
    fn rejects_malformed_raw_amounts() {
        assert_eq!(RawAmount::parse(""), Err(AmountError::Empty));
        assert_eq!(RawAmount::parse("12a"), Err(AmountError::InvalidDigit('a')));
        assert_eq!(RawAmount::parse("-5"), Err(AmountError::InvalidDigit('-')));
        assert_eq!(
            RawAmount::parse(&"9".repeat(40)),
            Err(AmountError::Overflow)
        );
    }

    #[test]
    fn parses_decimal_thresholds() {
        assert_eq!(
            RawAmount::from_nano_str("0.0000001").unwrap(),
            RawAmount::new(100_000_000_000_000_000_000_000)
        );
        assert_eq!(
            RawAmount::from_nano_str("2").unwrap(),
            RawAmount::new(2 * ONE_NANO)
        );
        assert_eq!(
            RawAmount::from_nano_str(".5").unwrap(),
            RawAmount::new(ONE_NANO / 2)
        );
        assert_eq!(
            parse_units("1.0001", 3),
            Err(AmountError::TooManyDecimals { max: 3 })
        );
    }

    #[test]
    fn threshold_excludes_zero() {
        let min = RawAmount::from_nano_str("0.0000001").unwrap();
        assert!(!is_above_threshold(RawAmount::ZERO, min));
        assert!(!is_above_threshold(RawAmount::ZERO, RawAmount::ZERO));
        assert!(is_above_threshold(min, min));
        assert!(!is_above_threshold(RawAmount::new(min.get() - 1), min));
    }
}
