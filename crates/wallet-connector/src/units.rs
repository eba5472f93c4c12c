use num_bigint::BigUint;

use crate::error::CallError;

/// Render a raw integer amount with `decimals` fractional digits.
///
/// Trailing fractional zeros are trimmed, keeping at least one digit:
/// `1500000` at 6 decimals is `"1.5"`, `1000000` is `"1.0"`.
pub fn format_units(amount: &BigUint, decimals: u8) -> String {
    let s = amount.to_string();
    let decimals = decimals as usize;

    if decimals == 0 {
        return format!("{s}.0");
    }

    let padded = if s.len() <= decimals {
        let mut p = "0".repeat(decimals + 1 - s.len());
        p.push_str(&s);
        p
    } else {
        s
    };

    let (integer_part, fraction_part) = padded.split_at(padded.len() - decimals);
    let trimmed = fraction_part.trim_end_matches('0');
    if trimmed.is_empty() {
        format!("{integer_part}.0")
    } else {
        format!("{integer_part}.{trimmed}")
    }
}

/// [`format_units`] at 18 decimals.
pub fn format_ether(wei: &BigUint) -> String {
    format_units(wei, 18)
}

/// Convert a human-readable decimal amount into the smallest unit.
///
/// `"1.5"` at 6 decimals is `1500000`. Fractional digits beyond `decimals`
/// are rejected unless they are zeros.
pub fn parse_units(amount: &str, decimals: u8) -> Result<BigUint, CallError> {
    let s = amount.trim();
    let bad = |reason: &str| CallError::InvalidArgument(format!("invalid amount {amount:?}: {reason}"));

    if s.is_empty() {
        return Err(bad("empty"));
    }

    let (integer_part, fraction_part) = match s.split_once('.') {
        Some((i, f)) => (i, f),
        None => (s, ""),
    };

    if integer_part.is_empty() && fraction_part.is_empty() {
        return Err(bad("no digits"));
    }
    if !integer_part.chars().all(|c| c.is_ascii_digit())
        || !fraction_part.chars().all(|c| c.is_ascii_digit())
    {
        return Err(bad("not a non-negative decimal number"));
    }

    let fraction_part = fraction_part.trim_end_matches('0');
    let decimals = decimals as usize;
    if fraction_part.len() > decimals {
        return Err(bad("too many decimal places"));
    }

    let mut digits = String::with_capacity(integer_part.len() + decimals);
    digits.push_str(integer_part);
    digits.push_str(fraction_part);
    digits.extend(std::iter::repeat('0').take(decimals - fraction_part.len()));

    BigUint::parse_bytes(digits.as_bytes(), 10).ok_or_else(|| bad("not a number"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(&BigUint::from(1_000_000u64), 6), "1.0");
        assert_eq!(format_units(&BigUint::from(1_500_000u64), 6), "1.5");
        assert_eq!(format_units(&BigUint::from(500_000u64), 6), "0.5");
        assert_eq!(format_units(&BigUint::from(123u64), 6), "0.000123");
        assert_eq!(format_units(&BigUint::from(0u64), 18), "0.0");
        assert_eq!(format_units(&BigUint::from(42u64), 0), "42.0");
    }

    #[test]
    fn test_format_ether() {
        let wei = BigUint::parse_bytes(b"1234500000000000000", 10).unwrap();
        assert_eq!(format_ether(&wei), "1.2345");
    }

    #[test]
    fn test_parse_units_scenario() {
        assert_eq!(parse_units("1.5", 6).unwrap(), BigUint::from(1_500_000u64));
    }

    #[test]
    fn test_parse_units_shapes() {
        assert_eq!(parse_units("2", 6).unwrap(), BigUint::from(2_000_000u64));
        assert_eq!(parse_units(".25", 2).unwrap(), BigUint::from(25u64));
        assert_eq!(parse_units("3.", 1).unwrap(), BigUint::from(30u64));
        assert_eq!(parse_units("0.100", 1).unwrap(), BigUint::from(1u64));
        assert_eq!(
            parse_units("1", 18).unwrap(),
            BigUint::parse_bytes(b"1000000000000000000", 10).unwrap()
        );
    }

    #[test]
    fn test_parse_units_rejects() {
        for input in ["", ".", "abc", "-1", "1.2.3", "1e5", "0.0000001"] {
            assert!(parse_units(input, 6).is_err(), "{input} should fail");
        }
    }
}
