use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tiny_keccak::{Hasher, Keccak};

use crate::error::CallError;

/// A 20-byte EVM account or contract address.
///
/// Displays as lowercase `0x`-prefixed hex, the form the session stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// Parse a `0x`-prefixed hex address.
    ///
    /// All-lowercase and all-uppercase inputs are accepted as-is; mixed-case
    /// input must carry a valid EIP-55 checksum.
    pub fn parse(input: &str) -> Result<Self, CallError> {
        let trimmed = input.trim();
        let hex_part = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| invalid(input, "missing 0x prefix"))?;

        if hex_part.len() != 40 {
            return Err(invalid(input, "expected 40 hex digits"));
        }

        let mut bytes = [0u8; 20];
        hex::decode_to_slice(hex_part, &mut bytes).map_err(|_| invalid(input, "not hex"))?;
        let address = Self(bytes);

        let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
        if has_lower && has_upper && address.to_checksum()[2..] != *hex_part {
            return Err(invalid(input, "bad address checksum"));
        }

        Ok(address)
    }

    /// EIP-55 mixed-case checksum encoding.
    pub fn to_checksum(&self) -> String {
        let hex_addr = hex::encode(self.0);
        let mut hasher = Keccak::v256();
        hasher.update(hex_addr.as_bytes());
        let mut hash = [0u8; 32];
        hasher.finalize(&mut hash);

        let mut result = String::with_capacity(42);
        result.push_str("0x");
        for (i, c) in hex_addr.chars().enumerate() {
            let nibble = if i % 2 == 0 {
                hash[i / 2] >> 4
            } else {
                hash[i / 2] & 0x0f
            };
            if nibble >= 8 {
                result.push(c.to_ascii_uppercase());
            } else {
                result.push(c);
            }
        }
        result
    }

    /// Abbreviated `0x1234...5678` form for compact display.
    pub fn short(&self) -> String {
        let full = self.to_string();
        format!("{}...{}", &full[..6], &full[38..])
    }

    /// The address left-padded into a 32-byte ABI word.
    pub fn to_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&self.0);
        word
    }
}

fn invalid(input: &str, reason: &str) -> CallError {
    CallError::InvalidArgument(format!("invalid address {input:?}: {reason}"))
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = CallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eip55_checksum() {
        let addr = Address::parse("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").unwrap();
        assert_eq!(addr.to_checksum(), "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed");
    }

    #[test]
    fn test_display_is_lowercase() {
        let addr = Address::parse("0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045").unwrap();
        assert_eq!(addr.to_string(), "0xd8da6bf26964af9d7eed9e03e53415d37aa96045");
    }

    #[test]
    fn test_valid_mixed_case_accepted() {
        assert!(Address::parse("0x4b34dd1d58B2915eE0414b1870C027095893F7dB").is_ok());
        assert!(Address::parse("0x1234567890AbcdEF1234567890aBcdef12345678").is_ok());
    }

    #[test]
    fn test_bad_checksum_rejected() {
        let err = Address::parse("0x1234567890ABcdEF1234567890aBcdef12345678").unwrap_err();
        assert!(matches!(err, CallError::InvalidArgument(_)));
    }

    #[test]
    fn test_uppercase_accepted() {
        assert!(Address::parse("0x00000000000000000000000000000000000000AA").is_ok());
        assert!(Address::parse("0xD8DA6BF26964AF9D7EED9E03E53415D37AA96045").is_ok());
    }

    #[test]
    fn test_malformed_rejected() {
        for input in ["", "0x", "0x1234", "d8da6bf26964af9d7eed9e03e53415d37aa96045", "0xzz00000000000000000000000000000000000000"] {
            assert!(Address::parse(input).is_err(), "{input} should fail");
        }
    }

    #[test]
    fn test_short() {
        let addr = Address::parse("0x1234567890abcdef1234567890abcdef12345678").unwrap();
        assert_eq!(addr.short(), "0x1234...5678");
    }

    #[test]
    fn test_to_word() {
        let addr = Address::parse("0x00000000000000000000000000000000000000aa").unwrap();
        let word = addr.to_word();
        assert_eq!(word[31], 0xaa);
        assert!(word[..12].iter().all(|b| *b == 0));
    }
}
