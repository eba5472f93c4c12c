//! Minimal ABI encoding for the ERC-20 call surface.

use num_bigint::BigUint;
use tiny_keccak::{Hasher, Keccak};

use crate::error::DecodeError;
use crate::types::address::Address;

/// A static argument in an encoded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Address(Address),
    Uint(BigUint),
}

/// Compute the 4-byte selector from a canonical function signature.
pub fn selector(canonical: &str) -> [u8; 4] {
    let mut hasher = Keccak::v256();
    hasher.update(canonical.as_bytes());
    let mut hash = [0u8; 32];
    hasher.finalize(&mut hash);
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Encode calldata: selector followed by one 32-byte head word per argument.
pub fn encode_call(canonical: &str, args: &[Token]) -> Vec<u8> {
    let mut calldata = Vec::with_capacity(4 + 32 * args.len());
    calldata.extend_from_slice(&selector(canonical));
    for arg in args {
        match arg {
            Token::Address(addr) => calldata.extend_from_slice(&addr.to_word()),
            Token::Uint(value) => calldata.extend_from_slice(&uint_word(value)),
        }
    }
    calldata
}

fn uint_word(value: &BigUint) -> [u8; 32] {
    let bytes = value.to_bytes_be();
    let mut word = [0u8; 32];
    let copy_len = bytes.len().min(32);
    word[32 - copy_len..].copy_from_slice(&bytes[bytes.len() - copy_len..]);
    word
}

/// `0x`-prefixed hex for JSON-RPC payloads.
pub fn to_hex_data(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode `0x`-prefixed hex returned by the provider.
pub fn from_hex_data(data: &str) -> Result<Vec<u8>, DecodeError> {
    let digits = data.strip_prefix("0x").unwrap_or(data);
    if digits.len() % 2 == 1 {
        let padded = format!("0{digits}");
        return hex::decode(padded).map_err(|e| DecodeError::InvalidHex(e.to_string()));
    }
    hex::decode(digits).map_err(|e| DecodeError::InvalidHex(e.to_string()))
}

/// Decode a single `uint256` return value.
pub fn decode_uint(data: &[u8]) -> Result<BigUint, DecodeError> {
    let word = first_word(data)?;
    Ok(BigUint::from_bytes_be(word))
}

/// Decode a `uint8` return value, rejecting words that do not fit.
pub fn decode_u8(data: &[u8]) -> Result<u8, DecodeError> {
    let word = first_word(data)?;
    if word[..31].iter().any(|b| *b != 0) {
        return Err(DecodeError::OutOfRange("uint8"));
    }
    Ok(word[31])
}

/// Decode a `string` return value.
///
/// Some early tokens return `bytes32` for `name()`/`symbol()`; a bare
/// 32-byte response is read as a NUL-padded string.
pub fn decode_string(data: &[u8]) -> Result<String, DecodeError> {
    if data.len() == 32 {
        let end = data.iter().position(|b| *b == 0).unwrap_or(32);
        return std::str::from_utf8(&data[..end])
            .map(str::to_string)
            .map_err(|e| DecodeError::InvalidUtf8(e.to_string()));
    }

    let offset = read_usize(data, 0)?;
    let len = read_usize(data, offset)?;
    let start = offset + 32;
    ensure_bytes(data, start, len)?;
    std::str::from_utf8(&data[start..start + len])
        .map(str::to_string)
        .map_err(|e| DecodeError::InvalidUtf8(e.to_string()))
}

fn first_word(data: &[u8]) -> Result<&[u8], DecodeError> {
    if data.is_empty() {
        return Err(DecodeError::EmptyData);
    }
    ensure_bytes(data, 0, 32)?;
    Ok(&data[..32])
}

fn read_usize(data: &[u8], offset: usize) -> Result<usize, DecodeError> {
    if data.is_empty() {
        return Err(DecodeError::EmptyData);
    }
    ensure_bytes(data, offset, 32)?;
    let word = &data[offset..offset + 32];
    if word[..24].iter().any(|b| *b != 0) {
        return Err(DecodeError::OutOfRange("offset"));
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&word[24..32]);
    usize::try_from(u64::from_be_bytes(bytes)).map_err(|_| DecodeError::OutOfRange("offset"))
}

fn ensure_bytes(data: &[u8], offset: usize, len: usize) -> Result<(), DecodeError> {
    match offset.checked_add(len) {
        Some(end) if end <= data.len() => Ok(()),
        _ => Err(DecodeError::DataTooShort {
            expected: offset.saturating_add(len),
            actual: data.len(),
        }),
    }
}
