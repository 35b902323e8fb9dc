//! Byte and numeric conversions shared by the decoder and the encoder.
//!
//! Everything here works on big-endian byte strings no longer than one EVM
//! word. Numbers are `alloy_primitives` 256-bit integers.

use alloy_primitives::{B256, I256, U256};
use tiny_keccak::{Hasher, Keccak};

use crate::error::CodecError;

/// Size of an EVM word in bytes.
pub const WORD_SIZE: usize = 32;
/// Size of an address in bytes.
pub const ADDRESS_SIZE: usize = 20;
/// Size of a function selector in bytes.
pub const SELECTOR_SIZE: usize = 4;
/// Size of one program counter inside an internal function pointer.
pub const PC_SIZE: usize = 4;

/// Compute keccak256 over the concatenation of `parts`.
pub fn keccak256(parts: &[&[u8]]) -> B256 {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize(&mut output);
    B256::from(output)
}

/// Left-pad `bytes` with zeros to `length`. Longer input keeps its low-order
/// `length` bytes.
pub fn pad_left(bytes: &[u8], length: usize) -> Vec<u8> {
    if bytes.len() >= length {
        return bytes[bytes.len() - length..].to_vec();
    }
    let mut out = vec![0u8; length - bytes.len()];
    out.extend_from_slice(bytes);
    out
}

/// Right-pad `bytes` with zeros to `length`. Longer input keeps its leading
/// `length` bytes.
pub fn pad_right(bytes: &[u8], length: usize) -> Vec<u8> {
    let mut out = bytes[..bytes.len().min(length)].to_vec();
    out.resize(length, 0);
    out
}

/// Place `bytes` at the low-order end of a word.
pub fn left_pad_word(bytes: &[u8]) -> B256 {
    B256::from_slice(&pad_left(bytes, WORD_SIZE))
}

/// Place `bytes` at the start of a word.
pub fn right_pad_word(bytes: &[u8]) -> B256 {
    B256::from_slice(&pad_right(bytes, WORD_SIZE))
}

/// Interpret up to 32 big-endian bytes as an unsigned integer.
pub fn to_u256(bytes: &[u8]) -> U256 {
    U256::from_be_slice(&pad_left(bytes, WORD_SIZE))
}

/// Interpret up to 32 big-endian bytes as a two's-complement signed integer,
/// sign-extending from the width of the input.
pub fn to_i256(bytes: &[u8]) -> I256 {
    let negative = bytes.first().is_some_and(|b| b & 0x80 != 0);
    let fill = if negative { 0xff } else { 0x00 };
    let mut word = [fill; WORD_SIZE];
    let take = bytes.len().min(WORD_SIZE);
    word[WORD_SIZE - take..].copy_from_slice(&bytes[bytes.len() - take..]);
    I256::from_raw(U256::from_be_bytes(word))
}

/// Convert an unsigned integer into exactly `length` big-endian bytes.
pub fn u256_to_bytes(value: U256, length: usize) -> Result<Vec<u8>, CodecError> {
    let word: [u8; WORD_SIZE] = value.to_be_bytes();
    let cut = WORD_SIZE - length.min(WORD_SIZE);
    if word[..cut].iter().any(|b| *b != 0) {
        return Err(CodecError::OutOfRange {
            value: value.to_string(),
            bits: length * 8,
        });
    }
    Ok(pad_left(&word[cut..], length))
}

/// Convert a signed integer into exactly `length` two's-complement bytes.
pub fn i256_to_bytes(value: I256, length: usize) -> Result<Vec<u8>, CodecError> {
    let word: [u8; WORD_SIZE] = value.into_raw().to_be_bytes();
    let cut = WORD_SIZE - length.min(WORD_SIZE);
    let fill = if value.is_negative() { 0xff } else { 0x00 };
    let fits = word[..cut].iter().all(|b| *b == fill)
        && (cut == 0 || (word[cut] & 0x80 != 0) == value.is_negative());
    if !fits {
        return Err(CodecError::OutOfRange {
            value: value.to_string(),
            bits: length * 8,
        });
    }
    Ok(word[cut..].to_vec())
}

/// Narrow a word-sized unsigned value to `u64`, if it fits.
pub fn to_u64(value: U256) -> Option<u64> {
    u64::try_from(value).ok()
}

/// Lower-case hex without a prefix.
pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Parse hex with or without a `0x` prefix.
pub fn from_hex(s: &str) -> Result<Vec<u8>, CodecError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(digits).map_err(|e| CodecError::InvalidHex {
        input: s.to_string(),
        reason: e.to_string(),
    })
}

/// Smallest number of bytes able to hold `count` distinct values (at least 1).
pub fn bytes_for_count(count: usize) -> usize {
    let mut bytes = 1;
    let mut capacity: u128 = 256;
    while (count as u128) > capacity {
        bytes += 1;
        capacity = capacity.saturating_mul(256);
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keccak_of_empty_input() {
        assert_eq!(
            hex::encode(keccak256(&[])),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn padding_directions() {
        assert_eq!(pad_left(&[0xab], 3), vec![0, 0, 0xab]);
        assert_eq!(pad_right(&[0xab], 3), vec![0xab, 0, 0]);
        assert_eq!(left_pad_word(&[1])[31], 1);
        assert_eq!(right_pad_word(&[1])[0], 1);
    }

    #[test]
    fn sign_extension_follows_input_width() {
        assert_eq!(to_i256(&[0xff]), I256::MINUS_ONE);
        assert_eq!(to_i256(&[0x00, 0xff]), I256::try_from(255i64).unwrap());
        assert_eq!(to_u256(&[0xff]), U256::from(255));
    }

    #[test]
    fn narrowing_checks_range() {
        assert_eq!(u256_to_bytes(U256::from(255), 1).unwrap(), vec![0xff]);
        assert!(u256_to_bytes(U256::from(256), 1).is_err());
        assert_eq!(i256_to_bytes(I256::MINUS_ONE, 1).unwrap(), vec![0xff]);
        assert_eq!(i256_to_bytes(I256::try_from(-128i64).unwrap(), 1).unwrap(), vec![0x80]);
        assert!(i256_to_bytes(I256::try_from(128i64).unwrap(), 1).is_err());
        assert!(i256_to_bytes(I256::try_from(-129i64).unwrap(), 1).is_err());
    }

    #[test]
    fn enum_widths() {
        assert_eq!(bytes_for_count(3), 1);
        assert_eq!(bytes_for_count(256), 1);
        assert_eq!(bytes_for_count(257), 2);
    }
}
