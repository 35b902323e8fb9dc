//! Storage slot addressing.
//!
//! A [`Slot`] is a derivation tree; [`slot_address`] folds it into the
//! 32-byte key the EVM uses, and [`equal_slots`] compares two derivations
//! structurally.

use alloy_primitives::{B256, U256};

use crate::encode::encode_mapping_key;
use crate::error::CodecError;
use crate::pointer::Slot;

/// Compute the numeric address of a slot.
///
/// Offsets are added after hashing and wrap modulo 2^256, like the EVM.
pub fn slot_address(slot: &Slot) -> Result<B256, CodecError> {
    let base = match (&slot.key, &slot.path) {
        (Some(key), Some(path)) => {
            let encoded = encode_mapping_key(key)?;
            let parent = slot_address(path)?;
            word_to_u256(crate::conversion::keccak256(&[encoded.as_slice(), parent.as_slice()]))
        }
        (Some(key), None) => {
            let encoded = encode_mapping_key(key)?;
            word_to_u256(crate::conversion::keccak256(&[encoded.as_slice(), B256::ZERO.as_slice()]))
        }
        (None, Some(path)) if slot.hash_path => {
            let parent = slot_address(path)?;
            word_to_u256(crate::conversion::keccak256(&[parent.as_slice()]))
        }
        (None, Some(path)) => word_to_u256(slot_address(path)?),
        (None, None) => U256::ZERO,
    };
    Ok(B256::from(base.wrapping_add(slot.offset).to_be_bytes::<32>()))
}

/// Structural slot equality: offsets, `hash_path` flags and paths must
/// match, and keys must encode to the same bytes.
///
/// Keys of different types that encode identically compare equal
/// (e.g. `uint256(1)` and `int256(1)`); callers rely on this when they match
/// user-supplied keys against a mapping.
pub fn equal_slots(a: &Slot, b: &Slot) -> bool {
    if a.offset != b.offset || a.hash_path != b.hash_path {
        return false;
    }
    let paths_equal = match (&a.path, &b.path) {
        (Some(pa), Some(pb)) => equal_slots(pa, pb),
        (None, None) => true,
        _ => false,
    };
    if !paths_equal {
        return false;
    }
    match (&a.key, &b.key) {
        (Some(ka), Some(kb)) => match (encode_mapping_key(ka), encode_mapping_key(kb)) {
            (Ok(ea), Ok(eb)) => ea == eb,
            _ => false,
        },
        (None, None) => true,
        _ => false,
    }
}

fn word_to_u256(word: B256) -> U256 {
    U256::from_be_bytes(word.0)
}
