//! Word encoder, the inverse of basic (single-word) decoding.
//!
//! Produces the canonical ABI word for a value of a basic type: numbers
//! left-padded (signed ones sign-extended), static bytes and external
//! functions right-padded.
//!
//! # Usage
//! ```ignore
//! let word = encode_basic(&Type::uint(8), &Value::Uint(U256::from(7)))?;
//! assert_eq!(word[31], 7);
//! ```

use alloy_primitives::{B256, U256};

use crate::conversion::{
    i256_to_bytes, left_pad_word, right_pad_word, u256_to_bytes, ADDRESS_SIZE, PC_SIZE,
    SELECTOR_SIZE, WORD_SIZE,
};
use crate::error::CodecError;
use crate::types::{FunctionVisibility, Type};
use crate::value::{FixedValue, UfixedValue, Value};

/// Encode a basic-type value into one word.
pub fn encode_basic(ty: &Type, value: &Value) -> Result<B256, CodecError> {
    match (ty, value) {
        (Type::Uint { bits }, Value::Uint(u)) => {
            let bytes = u256_to_bytes(*u, byte_width(*bits))?;
            Ok(left_pad_word(&bytes))
        }

        (Type::Int { bits }, Value::Int(i)) => {
            i256_to_bytes(*i, byte_width(*bits))?;
            Ok(B256::from(i.into_raw().to_be_bytes::<WORD_SIZE>()))
        }

        (Type::Bool, Value::Bool(b)) => Ok(left_pad_word(&[u8::from(*b)])),

        (Type::Address { .. }, Value::Address(a)) | (Type::Contract { .. }, Value::Address(a)) => {
            Ok(left_pad_word(a.as_slice()))
        }
        (Type::Address { .. }, Value::Contract(c)) | (Type::Contract { .. }, Value::Contract(c)) => {
            Ok(left_pad_word(c.address().as_slice()))
        }

        (Type::FixedBytes { length }, Value::FixedBytes(b)) => {
            if b.len() > usize::from(*length) {
                return Err(CodecError::OutOfRange {
                    value: format!("0x{}", hex::encode(b)),
                    bits: usize::from(*length) * 8,
                });
            }
            Ok(right_pad_word(b))
        }

        (Type::Fixed { bits, places }, Value::Fixed(v)) => {
            let v = rescaled(v, *places)?;
            i256_to_bytes(v.raw, byte_width(*bits))?;
            Ok(B256::from(v.raw.into_raw().to_be_bytes::<WORD_SIZE>()))
        }
        (Type::Ufixed { bits, places }, Value::Ufixed(v)) => {
            let v = rescaled_unsigned(v, *places)?;
            let bytes = u256_to_bytes(v.raw, byte_width(*bits))?;
            Ok(left_pad_word(&bytes))
        }

        (Type::Enum { .. }, Value::Enum(e)) => Ok(left_pad_word(&e.index.to_be_bytes())),

        (
            Type::Function {
                visibility: FunctionVisibility::External,
                ..
            },
            Value::ExternalFunction {
                contract, selector, ..
            },
        ) => {
            let mut bytes = Vec::with_capacity(ADDRESS_SIZE + SELECTOR_SIZE);
            bytes.extend_from_slice(contract.address().as_slice());
            bytes.extend_from_slice(selector.as_slice());
            Ok(right_pad_word(&bytes))
        }

        (
            Type::Function {
                visibility: FunctionVisibility::Internal,
                ..
            },
            Value::InternalFunction {
                deployed_pc,
                constructor_pc,
            },
        ) => {
            let mut bytes = Vec::with_capacity(2 * PC_SIZE);
            bytes.extend_from_slice(&constructor_pc.to_be_bytes());
            bytes.extend_from_slice(&deployed_pc.to_be_bytes());
            Ok(left_pad_word(&bytes))
        }

        (ty, _) if !ty.is_basic() => Err(CodecError::Unsupported {
            ty: ty.to_string(),
            reason: "only single-word types have a word encoding".into(),
        }),

        (ty, value) => Err(CodecError::TypeMismatch {
            expected: ty.to_string(),
            got: value_kind(value).to_string(),
        }),
    }
}

/// Encode raw `bytes`/`string` contents (no length prefix, no padding).
pub fn encode_bytes(value: &Value) -> Result<Vec<u8>, CodecError> {
    match value {
        Value::Bytes(b) => Ok(b.to_vec()),
        Value::String(s) => s.to_bytes(),
        other => Err(CodecError::TypeMismatch {
            expected: "bytes or string".into(),
            got: value_kind(other).to_string(),
        }),
    }
}

/// Encode a mapping key the way Solidity hashes it: value types as their
/// padded word, `bytes`/`string` as their raw contents.
pub fn encode_mapping_key(key: &Value) -> Result<Vec<u8>, CodecError> {
    let word = match key {
        Value::Uint(u) => B256::from(u.to_be_bytes::<WORD_SIZE>()),
        Value::Int(i) => B256::from(i.into_raw().to_be_bytes::<WORD_SIZE>()),
        Value::Bool(b) => left_pad_word(&[u8::from(*b)]),
        Value::Address(a) => left_pad_word(a.as_slice()),
        Value::Contract(c) => left_pad_word(c.address().as_slice()),
        Value::FixedBytes(b) => right_pad_word(b),
        Value::Enum(e) => left_pad_word(&e.index.to_be_bytes()),
        Value::Fixed(f) => B256::from(f.raw.into_raw().to_be_bytes::<WORD_SIZE>()),
        Value::Ufixed(f) => B256::from(f.raw.to_be_bytes::<WORD_SIZE>()),
        Value::Bytes(_) | Value::String(_) => return encode_bytes(key),
        other => {
            return Err(CodecError::Unsupported {
                ty: value_kind(other).to_string(),
                reason: "not a valid mapping key".into(),
            })
        }
    };
    Ok(word.to_vec())
}

fn byte_width(bits: u16) -> usize {
    (usize::from(bits) / 8).clamp(1, WORD_SIZE)
}

/// The factor taking `from` decimals to `places`; only exact rescaling
/// (adding zeros) is allowed. `None` when it does not fit in 256 bits.
fn scale_factor(from: u8, places: u8) -> Result<Option<U256>, CodecError> {
    if from > places {
        return Err(CodecError::TypeMismatch {
            expected: format!("at most {places} decimal places"),
            got: format!("{from} decimal places"),
        });
    }
    Ok(U256::from(10u64).checked_pow(U256::from(places - from)))
}

fn rescaled(v: &FixedValue, places: u8) -> Result<FixedValue, CodecError> {
    let out_of_range = || CodecError::OutOfRange {
        value: v.to_string(),
        bits: 256,
    };
    let raw = scale_factor(v.places, places)?
        .and_then(|factor| alloy_primitives::I256::try_from(factor).ok())
        .and_then(|factor| v.raw.checked_mul(factor))
        .ok_or_else(out_of_range)?;
    Ok(FixedValue { raw, places })
}

fn rescaled_unsigned(v: &UfixedValue, places: u8) -> Result<UfixedValue, CodecError> {
    let raw = scale_factor(v.places, places)?
        .and_then(|factor| v.raw.checked_mul(factor))
        .ok_or_else(|| CodecError::OutOfRange {
            value: v.to_string(),
            bits: 256,
        })?;
    Ok(UfixedValue { raw, places })
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Uint(_) => "uint",
        Value::Int(_) => "int",
        Value::Bool(_) => "bool",
        Value::Address(_) => "address",
        Value::Contract(_) => "contract",
        Value::FixedBytes(_) => "fixed bytes",
        Value::Bytes(_) => "bytes",
        Value::String(_) => "string",
        Value::Fixed(_) => "fixed",
        Value::Ufixed(_) => "ufixed",
        Value::Enum(_) => "enum",
        Value::Array(_) => "array",
        Value::Struct(_) => "struct",
        Value::Mapping(_) => "mapping",
        Value::ExternalFunction { .. } => "external function",
        Value::InternalFunction { .. } => "internal function",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{ContractValue, EnumValue, FunctionInfo};
    use alloy_dyn_abi::DynSolValue;
    use alloy_primitives::{Address, Bytes, FixedBytes, I256};

    const ADDR: &str = "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045";

    #[test]
    fn uint_is_left_padded() {
        let word = encode_basic(&Type::uint(32), &Value::Uint(U256::from(0xdeadbeefu64))).unwrap();
        assert_eq!(
            hex::encode(word),
            "00000000000000000000000000000000000000000000000000000000deadbeef"
        );
    }

    #[test]
    fn uint_out_of_range_is_rejected() {
        let err = encode_basic(&Type::uint(8), &Value::Uint(U256::from(256))).unwrap_err();
        assert!(matches!(err, CodecError::OutOfRange { bits: 8, .. }));
    }

    #[test]
    fn negative_int_is_sign_extended() {
        let word = encode_basic(&Type::int(8), &Value::Int(I256::MINUS_ONE)).unwrap();
        assert!(word.iter().all(|b| *b == 0xff));
    }

    #[test]
    fn bool_is_exactly_zero_or_one() {
        let t = encode_basic(&Type::Bool, &Value::Bool(true)).unwrap();
        let f = encode_basic(&Type::Bool, &Value::Bool(false)).unwrap();
        assert_eq!(t, left_pad_word(&[1]));
        assert_eq!(f, B256::ZERO);
    }

    #[test]
    fn static_bytes_are_right_padded() {
        let word = encode_basic(
            &Type::fixed_bytes(4),
            &Value::FixedBytes(Bytes::from(vec![0xde, 0xad, 0xbe, 0xef])),
        )
        .unwrap();
        assert_eq!(&word[..4], &[0xde, 0xad, 0xbe, 0xef]);
        assert!(word[4..].iter().all(|b| *b == 0));
    }

    #[test]
    fn external_function_layout() {
        let address: Address = ADDR.parse().unwrap();
        let word = encode_basic(
            &Type::external_function(),
            &Value::ExternalFunction {
                contract: ContractValue::Unknown { address },
                selector: FixedBytes::from([0xa9, 0x05, 0x9c, 0xbb]),
                info: FunctionInfo::Unknown,
            },
        )
        .unwrap();
        assert_eq!(&word[..20], address.as_slice());
        assert_eq!(&word[20..24], &[0xa9, 0x05, 0x9c, 0xbb]);
        assert!(word[24..].iter().all(|b| *b == 0));
    }

    #[test]
    fn fixed_point_is_scaled() {
        let value = Value::Fixed(FixedValue::from_decimal_str("1.5", 1).unwrap());
        let word = encode_basic(&Type::Fixed { bits: 128, places: 1 }, &value).unwrap();
        assert_eq!(word[31], 15);
        let wider = encode_basic(&Type::Fixed { bits: 128, places: 3 }, &value).unwrap();
        assert_eq!(crate::conversion::to_u256(wider.as_slice()), U256::from(1500));
    }

    #[test]
    fn unsigned_fixed_point_keeps_the_top_bit() {
        let top = Value::Ufixed(UfixedValue {
            raw: U256::MAX,
            places: 18,
        });
        let word = encode_basic(&Type::Ufixed { bits: 256, places: 18 }, &top).unwrap();
        assert_eq!(word, B256::repeat_byte(0xff));
        // Rescaling the same value would need more than 256 bits.
        assert!(matches!(
            encode_basic(&Type::Ufixed { bits: 256, places: 19 }, &top),
            Err(CodecError::OutOfRange { .. })
        ));
        // A signed value is not an unsigned one.
        let signed = Value::Fixed(FixedValue::from_decimal_str("1", 0).unwrap());
        assert!(encode_basic(&Type::Ufixed { bits: 8, places: 0 }, &signed).is_err());
    }

    #[test]
    fn matches_independent_abi_encoder() {
        let address: Address = ADDR.parse().unwrap();
        let cases = vec![
            (
                Type::uint(256),
                Value::Uint(U256::from(1_000_000u64)),
                DynSolValue::Uint(U256::from(1_000_000u64), 256),
            ),
            (
                Type::int(64),
                Value::Int(I256::try_from(-42i64).unwrap()),
                DynSolValue::Int(I256::try_from(-42i64).unwrap(), 64),
            ),
            (Type::address(), Value::Address(address), DynSolValue::Address(address)),
            (Type::Bool, Value::Bool(true), DynSolValue::Bool(true)),
            (
                Type::fixed_bytes(2),
                Value::FixedBytes(Bytes::from(vec![0x12, 0x34])),
                DynSolValue::FixedBytes(alloy_primitives::B256::right_padding_from(&[0x12, 0x34]), 2),
            ),
        ];
        for (ty, value, reference) in cases {
            let ours = encode_basic(&ty, &value).unwrap();
            assert_eq!(ours.to_vec(), reference.abi_encode(), "mismatch for {ty}");
        }
    }

    #[test]
    fn composite_types_have_no_word_encoding() {
        let err = encode_basic(&Type::string(), &Value::string("x")).unwrap_err();
        assert!(matches!(err, CodecError::Unsupported { .. }));
    }

    #[test]
    fn mapping_keys() {
        assert_eq!(encode_mapping_key(&Value::string("ab")).unwrap(), b"ab".to_vec());
        assert_eq!(
            encode_mapping_key(&Value::Enum(EnumValue {
                index: 2,
                name: "C".into()
            }))
            .unwrap(),
            left_pad_word(&[2]).to_vec()
        );
        assert!(encode_mapping_key(&Value::Array(vec![])).is_err());
    }
}
