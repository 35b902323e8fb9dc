//! Single-word values.
//!
//! Storage (and constant) values sit at the low-order end of their bytes;
//! that includes static byte arrays. Everywhere else words are ABI-aligned:
//! numbers at the low-order end, static bytes and external functions at the
//! high-order end.

use alloy_primitives::{Address, FixedBytes, B256};
use evmcodec_core::conversion::{bytes_for_count, to_i256, to_u256, to_u64, ADDRESS_SIZE, WORD_SIZE};
use evmcodec_core::{
    ContractValue, DecodingError, EnumValue, FixedValue, FunctionInfo, FunctionVisibility,
    Location, Type, UfixedValue, Value,
};

use super::Decoder;
use crate::context::ContractContext;
use crate::read::Step;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Alignment {
    Packed,
    Abi,
}

impl Alignment {
    fn of(location: Location) -> Self {
        match location {
            Location::Storage | Location::Definition => Alignment::Packed,
            Location::Memory | Location::Calldata | Location::Stack | Location::StackLiteral => {
                Alignment::Abi
            }
        }
    }
}

impl<'a> Decoder<'a> {
    /// Decode a basic value from `word`, read from `location`.
    pub(crate) fn decode_basic(&mut self, ty: &Type, word: B256, location: Location) -> Step<Value> {
        let alignment = Alignment::of(location);
        let strict = self.context.config.strict_abi && alignment == Alignment::Abi;
        let raw = || hex::encode(word);

        match ty {
            Type::Uint { bits } => {
                let n = width(*bits);
                if strict && !zero_above(&word, n) {
                    return Err(DecodingError::UintPadding { raw: raw() }.into());
                }
                Ok(Value::Uint(to_u256(&word[WORD_SIZE - n..])))
            }

            Type::Int { bits } => {
                let n = width(*bits);
                if strict && !sign_extended(&word, n) {
                    return Err(DecodingError::IntPadding { raw: raw() }.into());
                }
                Ok(Value::Int(to_i256(&word[WORD_SIZE - n..])))
            }

            Type::Fixed { bits, places } => {
                let n = width(*bits);
                if strict && !sign_extended(&word, n) {
                    return Err(DecodingError::IntPadding { raw: raw() }.into());
                }
                Ok(Value::Fixed(FixedValue {
                    raw: to_i256(&word[WORD_SIZE - n..]),
                    places: *places,
                }))
            }

            Type::Ufixed { bits, places } => {
                let n = width(*bits);
                if strict && !zero_above(&word, n) {
                    return Err(DecodingError::UintPadding { raw: raw() }.into());
                }
                Ok(Value::Ufixed(UfixedValue {
                    raw: to_u256(&word[WORD_SIZE - n..]),
                    places: *places,
                }))
            }

            // Any nonzero word is true; only the upper bytes count as padding.
            Type::Bool => {
                if strict && !zero_above(&word, 1) {
                    return Err(DecodingError::BoolPadding { raw: raw() }.into());
                }
                Ok(Value::Bool(word != B256::ZERO))
            }

            Type::Address { .. } => {
                if strict && !zero_above(&word, ADDRESS_SIZE) {
                    return Err(DecodingError::AddressPadding { raw: raw() }.into());
                }
                Ok(Value::Address(Address::from_slice(&word[WORD_SIZE - ADDRESS_SIZE..])))
            }

            Type::Contract { .. } => {
                if strict && !zero_above(&word, ADDRESS_SIZE) {
                    return Err(DecodingError::AddressPadding { raw: raw() }.into());
                }
                let address = Address::from_slice(&word[WORD_SIZE - ADDRESS_SIZE..]);
                let (contract, _) = self.resolve_contract(address)?;
                Ok(Value::Contract(contract))
            }

            Type::FixedBytes { length } => {
                let n = usize::from(*length).clamp(1, WORD_SIZE);
                let bytes = match alignment {
                    Alignment::Packed => &word[WORD_SIZE - n..],
                    Alignment::Abi => {
                        if strict && !zero_below(&word, n) {
                            return Err(DecodingError::BytesPadding { raw: raw() }.into());
                        }
                        &word[..n]
                    }
                };
                Ok(Value::FixedBytes(bytes.to_vec().into()))
            }

            Type::Enum { id } => {
                let definition = self.context.types.enum_definition(*id)?;
                let n = bytes_for_count(definition.options.len());
                if strict && !zero_above(&word, n) {
                    return Err(DecodingError::UintPadding { raw: raw() }.into());
                }
                let numeric = to_u256(&word[WORD_SIZE - n..]);
                let index = to_u64(numeric)
                    .filter(|i| usize::try_from(*i).is_ok_and(|i| i < definition.options.len()))
                    .ok_or_else(|| DecodingError::EnumOutOfRange {
                        id: *id,
                        raw: numeric.to_string(),
                    })?;
                Ok(Value::Enum(EnumValue {
                    index,
                    name: definition.options[index as usize].clone(),
                }))
            }

            Type::Function {
                visibility: FunctionVisibility::External,
                ..
            } => {
                let (address, selector) = match alignment {
                    Alignment::Packed => (&word[8..28], &word[28..]),
                    Alignment::Abi => {
                        if strict && !zero_below(&word, 24) {
                            return Err(DecodingError::FunctionExternalPadding { raw: raw() }.into());
                        }
                        (&word[..20], &word[20..24])
                    }
                };
                let selector = FixedBytes::<4>::from_slice(selector);
                let (contract, known) = self.resolve_contract(Address::from_slice(address))?;
                let info = match known {
                    Some(known) => known.function_info(&selector),
                    None => FunctionInfo::Unknown,
                };
                Ok(Value::ExternalFunction {
                    contract,
                    selector,
                    info,
                })
            }

            Type::Function {
                visibility: FunctionVisibility::Internal,
                ..
            } => Ok(Value::InternalFunction {
                constructor_pc: u32::from_be_bytes([word[24], word[25], word[26], word[27]]),
                deployed_pc: u32::from_be_bytes([word[28], word[29], word[30], word[31]]),
            }),

            Type::DynamicBytes { .. }
            | Type::String { .. }
            | Type::Array { .. }
            | Type::Struct { .. }
            | Type::Mapping { .. } => Err(DecodingError::UnsupportedLocation {
                ty: ty.to_string(),
                location,
            }
            .into()),
        }
    }

    /// Identify the contract at `address` by its code, when configured to.
    fn resolve_contract(&self, address: Address) -> Step<(ContractValue, Option<&'a ContractContext>)> {
        if !self.context.config.resolve_code {
            return Ok((ContractValue::Unknown { address }, None));
        }
        let code = self.reader.code(address)?;
        Ok(match self.context.contract_for_code(&code) {
            Some(known) => (
                ContractValue::Known {
                    address,
                    name: known.name.clone(),
                },
                Some(known),
            ),
            None => (ContractValue::Unknown { address }, None),
        })
    }
}

fn width(bits: u16) -> usize {
    usize::from(bits / 8).clamp(1, WORD_SIZE)
}

/// The bytes above the low-order `n` are zero.
fn zero_above(word: &B256, n: usize) -> bool {
    word[..WORD_SIZE - n].iter().all(|b| *b == 0)
}

/// The bytes after the first `n` are zero.
fn zero_below(word: &B256, n: usize) -> bool {
    word[n..].iter().all(|b| *b == 0)
}

/// The bytes above the low-order `n` repeat the sign bit of the value.
fn sign_extended(word: &B256, n: usize) -> bool {
    let fill = if word[WORD_SIZE - n] & 0x80 != 0 { 0xff } else { 0x00 };
    word[..WORD_SIZE - n].iter().all(|b| *b == fill)
}
