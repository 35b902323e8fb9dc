//! Storage: packed values, short and long `bytes`/`string`, arrays, structs
//! and the requested entries of mappings.

use alloy_primitives::U256;
use evmcodec_core::conversion::{left_pad_word, to_hex, to_u256, to_u64, WORD_SIZE};
use evmcodec_core::{
    equal_slots, ArrayLength, DecodingError, MappingEntry, Slot, StoragePosition, StorageRange,
    StructField, Type, TypeId, Value,
};

use super::bytes::bytes_value;
use super::Decoder;
use crate::allocate::{allocate_storage_struct, element_range, storage_range_at, storage_size};
use crate::read::{Missing, Step};

impl Decoder<'_> {
    pub(crate) fn decode_storage(&mut self, ty: &Type, range: &StorageRange) -> Step<Value> {
        let location = self.reader.storage_location();
        match ty {
            Type::Uint { .. }
            | Type::Int { .. }
            | Type::Bool
            | Type::Address { .. }
            | Type::Contract { .. }
            | Type::FixedBytes { .. }
            | Type::Fixed { .. }
            | Type::Ufixed { .. }
            | Type::Enum { .. }
            | Type::Function { .. } => {
                let raw = self.reader.storage(range)?;
                self.decode_basic(ty, left_pad_word(&raw), location)
            }
            Type::DynamicBytes { .. } | Type::String { .. } => {
                self.decode_storage_bytes(ty, &range.from.slot)
            }
            Type::Array {
                element, length, ..
            } => self.decode_storage_array(element, *length, &range.from.slot),
            Type::Struct { id, .. } => self.decode_storage_struct(*id, &range.from.slot),
            Type::Mapping { value, .. } => self.decode_mapping(value, &range.from.slot),
        }
    }

    /// Short form: contents inline, last byte is twice the length. Long
    /// form: the slot holds `2 * length + 1` and the contents start at
    /// `keccak256(slot)`.
    fn decode_storage_bytes(&mut self, ty: &Type, slot: &Slot) -> Step<Value> {
        let location = self.reader.storage_location();
        let word = self.reader.slot(slot)?;
        let last = word[WORD_SIZE - 1];
        let raw = if last & 1 == 0 {
            let length = usize::from(last / 2);
            if length >= WORD_SIZE {
                return Err(DecodingError::ReadErrorStorage {
                    slot: to_hex(self.reader.address(slot)?.as_slice()),
                    reason: format!("short-form length {length} does not fit in the slot"),
                }
                .into());
            }
            word[..length].to_vec()
        } else {
            let length = match to_u64(to_u256(word.as_slice()) >> 1usize) {
                Some(length) => length,
                None => {
                    return Err(DecodingError::ReadErrorStorage {
                        slot: to_hex(self.reader.address(slot)?.as_slice()),
                        reason: "length does not fit in a machine integer".into(),
                    }
                    .into())
                }
            };
            let contents = StoragePosition::new(Slot::hashed(slot, U256::ZERO), 0);
            self.reader
                .storage(&StorageRange::with_length(contents, length))?
        };
        Ok(bytes_value(ty, &raw, location)?)
    }

    /// Static arrays start at their own slot; dynamic arrays keep their
    /// length there and their elements from `keccak256(slot)`.
    fn decode_storage_array(
        &mut self,
        element: &Type,
        length: ArrayLength,
        slot: &Slot,
    ) -> Step<Value> {
        let (count, data) = match length {
            ArrayLength::Static(count) => (count, slot.clone()),
            ArrayLength::Dynamic => {
                let word = self.reader.slot(slot)?;
                let count = to_u64(to_u256(word.as_slice())).ok_or_else(|| {
                    DecodingError::OverlongArray {
                        length: to_u256(word.as_slice()).to_string(),
                    }
                })?;
                (count, Slot::hashed(slot, U256::ZERO))
            }
        };
        self.check_array_length(count)?;
        let size = storage_size(element, self.context.types)?;

        let mut items = Vec::with_capacity(count.min(1024) as usize);
        let mut missing = Missing::default();
        for index in 0..count {
            let range = element_range(&data, size, index);
            let step = self.decode_storage(element, &range);
            if let Some(item) = missing.absorb(self.capture(step))? {
                items.push(item);
            }
        }
        missing.finish()?;
        Ok(Value::Array(items))
    }

    fn decode_storage_struct(&mut self, id: TypeId, base: &Slot) -> Step<Value> {
        let layout = allocate_storage_struct(id, self.context.types)?;
        let mut fields = Vec::with_capacity(layout.members.len());
        let mut missing = Missing::default();
        for member in &layout.members {
            let step = self.decode_storage(&member.ty, &member.range(base));
            if let Some(value) = missing.absorb(self.capture(step))? {
                fields.push(StructField {
                    name: member.name.clone(),
                    value,
                });
            }
        }
        missing.finish()?;
        Ok(Value::Struct(fields))
    }

    /// Decode the entries whose key slots were supplied, once each, in the
    /// order they were supplied.
    fn decode_mapping(&mut self, value_ty: &Type, slot: &Slot) -> Step<Value> {
        let keys = self.context.mapping_keys;
        let mut seen: Vec<&Slot> = Vec::new();
        let mut entries = Vec::new();
        let mut missing = Missing::default();
        for entry_slot in keys {
            let Some(key) = entry_slot.key.as_deref() else {
                continue;
            };
            let belongs = !entry_slot.hash_path
                && entry_slot.offset.is_zero()
                && entry_slot
                    .path
                    .as_deref()
                    .is_some_and(|parent| equal_slots(parent, slot));
            if !belongs || seen.iter().any(|s| equal_slots(s, entry_slot)) {
                continue;
            }
            seen.push(entry_slot);

            let step = match storage_range_at(value_ty, entry_slot, self.context.types) {
                Ok(range) => self.decode_storage(value_ty, &range),
                Err(error) => Err(error.into()),
            };
            if let Some(value) = missing.absorb(self.capture(step))? {
                entries.push(MappingEntry {
                    key: key.clone(),
                    value,
                });
            }
        }
        missing.finish()?;
        Ok(Value::Mapping(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{decode_in, value, word_of};
    use crate::context::DecodeContext;
    use crate::read::Interrupt;
    use crate::state::EvmState;
    use alloy_primitives::{Address, B256, U256};
    use evmcodec_core::conversion::{keccak256, left_pad_word};
    use evmcodec_core::{
        slot_address, DataPointer, Decoded, DecoderRequest, DecodingError, MemberDefinition,
        Slot, StorageRange, StringValue, StructDefinition, Type, TypeId, UserDefinedType,
        UserDefinedTypes, Value,
    };

    fn top(n: u64) -> Slot {
        Slot::new(U256::from(n))
    }

    fn whole(ty: &Type, slot: Slot, types: &UserDefinedTypes) -> DataPointer {
        DataPointer::storage(crate::allocate::storage_range_at(ty, &slot, types).unwrap())
    }

    fn addr(slot: &Slot) -> B256 {
        slot_address(slot).unwrap()
    }

    #[test]
    fn same_word_different_extraction() {
        let types = UserDefinedTypes::new();
        let ctx = DecodeContext::new(&types);
        let state = EvmState::new().with_storage(word_of(0), word_of(0xdeadbeef));

        let as_bytes = decode_in(&Type::fixed_bytes(4), whole(&Type::fixed_bytes(4), top(0), &types), &ctx, &state);
        assert_eq!(value(as_bytes).as_hex().unwrap(), "deadbeef");

        let as_uint = decode_in(&Type::uint(32), whole(&Type::uint(32), top(0), &types), &ctx, &state);
        assert_eq!(value(as_uint), Value::Uint(U256::from(0xdeadbeefu64)));
    }

    #[test]
    fn unset_slot_reads_zero_after_one_request() {
        let types = UserDefinedTypes::new();
        let ctx = DecodeContext::new(&types);
        let pointer = whole(&Type::uint(256), top(9), &types);

        let mut state = EvmState::new();
        let first = decode_in(&Type::uint(256), pointer.clone(), &ctx, &state);
        let request = DecoderRequest::Storage { slot: word_of(9) };
        assert_eq!(first, Err(Interrupt::Suspend(vec![request.clone()])));

        state
            .record(&request, evmcodec_core::Response::Storage { word: None })
            .unwrap();
        assert_eq!(
            value(decode_in(&Type::uint(256), pointer, &ctx, &state)),
            Value::Uint(U256::ZERO)
        );
    }

    #[test]
    fn short_and_long_strings() {
        let types = UserDefinedTypes::new();
        let ctx = DecodeContext::new(&types);

        let mut short = [0u8; 32];
        short[..5].copy_from_slice(b"hello");
        short[31] = 10;
        let state = EvmState::new().with_storage(word_of(0), B256::from(short));
        assert_eq!(
            value(decode_in(&Type::string(), whole(&Type::string(), top(0), &types), &ctx, &state)),
            Value::string("hello")
        );

        let text = "a string that is longer than thirty-one bytes";
        let data = keccak256(&[word_of(1).as_slice()]);
        let base = U256::from_be_bytes(data.0);
        let mut state = EvmState::new().with_storage(word_of(1), word_of(text.len() as u64 * 2 + 1));
        for (i, chunk) in text.as_bytes().chunks(32).enumerate() {
            let slot = B256::from((base + U256::from(i)).to_be_bytes::<32>());
            state = state.with_storage(slot, evmcodec_core::conversion::right_pad_word(chunk));
        }
        assert_eq!(
            value(decode_in(&Type::string(), whole(&Type::string(), top(1), &types), &ctx, &state)),
            Value::string(text)
        );
    }

    #[test]
    fn malformed_string_in_storage_is_a_value() {
        let types = UserDefinedTypes::new();
        let ctx = DecodeContext::new(&types);
        let mut raw = [0u8; 32];
        raw[0] = 0xff;
        raw[31] = 2;
        let state = EvmState::new().with_storage(word_of(0), B256::from(raw));
        assert_eq!(
            value(decode_in(&Type::string(), whole(&Type::string(), top(0), &types), &ctx, &state)),
            Value::String(StringValue::Malformed {
                as_hex: "ff".into()
            })
        );
    }

    #[test]
    fn packed_dynamic_array() {
        let types = UserDefinedTypes::new();
        let ctx = DecodeContext::new(&types);
        let ty = Type::dynamic_array(Type::uint(128));
        let data = keccak256(&[word_of(2).as_slice()]);
        let mut packed = [0u8; 32];
        packed[16..].copy_from_slice(&U256::from(1).to_be_bytes::<32>()[16..]);
        packed[..16].copy_from_slice(&U256::from(2).to_be_bytes::<32>()[16..]);
        let state = EvmState::new()
            .with_storage(word_of(2), word_of(3))
            .with_storage(data, B256::from(packed))
            .with_storage(
                B256::from((U256::from_be_bytes(data.0) + U256::from(1)).to_be_bytes::<32>()),
                word_of(3),
            );
        let decoded = value(decode_in(&ty, whole(&ty, top(2), &types), &ctx, &state));
        assert_eq!(
            decoded,
            Value::Array(vec![
                Value::Uint(U256::from(1)).into(),
                Value::Uint(U256::from(2)).into(),
                Value::Uint(U256::from(3)).into(),
            ])
        );
    }

    #[test]
    fn missing_elements_are_asked_for_in_one_pass() {
        let types = UserDefinedTypes::new();
        let ctx = DecodeContext::new(&types);
        let ty = Type::dynamic_array(Type::uint(128));
        let state = EvmState::new().with_storage(word_of(2), word_of(5));
        let data = U256::from_be_bytes(keccak256(&[word_of(2).as_slice()]).0);
        // Five packed elements share three words; each word is asked for once.
        let expected = (0..3u64)
            .map(|i| DecoderRequest::Storage {
                slot: B256::from((data + U256::from(i)).to_be_bytes::<32>()),
            })
            .collect();
        assert_eq!(
            decode_in(&ty, whole(&ty, top(2), &types), &ctx, &state),
            Err(Interrupt::Suspend(expected))
        );
    }

    #[test]
    fn overlong_array_is_an_error_leaf() {
        let types = UserDefinedTypes::new();
        let ctx = DecodeContext::new(&types);
        let ty = Type::dynamic_array(Type::uint(256));
        let state = EvmState::new().with_storage(word_of(0), B256::repeat_byte(0xff));
        assert!(matches!(
            decode_in(&ty, whole(&ty, top(0), &types), &ctx, &state),
            Ok(Decoded::Error {
                error: DecodingError::OverlongArray { .. }
            })
        ));
    }

    #[test]
    fn struct_past_the_last_slot_is_an_error_leaf() {
        let types = UserDefinedTypes::new().with(
            1,
            UserDefinedType::Struct(StructDefinition {
                name: "Huge".into(),
                members: vec![
                    MemberDefinition::new("a", Type::static_array(Type::uint(256), u64::MAX)),
                    MemberDefinition::new("b", Type::uint(256)),
                    MemberDefinition::new("c", Type::uint(256)),
                ],
            }),
        );
        let ctx = DecodeContext::new(&types);
        let pointer = DataPointer::storage_slot(top(0));
        assert!(matches!(
            decode_in(&Type::struct_of(1), pointer, &ctx, &EvmState::new()),
            Ok(Decoded::Error {
                error: DecodingError::OverlongArray { .. }
            })
        ));
    }

    fn person_table() -> UserDefinedTypes {
        UserDefinedTypes::new().with(
            1,
            UserDefinedType::Struct(StructDefinition {
                name: "Person".into(),
                members: vec![
                    MemberDefinition::new("age", Type::uint(8)),
                    MemberDefinition::new("wallet", Type::address()),
                    MemberDefinition::new("nickname", Type::string()),
                    MemberDefinition::new("balances", Type::mapping(Type::address(), Type::uint(256))),
                ],
            }),
        )
    }

    #[test]
    fn struct_members_share_slots() {
        let types = person_table();
        let ctx = DecodeContext::new(&types);
        let ty = Type::struct_of(1);
        let mut packed = [0u8; 32];
        packed[31] = 30;
        packed[11..31].copy_from_slice(&[0x44; 20]);
        let mut nick = [0u8; 32];
        nick[..3].copy_from_slice(b"bob");
        nick[31] = 6;
        let state = EvmState::new()
            .with_storage(word_of(5), B256::from(packed))
            .with_storage(word_of(6), B256::from(nick));

        let person = value(decode_in(&ty, whole(&ty, top(5), &types), &ctx, &state));
        assert_eq!(
            person.field("age").and_then(Decoded::value),
            Some(&Value::Uint(U256::from(30)))
        );
        assert_eq!(
            person.field("wallet").and_then(Decoded::value),
            Some(&Value::Address(Address::repeat_byte(0x44)))
        );
        assert_eq!(
            person.field("nickname").and_then(Decoded::value),
            Some(&Value::string("bob"))
        );
        assert_eq!(
            person.field("balances").and_then(Decoded::value),
            Some(&Value::Mapping(vec![]))
        );
    }

    #[test]
    fn corrupt_member_is_isolated() {
        let types = UserDefinedTypes::new().with(
            1,
            UserDefinedType::Struct(StructDefinition {
                name: "Mixed".into(),
                members: vec![
                    MemberDefinition::new("before", Type::uint(256)),
                    MemberDefinition::new("broken", Type::string()),
                    MemberDefinition::new("after", Type::Bool),
                ],
            }),
        );
        let ctx = DecodeContext::new(&types);
        let ty = Type::struct_of(1);
        // Long-form string whose length cannot be read.
        let state = EvmState::new()
            .with_storage(word_of(0), word_of(7))
            .with_storage(word_of(1), B256::repeat_byte(0xff))
            .with_storage(word_of(2), word_of(1));

        let decoded = value(decode_in(&ty, whole(&ty, top(0), &types), &ctx, &state));
        assert_eq!(
            decoded.field("before").and_then(Decoded::value),
            Some(&Value::Uint(U256::from(7)))
        );
        assert!(matches!(
            decoded.field("broken"),
            Some(Decoded::Error {
                error: DecodingError::ReadErrorStorage { .. }
            })
        ));
        assert_eq!(
            decoded.field("after").and_then(Decoded::value),
            Some(&Value::Bool(true))
        );
    }

    #[test]
    fn mapping_decodes_requested_keys_once() {
        let types = UserDefinedTypes::new();
        let ty = Type::mapping(Type::address(), Type::uint(256));
        let owner = Address::repeat_byte(0xaa);
        let base = top(3);
        let entry = Slot::mapping_entry(&base, Value::Address(owner));
        let elsewhere = Slot::mapping_entry(&top(4), Value::Address(owner));
        let keys = vec![entry.clone(), elsewhere, entry.clone()];
        let ctx = DecodeContext::new(&types).with_mapping_keys(&keys);

        let slot = keccak256(&[left_pad_word(owner.as_slice()).as_slice(), word_of(3).as_slice()]);
        assert_eq!(addr(&entry), slot);
        let state = EvmState::new().with_storage(slot, word_of(1000));

        let decoded = value(decode_in(&ty, whole(&ty, base, &types), &ctx, &state));
        match decoded {
            Value::Mapping(entries) => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].key, Value::Address(owner));
                assert_eq!(entries[0].value, Value::Uint(U256::from(1000)).into());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn mapping_inside_struct_matches_structural_slot() {
        let types = person_table();
        let owner = Address::repeat_byte(0x01);
        let balances = Slot::child(&top(5), U256::from(2));
        let keys = vec![Slot::mapping_entry(&balances, Value::Address(owner))];
        let ctx = DecodeContext::new(&types).with_mapping_keys(&keys);
        let ty = Type::struct_of(1);
        let state = EvmState::new()
            .with_storage(word_of(5), B256::ZERO)
            .with_storage(word_of(6), B256::ZERO)
            .with_storage(addr(&keys[0]), word_of(42));

        let person = value(decode_in(&ty, whole(&ty, top(5), &types), &ctx, &state));
        match person.field("balances").and_then(Decoded::value) {
            Some(Value::Mapping(entries)) => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].value, Value::Uint(U256::from(42)).into());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_struct_is_an_error_leaf() {
        let types = UserDefinedTypes::new();
        let ctx = DecodeContext::new(&types);
        let pointer = DataPointer::storage(StorageRange::words(top(0), U256::from(1)));
        assert_eq!(
            decode_in(&Type::struct_of(8), pointer, &ctx, &EvmState::new()),
            Ok(Decoded::Error {
                error: DecodingError::UnknownUserDefinedType { id: TypeId(8) }
            })
        );
    }
}
