//! Stack words and literals.
//!
//! Value types are the top word. Reference types are pointers whose meaning
//! depends on the declared location: a storage slot, a memory address, or a
//! calldata offset. Calldata `bytes`, `string` and dynamic arrays take two
//! words, offset below length.

use alloy_primitives::{B256, U256};
use evmcodec_core::{
    ArrayLength, BytesPointer, DecodingError, Location, Slot, StackPointer, Type, Value,
};

use super::{word_to_u64, Decoder};
use crate::allocate::storage_range_at;
use crate::read::Step;

impl Decoder<'_> {
    pub(crate) fn decode_stack(&mut self, ty: &Type, pointer: StackPointer) -> Step<Value> {
        let words = self.reader.stack(pointer)?;
        self.decode_words(ty, words, pointer, Location::Stack)
    }

    pub(crate) fn decode_literal(&mut self, ty: &Type, literal: B256) -> Step<Value> {
        self.decode_words(
            ty,
            &[literal],
            StackPointer { from: 0, to: 0 },
            Location::StackLiteral,
        )
    }

    fn decode_words(
        &mut self,
        ty: &Type,
        words: &[B256],
        pointer: StackPointer,
        location: Location,
    ) -> Step<Value> {
        let Some(top) = words.last() else {
            return Err(DecodingError::ReadErrorStack {
                from: pointer.from,
                to: pointer.to,
            }
            .into());
        };
        if ty.is_basic() {
            return self.decode_basic(ty, *top, location);
        }
        match ty.location() {
            Some(Location::Storage) => {
                let slot = Slot::new(U256::from_be_bytes(top.0));
                let range = storage_range_at(ty, &slot, self.context.types)?;
                self.decode_storage(ty, &range)
            }
            Some(Location::Memory) => {
                let start = word_to_u64(top)?;
                self.decode_memory(ty, start)
            }
            Some(Location::Calldata) => self.decode_calldata_reference(ty, top, words, pointer),
            _ => Err(DecodingError::UnsupportedLocation {
                ty: ty.to_string(),
                location,
            }
            .into()),
        }
    }

    fn decode_calldata_reference(
        &mut self,
        ty: &Type,
        top: &B256,
        words: &[B256],
        pointer: StackPointer,
    ) -> Step<Value> {
        let two_words = ty.is_bytes_like()
            || matches!(
                ty,
                Type::Array {
                    length: ArrayLength::Dynamic,
                    ..
                }
            );
        if !two_words {
            let start = word_to_u64(top)?;
            return self.decode_abi(ty, start);
        }

        let [.., start, length] = words else {
            return Err(DecodingError::ReadErrorStack {
                from: pointer.from,
                to: pointer.to,
            }
            .into());
        };
        let start = word_to_u64(start)?;
        let length = word_to_u64(length)?;
        match ty {
            Type::Array { element, .. } => {
                self.decode_abi_array(element, ArrayLength::Static(length), start)
            }
            _ => self.decode_bytes_at(ty, Location::Calldata, BytesPointer::new(start, length)),
        }
    }
}
