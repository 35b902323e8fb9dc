//! Memory. A pointer addresses the value's data: the word itself for value
//! types, the length word of `bytes`, `string` and dynamic arrays, the first
//! member of a struct or static array. Members and elements that are
//! themselves references hold a pointer word.

use evmcodec_core::conversion::WORD_SIZE;
use evmcodec_core::{
    ArrayLength, BytesPointer, DataPointer, DecodingError, Location, StructField, Type, TypeId,
    Value,
};

use super::{offset, word_to_u64, Decoder};
use crate::allocate::allocate_memory_struct;
use crate::read::{Missing, Step};

const WORD: u64 = WORD_SIZE as u64;

impl Decoder<'_> {
    pub(crate) fn decode_memory(&mut self, ty: &Type, start: u64) -> Step<Value> {
        match ty {
            Type::DynamicBytes { .. } | Type::String { .. } => {
                let length = word_to_u64(&self.reader.byte_word(Location::Memory, start)?)?;
                let contents = BytesPointer::new(offset(start, WORD)?, length);
                self.decode_bytes_at(ty, Location::Memory, contents)
            }
            Type::Array {
                element, length, ..
            } => self.decode_memory_array(element, *length, start),
            Type::Struct { id, .. } => self.decode_memory_struct(*id, start),
            Type::Mapping { .. } => Err(DecodingError::UnsupportedLocation {
                ty: ty.to_string(),
                location: Location::Memory,
            }
            .into()),
            _ => {
                let word = self.reader.byte_word(Location::Memory, start)?;
                self.decode_basic(ty, word, Location::Memory)
            }
        }
    }

    /// A value held in one memory word: inline for value types, behind the
    /// pointer stored there for reference types.
    fn decode_memory_slot(&mut self, ty: &Type, slot: u64) -> Step<Value> {
        match ty {
            Type::Mapping { .. } => Ok(Value::Mapping(Vec::new())),
            ty if ty.is_basic() => self.decode_memory(ty, slot),
            _ => {
                let pointer = word_to_u64(&self.reader.byte_word(Location::Memory, slot)?)?;
                self.decode_memory(ty, pointer)
            }
        }
    }

    fn decode_memory_array(
        &mut self,
        element: &Type,
        length: ArrayLength,
        start: u64,
    ) -> Step<Value> {
        let (count, data) = match length {
            ArrayLength::Static(count) => (count, start),
            ArrayLength::Dynamic => {
                let word = self.reader.byte_word(Location::Memory, start)?;
                let count = word_to_u64(&word).map_err(|_| DecodingError::OverlongArray {
                    length: alloy_primitives::U256::from_be_bytes(word.0).to_string(),
                })?;
                (count, offset(start, WORD)?)
            }
        };
        self.check_array_length(count)?;

        let mut items = Vec::with_capacity(count.min(1024) as usize);
        let mut missing = Missing::default();
        for index in 0..count {
            let step = match index.checked_mul(WORD) {
                Some(delta) => match offset(data, delta) {
                    Ok(slot) => self.decode_memory_slot(element, slot),
                    Err(e) => Err(e.into()),
                },
                None => Err(DecodingError::OverlongArray {
                    length: count.to_string(),
                }
                .into()),
            };
            if let Some(item) = missing.absorb(self.capture(step))? {
                items.push(item);
            }
        }
        missing.finish()?;
        Ok(Value::Array(items))
    }

    fn decode_memory_struct(&mut self, id: TypeId, start: u64) -> Step<Value> {
        self.with_struct_guard(id, Location::Memory, start, |this| {
            let members = allocate_memory_struct(id, this.context.types, start)?;
            let mut fields = Vec::with_capacity(members.len());
            let mut missing = Missing::default();
            for member in members {
                let step = match member.pointer {
                    DataPointer::Memory(p) => this.decode_memory_slot(&member.ty, p.start),
                    other => Err(DecodingError::UnsupportedLocation {
                        ty: member.ty.to_string(),
                        location: other.location(),
                    }
                    .into()),
                };
                if let Some(value) = missing.absorb(this.capture(step))? {
                    fields.push(StructField {
                        name: member.name,
                        value,
                    });
                }
            }
            missing.finish()?;
            Ok(Value::Struct(fields))
        })
    }
}
