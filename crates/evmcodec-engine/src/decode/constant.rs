//! Constants embedded in bytecode. Value types are the literal bytes,
//! low-order aligned. `bytes` and `string` are the raw contents. Arrays and
//! structs are an image of the words they would occupy in storage, decoded
//! with the storage layout against that image.

use alloy_primitives::U256;
use evmcodec_core::conversion::left_pad_word;
use evmcodec_core::{DecodingError, Location, Slot, Type, Value};

use super::bytes::bytes_value;
use super::Decoder;
use crate::allocate::storage_range_at;
use crate::read::{Reader, Step};

impl Decoder<'_> {
    pub(crate) fn decode_constant(&mut self, ty: &Type, definition: &[u8]) -> Step<Value> {
        match ty {
            Type::DynamicBytes { .. } | Type::String { .. } => {
                Ok(bytes_value(ty, definition, Location::Definition)?)
            }
            Type::Mapping { .. } => Err(DecodingError::UnsupportedLocation {
                ty: ty.to_string(),
                location: Location::Definition,
            }
            .into()),
            Type::Array { .. } | Type::Struct { .. } => {
                let range = storage_range_at(ty, &Slot::new(U256::ZERO), self.context.types)?;
                let reader =
                    Reader::image(self.reader.state(), definition, self.reader.max_bytes());
                Decoder::new(self.context, reader).decode_storage(ty, &range)
            }
            _ => self.decode_basic(ty, left_pad_word(definition), Location::Definition),
        }
    }
}
