//! `bytes` and `string` contents. The pointer already carries the exact
//! length; nothing is padded.

use evmcodec_core::{BytesPointer, DecodingError, Location, StringValue, Type, Value};

use super::Decoder;
use crate::read::Step;

impl Decoder<'_> {
    /// Read exactly `pointer.length` bytes of memory or calldata as `ty`.
    pub(crate) fn decode_bytes_at(
        &mut self,
        ty: &Type,
        location: Location,
        pointer: BytesPointer,
    ) -> Step<Value> {
        let raw = self.reader.bytes(location, pointer)?;
        Ok(bytes_value(ty, &raw, location)?)
    }
}

/// Interpret raw contents. Invalid UTF-8 in a string is a malformed value,
/// not an error.
pub(crate) fn bytes_value(ty: &Type, raw: &[u8], location: Location) -> Result<Value, DecodingError> {
    match ty {
        Type::DynamicBytes { .. } => Ok(Value::Bytes(raw.to_vec().into())),
        Type::String { .. } => Ok(Value::String(StringValue::from_bytes(raw))),
        other => Err(DecodingError::UnsupportedLocation {
            ty: other.to_string(),
            location,
        }),
    }
}
