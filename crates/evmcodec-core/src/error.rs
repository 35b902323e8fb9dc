//! Error types for the evmcodec decode/encode pipeline.
//!
//! Two families live here. [`DecodingError`] is data: it is attached to a
//! leaf of a decoded result tree so the rest of a composite value can still
//! be decoded. [`CodecError`] and [`StopDecodingError`] travel through `Err`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pointer::Location;
use crate::types::TypeId;

/// A decode failure recorded in a result tree instead of being raised.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecodingError {
    #[error("storage read at {slot} failed: {reason}")]
    ReadErrorStorage { slot: String, reason: String },

    #[error("{location} read of {length} bytes at {start} is out of range")]
    ReadErrorBytes {
        location: Location,
        start: String,
        length: String,
    },

    #[error("stack read of positions {from}..={to} is out of range")]
    ReadErrorStack { from: usize, to: usize },

    #[error("user-defined type {id} is not in the type table")]
    UnknownUserDefinedType { id: TypeId },

    #[error("user-defined type {id} is not a {expected}")]
    UserDefinedTypeMismatch { id: TypeId, expected: String },

    #[error("uint word 0x{raw} is not zero-padded")]
    UintPadding { raw: String },

    #[error("int word 0x{raw} is not sign-extended")]
    IntPadding { raw: String },

    #[error("address word 0x{raw} is not zero-padded")]
    AddressPadding { raw: String },

    #[error("bool word 0x{raw} has nonzero padding")]
    BoolPadding { raw: String },

    #[error("bytes word 0x{raw} is not right-padded with zeros")]
    BytesPadding { raw: String },

    #[error("external function word 0x{raw} is not right-padded with zeros")]
    FunctionExternalPadding { raw: String },

    #[error("enum {id} has no option with index {raw}")]
    EnumOutOfRange { id: TypeId, raw: String },

    #[error("array length {length} exceeds the configured maximum")]
    OverlongArray { length: String },

    #[error("pointer 0x{raw} does not fit in a machine integer")]
    OverlargePointer { raw: String },

    #[error("struct {id} contains itself by value")]
    RecursiveStruct { id: TypeId },

    #[error("{ty} cannot be decoded from {location}")]
    UnsupportedLocation { ty: String, location: Location },
}

impl DecodingError {
    /// Stable snake_case name of the variant, used as a metrics attribute.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ReadErrorStorage { .. } => "read_error_storage",
            Self::ReadErrorBytes { .. } => "read_error_bytes",
            Self::ReadErrorStack { .. } => "read_error_stack",
            Self::UnknownUserDefinedType { .. } => "unknown_user_defined_type",
            Self::UserDefinedTypeMismatch { .. } => "user_defined_type_mismatch",
            Self::UintPadding { .. } => "uint_padding",
            Self::IntPadding { .. } => "int_padding",
            Self::AddressPadding { .. } => "address_padding",
            Self::BoolPadding { .. } => "bool_padding",
            Self::BytesPadding { .. } => "bytes_padding",
            Self::FunctionExternalPadding { .. } => "function_external_padding",
            Self::EnumOutOfRange { .. } => "enum_out_of_range",
            Self::OverlongArray { .. } => "overlong_array",
            Self::OverlargePointer { .. } => "overlarge_pointer",
            Self::RecursiveStruct { .. } => "recursive_struct",
            Self::UnsupportedLocation { .. } => "unsupported_location",
        }
    }

    /// Whether this error means requested data could not be read.
    pub fn is_read_error(&self) -> bool {
        matches!(
            self,
            Self::ReadErrorStorage { .. } | Self::ReadErrorBytes { .. } | Self::ReadErrorStack { .. }
        )
    }
}

/// Raised in strict ABI mode: aborts the whole decode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("decoding stopped: {error}")]
pub struct StopDecodingError {
    pub error: DecodingError,
}

impl From<DecodingError> for StopDecodingError {
    fn from(error: DecodingError) -> Self {
        Self { error }
    }
}

/// Errors returned by encoders, configuration loading and session driving.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Value {value} does not fit in {bits} bits")]
    OutOfRange { value: String, bits: usize },

    #[error("Cannot encode {ty}: {reason}")]
    Unsupported { ty: String, reason: String },

    #[error("Invalid hex '{input}': {reason}")]
    InvalidHex { input: String, reason: String },

    #[error("Invalid decimal '{input}': {reason}")]
    InvalidDecimal { input: String, reason: String },

    #[error("Response {got} does not answer the pending request {expected}")]
    UnexpectedResponse { expected: String, got: String },

    #[error("No request is pending")]
    NothingPending,

    #[error(transparent)]
    Stopped(#[from] StopDecodingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
