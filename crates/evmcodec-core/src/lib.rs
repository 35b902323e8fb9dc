//! # evmcodec-core
//!
//! The data model shared by every evmcodec crate: Solidity types, decoded
//! values, pointers into EVM data regions, storage slot addressing, byte and
//! numeric conversions, the single-word encoder, and the request/response
//! protocol a suspended decode uses to ask for data.

pub mod config;
pub mod conversion;
pub mod encode;
pub mod error;
pub mod observe;
pub mod pointer;
pub mod request;
pub mod slot;
pub mod types;
pub mod value;

pub use config::DecoderConfig;
pub use encode::{encode_basic, encode_bytes, encode_mapping_key};
pub use error::{CodecError, DecodingError, StopDecodingError};
pub use observe::{DecodeObserver, NoopObserver, TracingObserver};
pub use pointer::{
    BytesPointer, ConstantDefinitionPointer, DataPointer, Location, Slot, StackPointer,
    StoragePointer, StoragePosition, StorageRange,
};
pub use request::{AsyncDataSource, DataSource, DecoderRequest, Response};
pub use slot::{equal_slots, slot_address};
pub use types::{
    ArrayLength, ContractDefinition, ContractKind, EnumDefinition, FunctionVisibility,
    MemberDefinition, Mutability, StructDefinition, Type, TypeId, UserDefinedType,
    UserDefinedTypes,
};
pub use value::{
    ContractValue, Decoded, EnumValue, FixedValue, FunctionInfo, MappingEntry, StringValue,
    StructField, UfixedValue, Value,
};
