//! The decode engine.
//!
//! [`Decoder::decode`] dispatches on the pointer's location; each location's
//! decoder then matches the type exhaustively. Reads go through the
//! [`Reader`], so any step may interrupt with a request. Failures are caught
//! by [`Decoder::capture`] at the nearest member or element and recorded as
//! an error leaf, except in strict mode where they stop the whole decode.

mod abi;
mod basic;
mod bytes;
mod constant;
mod memory;
mod stack;
mod storage;

use evmcodec_core::{
    DataPointer, Decoded, DecodingError, Location, MemberDefinition, StopDecodingError, Type,
    TypeId, Value,
};

use crate::context::DecodeContext;
use crate::read::{Interrupt, Reader, Step};
use crate::state::EvmState;

/// What a session decodes.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Target {
    Value { ty: Type, pointer: DataPointer },
    /// A calldata parameter tuple whose head starts at `base`.
    Arguments {
        params: Vec<MemberDefinition>,
        base: u64,
    },
}

/// Run one full decode pass against what `state` holds so far.
pub(crate) fn run(target: &Target, context: &DecodeContext<'_>, state: &EvmState) -> Step<Decoded> {
    let mut decoder = Decoder::new(context, Reader::new(state, context.config.max_bytes_length));
    let step = match target {
        Target::Value { ty, pointer } => decoder.decode(ty, pointer),
        Target::Arguments { params, base } => decoder.decode_arguments(params, *base),
    };
    decoder.capture(step)
}

pub(crate) struct Decoder<'a> {
    context: &'a DecodeContext<'a>,
    reader: Reader<'a>,
    /// Structs being decoded from memory or calldata, by start address.
    /// Meeting one again means the data points back into itself.
    active: Vec<(TypeId, Location, u64)>,
}

impl<'a> Decoder<'a> {
    pub(crate) fn new(context: &'a DecodeContext<'a>, reader: Reader<'a>) -> Self {
        Self {
            context,
            reader,
            active: Vec::new(),
        }
    }

    pub(crate) fn decode(&mut self, ty: &Type, pointer: &DataPointer) -> Step<Value> {
        match pointer {
            DataPointer::Storage(p) => self.decode_storage(ty, &p.range),
            DataPointer::Memory(p) => self.decode_memory(ty, p.start),
            DataPointer::Calldata(p) => self.decode_abi(ty, p.start),
            DataPointer::Stack(p) => self.decode_stack(ty, *p),
            DataPointer::StackLiteral { literal } => self.decode_literal(ty, *literal),
            DataPointer::Definition(p) => self.decode_constant(ty, &p.definition),
        }
    }

    /// Turn a failed subtree into an error leaf, or into a stop in strict
    /// mode. Suspensions and stops pass through untouched.
    pub(crate) fn capture(&self, step: Step<Value>) -> Step<Decoded> {
        match step {
            Ok(value) => Ok(Decoded::Value { value }),
            Err(Interrupt::Fail(error)) if self.context.config.strict_abi => {
                Err(Interrupt::Stop(StopDecodingError { error }))
            }
            Err(Interrupt::Fail(error)) => Ok(Decoded::Error { error }),
            Err(other) => Err(other),
        }
    }

    fn check_array_length(&self, length: u64) -> Result<(), DecodingError> {
        if length > self.context.config.max_array_length {
            return Err(DecodingError::OverlongArray {
                length: length.to_string(),
            });
        }
        Ok(())
    }

    /// Decode a struct whose data starts at `start` in `location`, refusing
    /// to re-enter a struct already being decoded at the same address.
    fn with_struct_guard(
        &mut self,
        id: TypeId,
        location: Location,
        start: u64,
        decode: impl FnOnce(&mut Self) -> Step<Value>,
    ) -> Step<Value> {
        let key = (id, location, start);
        if self.active.contains(&key) {
            return Err(DecodingError::RecursiveStruct { id }.into());
        }
        self.active.push(key);
        let step = decode(self);
        self.active.pop();
        step
    }
}

/// Add two offsets, failing the way an oversized pointer does.
fn offset(base: u64, delta: u64) -> Result<u64, DecodingError> {
    base.checked_add(delta)
        .ok_or_else(|| DecodingError::OverlargePointer {
            raw: format!("{base:x}+{delta:x}"),
        })
}

/// Read a word as a machine-sized pointer or length.
fn word_to_u64(word: &alloy_primitives::B256) -> Result<u64, DecodingError> {
    evmcodec_core::conversion::to_u64(alloy_primitives::U256::from_be_bytes(word.0)).ok_or_else(
        || DecodingError::OverlargePointer {
            raw: hex::encode(word),
        },
    )
}

#[cfg(test)]
pub(crate) mod testing {
    //! Helpers shared by the decoder unit tests.

    use super::*;
    use alloy_primitives::{B256, U256};

    /// Run a decode to completion against a fully seeded state.
    pub(crate) fn decode_in(
        ty: &Type,
        pointer: DataPointer,
        context: &DecodeContext<'_>,
        state: &EvmState,
    ) -> Step<Decoded> {
        run(
            &Target::Value {
                ty: ty.clone(),
                pointer,
            },
            context,
            state,
        )
    }

    pub(crate) fn word_of(n: u64) -> B256 {
        B256::from(U256::from(n).to_be_bytes::<32>())
    }

    pub(crate) fn value(step: Step<Decoded>) -> Value {
        match step {
            Ok(Decoded::Value { value }) => value,
            other => panic!("expected a value, got {other:?}"),
        }
    }
}
