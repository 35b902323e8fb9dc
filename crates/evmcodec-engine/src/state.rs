//! The caller-owned cache a decode session reads from.

use alloy_primitives::{Address, Bytes, B256};
use evmcodec_core::{CodecError, DecoderRequest, Response};
use std::collections::HashMap;

/// A byte region known either in full or as the ranges answered so far.
#[derive(Debug, Clone, Default)]
pub(crate) struct ByteRegion {
    full: Option<Bytes>,
    ranges: HashMap<(u64, u64), Option<Bytes>>,
}

impl ByteRegion {
    /// `None` when the range is not known yet; `Some(None)` when it is known
    /// to be unavailable.
    pub(crate) fn lookup(&self, start: u64, length: u64) -> Option<Option<Bytes>> {
        if let Some(full) = &self.full {
            let range = start
                .checked_add(length)
                .and_then(|end| usize::try_from(start).ok().zip(usize::try_from(end).ok()))
                .filter(|(_, end)| *end <= full.len());
            return Some(range.map(|(s, e)| Bytes::copy_from_slice(&full[s..e])));
        }
        self.ranges.get(&(start, length)).cloned()
    }
}

/// Data gathered for a decode: storage words, memory, calldata, code and the
/// stack. Pre-seed it to avoid requests, or keep it between sessions to
/// reuse what was fetched.
#[derive(Debug, Clone, Default)]
pub struct EvmState {
    pub(crate) storage: HashMap<B256, B256>,
    pub(crate) memory: ByteRegion,
    pub(crate) calldata: ByteRegion,
    pub(crate) code: HashMap<Address, Bytes>,
    pub(crate) stack: Vec<B256>,
}

impl EvmState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_storage(mut self, slot: B256, word: B256) -> Self {
        self.storage.insert(slot, word);
        self
    }

    /// The whole of memory. Reads past its end are out of range.
    pub fn with_memory(mut self, memory: impl Into<Bytes>) -> Self {
        self.memory.full = Some(memory.into());
        self
    }

    /// The whole of calldata. Reads past its end are out of range.
    pub fn with_calldata(mut self, calldata: impl Into<Bytes>) -> Self {
        self.calldata.full = Some(calldata.into());
        self
    }

    pub fn with_code(mut self, address: Address, code: impl Into<Bytes>) -> Self {
        self.code.insert(address, code.into());
        self
    }

    /// Stack words, indexed by position in this vector.
    pub fn with_stack(mut self, stack: Vec<B256>) -> Self {
        self.stack = stack;
        self
    }

    pub fn stack(&self) -> &[B256] {
        &self.stack
    }

    pub fn storage_word(&self, slot: &B256) -> Option<B256> {
        self.storage.get(slot).copied()
    }

    /// Number of storage words held.
    pub fn storage_len(&self) -> usize {
        self.storage.len()
    }

    /// Store the answer to `request`. Unset storage is recorded as zero.
    pub fn record(&mut self, request: &DecoderRequest, response: Response) -> Result<(), CodecError> {
        if !response.answers(request) {
            return Err(CodecError::UnexpectedResponse {
                expected: request.to_string(),
                got: response.to_string(),
            });
        }
        match (request, response) {
            (DecoderRequest::Storage { slot }, Response::Storage { word }) => {
                self.storage.insert(*slot, word.unwrap_or(B256::ZERO));
            }
            (DecoderRequest::Memory { start, length }, Response::Bytes { bytes }) => {
                self.memory.ranges.insert((*start, *length), bytes);
            }
            (DecoderRequest::Calldata { start, length }, Response::Bytes { bytes }) => {
                self.calldata.ranges.insert((*start, *length), bytes);
            }
            (DecoderRequest::Code { address }, Response::Code { code }) => {
                self.code.insert(*address, code);
            }
            (request, response) => {
                return Err(CodecError::UnexpectedResponse {
                    expected: request.to_string(),
                    got: response.to_string(),
                })
            }
        }
        Ok(())
    }
}
