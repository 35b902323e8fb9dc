//! Reads against the session cache.
//!
//! Every read either answers from [`EvmState`] or interrupts with the
//! [`DecoderRequest`]s that would let it answer. Decoders are plain functions
//! returning [`Step`]; the session re-runs them once the requests are
//! answered. Siblings that do not depend on each other's data keep going
//! after one of them misses, so a pass asks for everything it can see is
//! missing and the number of passes follows the nesting depth of the data,
//! not its size.

use std::collections::HashSet;
use std::mem;

use alloy_primitives::{Address, Bytes, B256, U256};
use evmcodec_core::conversion::{to_hex, to_u64, WORD_SIZE};
use evmcodec_core::{
    slot_address, BytesPointer, DecoderRequest, DecodingError, Location, Slot, StackPointer,
    StopDecodingError, StorageRange,
};

use crate::state::EvmState;

/// Why a decode step did not produce a value.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Interrupt {
    /// Data is missing from the cache. Never empty, no duplicates.
    Suspend(Vec<DecoderRequest>),
    /// This subtree failed; the nearest enclosing member records it.
    Fail(DecodingError),
    /// Strict mode: the whole decode is over.
    Stop(StopDecodingError),
}

impl From<DecodingError> for Interrupt {
    fn from(error: DecodingError) -> Self {
        Interrupt::Fail(error)
    }
}

pub(crate) type Step<T> = Result<T, Interrupt>;

fn suspend<T>(request: DecoderRequest) -> Step<T> {
    Err(Interrupt::Suspend(vec![request]))
}

/// Requests parked by sibling steps within one pass.
#[derive(Debug, Default)]
pub(crate) struct Missing {
    requests: Vec<DecoderRequest>,
    seen: HashSet<DecoderRequest>,
}

impl Missing {
    /// Keep a finished sibling's result, or park its requests and carry on
    /// with the next sibling. Once something is parked, any other interrupt
    /// gives way to the parked requests: the data they fetch comes first in
    /// decode order.
    pub(crate) fn absorb<T>(&mut self, step: Step<T>) -> Step<Option<T>> {
        match step {
            Ok(value) => Ok(Some(value)),
            Err(Interrupt::Suspend(requests)) => {
                for request in requests {
                    if self.seen.insert(request.clone()) {
                        self.requests.push(request);
                    }
                }
                Ok(None)
            }
            Err(other) if self.requests.is_empty() => Err(other),
            Err(_) => Err(Interrupt::Suspend(mem::take(&mut self.requests))),
        }
    }

    /// Suspend with everything parked, if anything was.
    pub(crate) fn finish(self) -> Step<()> {
        if self.requests.is_empty() {
            Ok(())
        } else {
            Err(Interrupt::Suspend(self.requests))
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Reader<'a> {
    state: &'a EvmState,
    /// Storage served from a constant's layout image instead of the cache.
    image: Option<&'a [u8]>,
    max_bytes: u64,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(state: &'a EvmState, max_bytes: u64) -> Self {
        Self {
            state,
            image: None,
            max_bytes,
        }
    }

    /// A reader whose storage is the word image `image`; slots past its end
    /// read as zero.
    pub(crate) fn image(state: &'a EvmState, image: &'a [u8], max_bytes: u64) -> Self {
        Self {
            state,
            image: Some(image),
            max_bytes,
        }
    }

    /// Where storage reads come from, for error reports and alignment.
    pub(crate) fn storage_location(&self) -> Location {
        if self.image.is_some() {
            Location::Definition
        } else {
            Location::Storage
        }
    }

    pub(crate) fn address(&self, slot: &Slot) -> Result<B256, DecodingError> {
        slot_address(slot).map_err(|e| DecodingError::ReadErrorStorage {
            slot: format!("offset {}", slot.offset),
            reason: e.to_string(),
        })
    }

    /// The word at a numeric slot address.
    pub(crate) fn word(&self, address: B256) -> Step<B256> {
        if let Some(image) = self.image {
            return Ok(image_word(image, address));
        }
        match self.state.storage.get(&address) {
            Some(word) => Ok(*word),
            None => suspend(DecoderRequest::Storage { slot: address }),
        }
    }

    pub(crate) fn slot(&self, slot: &Slot) -> Step<B256> {
        self.word(self.address(slot)?)
    }

    /// Read an inclusive storage range: every word from the first slot to
    /// the last in order, then cut to the byte range.
    pub(crate) fn storage(&self, range: &StorageRange) -> Step<Vec<u8>> {
        let first = self.address(&range.from.slot)?;
        let fail = |reason: String| {
            Interrupt::Fail(DecodingError::ReadErrorStorage {
                slot: to_hex(first.as_slice()),
                reason,
            })
        };
        let end = match range.end() {
            Some(end) => end,
            None if range.length == Some(0) => return Ok(Vec::new()),
            None => return Err(fail("range has neither an end nor a length".into())),
        };
        let last = self.address(&end.slot)?;
        let start = U256::from_be_bytes(first.0);
        let span = U256::from_be_bytes(last.0).wrapping_sub(start);
        let words = to_u64(span)
            .and_then(|s| s.checked_add(1))
            .ok_or_else(|| fail("word count does not fit in a machine integer".into()))?;

        let from = u128::from(range.from.index);
        let to = (u128::from(words) - 1) * WORD_SIZE as u128 + u128::from(end.index);
        if to < from {
            return Err(fail("range ends before it starts".into()));
        }
        let length = to - from + 1;
        if length > u128::from(self.max_bytes) {
            return Err(fail(format!("{length} bytes exceeds the configured maximum")));
        }

        let mut raw = Vec::with_capacity(words as usize * WORD_SIZE);
        let mut missing = Missing::default();
        for i in 0..words {
            let address = B256::from(start.wrapping_add(U256::from(i)).to_be_bytes::<32>());
            if let Some(word) = missing.absorb(self.word(address))? {
                raw.extend_from_slice(word.as_slice());
            }
        }
        missing.finish()?;
        Ok(raw[from as usize..=to as usize].to_vec())
    }

    /// Read `pointer.length` bytes of memory or calldata.
    pub(crate) fn bytes(&self, location: Location, pointer: BytesPointer) -> Step<Bytes> {
        let out_of_range = || {
            Interrupt::Fail(DecodingError::ReadErrorBytes {
                location,
                start: pointer.start.to_string(),
                length: pointer.length.to_string(),
            })
        };
        if pointer.length == 0 {
            return Ok(Bytes::new());
        }
        if pointer.length > self.max_bytes {
            return Err(out_of_range());
        }
        let (region, request) = match location {
            Location::Memory => (
                &self.state.memory,
                DecoderRequest::Memory {
                    start: pointer.start,
                    length: pointer.length,
                },
            ),
            Location::Calldata => (
                &self.state.calldata,
                DecoderRequest::Calldata {
                    start: pointer.start,
                    length: pointer.length,
                },
            ),
            other => {
                return Err(Interrupt::Fail(DecodingError::UnsupportedLocation {
                    ty: "byte range".into(),
                    location: other,
                }))
            }
        };
        match region.lookup(pointer.start, pointer.length) {
            Some(Some(bytes)) => Ok(bytes),
            Some(None) => Err(out_of_range()),
            None => suspend(request),
        }
    }

    /// One word of memory or calldata.
    pub(crate) fn byte_word(&self, location: Location, start: u64) -> Step<B256> {
        let bytes = self.bytes(location, BytesPointer::word(start))?;
        B256::try_from(&bytes[..]).map_err(|_| {
            Interrupt::Fail(DecodingError::ReadErrorBytes {
                location,
                start: start.to_string(),
                length: WORD_SIZE.to_string(),
            })
        })
    }

    pub(crate) fn code(&self, address: Address) -> Step<Bytes> {
        match self.state.code.get(&address) {
            Some(code) => Ok(code.clone()),
            None => suspend(DecoderRequest::Code { address }),
        }
    }

    pub(crate) fn stack(&self, pointer: StackPointer) -> Step<&'a [B256]> {
        let StackPointer { from, to } = pointer;
        if from > to || to >= self.state.stack.len() {
            return Err(Interrupt::Fail(DecodingError::ReadErrorStack { from, to }));
        }
        Ok(&self.state.stack[from..=to])
    }

    pub(crate) fn state(&self) -> &'a EvmState {
        self.state
    }

    pub(crate) fn max_bytes(&self) -> u64 {
        self.max_bytes
    }
}

fn image_word(image: &[u8], address: B256) -> B256 {
    let start = to_u64(U256::from_be_bytes(address.0))
        .and_then(|index| index.checked_mul(WORD_SIZE as u64))
        .and_then(|start| usize::try_from(start).ok())
        .filter(|start| *start < image.len());
    match start {
        Some(start) => {
            let end = (start + WORD_SIZE).min(image.len());
            evmcodec_core::conversion::right_pad_word(&image[start..end])
        }
        None => B256::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evmcodec_core::StoragePosition;

    fn word(byte: u8) -> B256 {
        B256::repeat_byte(byte)
    }

    fn at(n: u64) -> B256 {
        B256::from(U256::from(n).to_be_bytes::<32>())
    }

    #[test]
    fn missing_word_suspends() {
        let state = EvmState::new();
        let reader = Reader::new(&state, 1 << 20);
        assert_eq!(
            reader.slot(&Slot::new(U256::from(7))),
            Err(Interrupt::Suspend(vec![DecoderRequest::Storage { slot: at(7) }]))
        );
    }

    #[test]
    fn missing_words_of_a_range_are_asked_for_together() {
        let state = EvmState::new().with_storage(at(1), word(0xbb));
        let reader = Reader::new(&state, 1 << 20);
        let range = StorageRange::words(Slot::new(U256::ZERO), U256::from(4));
        assert_eq!(
            reader.storage(&range),
            Err(Interrupt::Suspend(vec![
                DecoderRequest::Storage { slot: at(0) },
                DecoderRequest::Storage { slot: at(2) },
                DecoderRequest::Storage { slot: at(3) },
            ]))
        );
    }

    #[test]
    fn parked_requests_are_deduplicated_and_win_over_later_failures() {
        let mut missing = Missing::default();
        let request = DecoderRequest::Storage { slot: at(9) };
        assert_eq!(missing.absorb(Ok::<_, Interrupt>(1)), Ok(Some(1)));
        assert_eq!(missing.absorb::<u8>(suspend(request.clone())), Ok(None));
        assert_eq!(missing.absorb::<u8>(suspend(request.clone())), Ok(None));
        let stop = Interrupt::Stop(StopDecodingError {
            error: DecodingError::RecursiveStruct {
                id: evmcodec_core::TypeId(1),
            },
        });
        assert_eq!(
            missing.absorb::<u8>(Err(stop.clone())),
            Err(Interrupt::Suspend(vec![request]))
        );

        let mut clean = Missing::default();
        assert_eq!(clean.absorb::<u8>(Err(stop.clone())), Err(stop));
        assert_eq!(clean.finish(), Ok(()));
    }

    #[test]
    fn range_spanning_two_slots_is_cut_to_bytes() {
        let state = EvmState::new()
            .with_storage(at(0), word(0xaa))
            .with_storage(at(1), word(0xbb));
        let reader = Reader::new(&state, 1 << 20);
        let range = StorageRange::with_length(StoragePosition::new(Slot::new(U256::ZERO), 30), 4);
        assert_eq!(reader.storage(&range).unwrap(), vec![0xaa, 0xaa, 0xbb, 0xbb]);
    }

    #[test]
    fn absurd_range_is_a_read_error() {
        let state = EvmState::new();
        let reader = Reader::new(&state, 1 << 20);
        let range = StorageRange::words(Slot::new(U256::ZERO), U256::MAX);
        assert!(matches!(
            reader.storage(&range),
            Err(Interrupt::Fail(DecodingError::ReadErrorStorage { .. }))
        ));
    }

    #[test]
    fn long_range_over_limit_is_a_read_error() {
        let state = EvmState::new();
        let reader = Reader::new(&state, 64);
        let range = StorageRange::words(Slot::new(U256::ZERO), U256::from(3));
        assert!(matches!(
            reader.storage(&range),
            Err(Interrupt::Fail(DecodingError::ReadErrorStorage { .. }))
        ));
    }

    #[test]
    fn memory_out_of_range_is_a_read_error() {
        let state = EvmState::new().with_memory(vec![0u8; 32]);
        let reader = Reader::new(&state, 1 << 20);
        assert!(reader.byte_word(Location::Memory, 0).is_ok());
        assert!(matches!(
            reader.byte_word(Location::Memory, 1),
            Err(Interrupt::Fail(DecodingError::ReadErrorBytes { .. }))
        ));
    }

    #[test]
    fn image_reads_past_end_as_zero() {
        let state = EvmState::new();
        let image = [0x11u8; 40];
        let reader = Reader::image(&state, &image, 1 << 20);
        assert_eq!(reader.word(at(0)).unwrap(), word(0x11));
        let second = reader.word(at(1)).unwrap();
        assert_eq!(&second[..8], &[0x11; 8]);
        assert_eq!(&second[8..], &[0u8; 24]);
        assert_eq!(reader.word(at(5)).unwrap(), B256::ZERO);
    }

    #[test]
    fn stack_bounds() {
        let state = EvmState::new().with_stack(vec![word(1), word(2)]);
        let reader = Reader::new(&state, 1 << 20);
        assert_eq!(reader.stack(StackPointer { from: 0, to: 1 }).unwrap().len(), 2);
        assert!(reader.stack(StackPointer { from: 1, to: 2 }).is_err());
    }
}
